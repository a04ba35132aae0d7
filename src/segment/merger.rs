//! Segment merging
//!
//! Streams several source segments into one new segment: stored fields and
//! norms are copied in remapped doc order, term dictionaries are merged
//! field by field with a min-heap of cursors, and postings are rewritten
//! through the old-to-new doc id maps, dropping tombstoned documents. A
//! failed merge unlinks its partial output and leaves the sources intact.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tracing::info;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::store::Directory;

use super::field_infos::FieldInfos;
use super::infos::SegmentInfo;
use super::postings::PostingsWriter;
use super::reader::{SegmentReader, SegmentTerms};
use super::stored::StoredFieldsWriter;
use super::term_dict::{Term, TermDictWriter, TermInfo};
use super::{norms, norms_file, segment_file};

/// Merges `readers` into a new segment called `name`
pub struct SegmentMerger<'a> {
    dir: &'a dyn Directory,
    name: String,
    config: &'a IndexConfig,
    readers: Vec<Arc<SegmentReader>>,
}

/// One source cursor inside the per-field merge heap; min-ordered by
/// `(text, reader index)` so equal terms drain in global doc order
struct HeapEntry {
    text: String,
    idx: usize,
    info: TermInfo,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.idx == other.idx
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want the smallest key
        (other.text.as_str(), other.idx).cmp(&(self.text.as_str(), self.idx))
    }
}

impl<'a> SegmentMerger<'a> {
    pub fn new(
        dir: &'a dyn Directory,
        name: impl Into<String>,
        config: &'a IndexConfig,
        readers: Vec<Arc<SegmentReader>>,
    ) -> Self {
        Self {
            dir,
            name: name.into(),
            config,
            readers,
        }
    }

    pub fn merge(&self) -> Result<SegmentInfo> {
        match self.merge_inner() {
            Ok(info) => {
                info!(
                    segment = %info.name,
                    sources = self.readers.len(),
                    docs = info.doc_count,
                    "merged segments"
                );
                Ok(info)
            }
            Err(e) => {
                self.cleanup();
                Err(e)
            }
        }
    }

    fn merge_inner(&self) -> Result<SegmentInfo> {
        // union of field tables, new ordinals in first-seen order
        let mut field_infos = FieldInfos::new();
        for reader in &self.readers {
            for field in reader.field_infos().iter() {
                field_infos.add(&field.name, field.indexed);
            }
        }

        // old local id -> new local id, skipping tombstoned docs
        let mut doc_maps: Vec<Vec<Option<u32>>> = Vec::with_capacity(self.readers.len());
        let mut next_doc = 0u32;
        for reader in &self.readers {
            let map = (0..reader.max_doc())
                .map(|local| {
                    if reader.is_deleted(local) {
                        None
                    } else {
                        let mapped = next_doc;
                        next_doc += 1;
                        Some(mapped)
                    }
                })
                .collect();
            doc_maps.push(map);
        }
        let total_docs = next_doc;

        field_infos.write(self.dir, &self.name)?;

        let mut stored = StoredFieldsWriter::new(self.dir, &self.name)?;
        for (reader, map) in self.readers.iter().zip(&doc_maps) {
            for local in 0..reader.max_doc() {
                if map[local as usize].is_some() {
                    stored.add_document(&reader.document(local)?, &field_infos)?;
                }
            }
        }
        stored.finish()?;

        let mut dict = TermDictWriter::new(
            self.dir,
            &self.name,
            self.config.term_index_interval,
            self.config.skip_interval,
        )?;
        let mut postings = PostingsWriter::new(self.dir, &self.name, self.config.skip_interval)?;

        // merge one field at a time so output order follows the new
        // ordinals even when sources assigned them differently
        for field in field_infos.iter() {
            if !field.indexed {
                continue;
            }
            self.merge_field(&field.name, field.ord, &doc_maps, &mut dict, &mut postings)?;
        }
        postings.finish()?;
        dict.finish()?;

        for field in field_infos.iter() {
            if !field.indexed {
                continue;
            }
            let mut bytes = Vec::with_capacity(total_docs as usize);
            for (reader, map) in self.readers.iter().zip(&doc_maps) {
                let source = reader.norms(&field.name);
                for local in 0..reader.max_doc() {
                    if map[local as usize].is_some() {
                        bytes.push(source.as_ref().map_or(0, |n| n[local as usize]));
                    }
                }
            }
            norms::write_norms(self.dir, &self.name, field.ord, &bytes)?;
        }

        Ok(SegmentInfo::new(self.name.clone(), total_docs))
    }

    fn merge_field(
        &self,
        field: &str,
        new_ord: u32,
        doc_maps: &[Vec<Option<u32>>],
        dict: &mut TermDictWriter,
        postings: &mut PostingsWriter,
    ) -> Result<()> {
        let mut cursors: Vec<Option<SegmentTerms>> = Vec::with_capacity(self.readers.len());
        let mut heap = BinaryHeap::new();

        for (idx, reader) in self.readers.iter().enumerate() {
            let cursor = reader.terms_from(&Term::new(field, ""))?;
            let entry = entry_for(&cursor, field, idx);
            cursors.push(Some(cursor));
            if let Some(entry) = entry? {
                heap.push(entry);
            }
        }

        while let Some(first) = heap.pop() {
            // drain every source positioned on the same term
            let mut group = vec![first];
            while heap
                .peek()
                .map_or(false, |e| e.text == group[0].text)
            {
                group.push(heap.pop().unwrap());
            }

            postings.start_term();
            for entry in &group {
                let reader = &self.readers[entry.idx];
                let mut cursor = reader.postings_from_info(&entry.info, true, true, None)?;
                while cursor.next()? {
                    if let Some(new_doc) = doc_maps[entry.idx][cursor.doc() as usize] {
                        let positions = cursor.positions()?;
                        postings.add_posting(new_doc, &positions)?;
                    }
                }
            }
            let merged_info = postings.end_term()?;
            if merged_info.doc_freq > 0 {
                dict.add(new_ord, &group[0].text, &merged_info)?;
            }

            for entry in group {
                let cursor = cursors[entry.idx].as_mut().expect("cursor in heap");
                cursor.next()?;
                if let Some(next) = entry_for(cursor, field, entry.idx)? {
                    heap.push(next);
                }
            }
        }
        Ok(())
    }

    fn cleanup(&self) {
        for ext in ["fnm", "fdx", "fdt", "tis", "tii", "frq", "prx"] {
            let _ = self.dir.delete_file(&segment_file(&self.name, ext));
        }
        let field_count: u32 = self
            .readers
            .iter()
            .map(|r| r.field_infos().len() as u32)
            .sum();
        for ord in 0..field_count {
            let _ = self.dir.delete_file(&norms_file(&self.name, ord));
        }
    }
}

/// Heap entry for a cursor's current term, `None` once it leaves `field`
fn entry_for(cursor: &SegmentTerms, field: &str, idx: usize) -> Result<Option<HeapEntry>> {
    match cursor.term()? {
        Some(term) if term.field == field => Ok(Some(HeapEntry {
            text: term.text,
            idx,
            info: cursor.info().expect("positioned cursor has info").clone(),
        })),
        _ => Ok(None),
    }
}

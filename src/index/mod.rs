//! The index facade
//!
//! [`Index`] is the single-writer surface over one directory: it buffers
//! added documents, tombstones deletions, and publishes everything through
//! the generation-based commit protocol. Its own reads (searches, counts,
//! stored-field fetches) observe flushed segments and pending tombstones
//! immediately; independently opened [`IndexReader`]s observe only
//! committed generations.

mod merge_policy;
mod reader;
mod terms;

use std::collections::BTreeSet;
use std::sync::Arc;

use roaring::RoaringBitmap;
use tracing::{debug, info};

use crate::analysis::Analyzer;
use crate::config::IndexConfig;
use crate::document::Document;
use crate::error::{NautexError, Result};
use crate::query::Query;
use crate::search::{self, DefaultSimilarity, QueryHit, SegmentCtx, Similarity, Snapshot};
use crate::segment::{
    encode_norm, BitVector, DocumentBuffer, SegmentInfos, SegmentMerger, SegmentReader,
    SegmentWriter, Term,
};
use crate::store::{Directory, Lock, WRITE_LOCK_NAME};

pub use reader::IndexReader;
pub use terms::MultiTerms;

/// One open segment plus the writer's uncommitted tombstones for it
struct SegmentHandle {
    reader: Arc<SegmentReader>,
    /// Local ids deleted since the last commit (never overlaps the
    /// committed bitmap)
    pending: RoaringBitmap,
}

/// Writer + snapshot reader over one directory
pub struct Index {
    dir: Arc<dyn Directory>,
    config: IndexConfig,
    analyzer: Analyzer,
    similarity: Arc<dyn Similarity>,
    infos: SegmentInfos,
    segments: Vec<SegmentHandle>,
    buffer: DocumentBuffer,
    pending_format: Option<i32>,
    dirty: bool,
    _lock: Box<dyn Lock>,
}

impl Index {
    /// Open (or create) the index in `dir`, acquiring the writer lock
    pub fn open(dir: Arc<dyn Directory>, config: IndexConfig) -> Result<Self> {
        validate_config(&config)?;
        let lock = dir.acquire_lock(WRITE_LOCK_NAME, Some(config.write_lock_timeout))?;

        let mut infos = SegmentInfos::read_current(dir.as_ref())?;
        let mut segments = Vec::with_capacity(infos.segments.len());
        for info in &infos.segments {
            segments.push(SegmentHandle {
                reader: Arc::new(SegmentReader::open(dir.as_ref(), info)?),
                pending: RoaringBitmap::new(),
            });
        }

        // a fresh directory gets its first (empty) generation right away so
        // readers always find a manifest
        if infos.generation < 0 {
            infos.write(dir.as_ref())?;
        }

        let analyzer = Analyzer::new(&config.analyzer);
        Ok(Self {
            dir,
            config,
            analyzer,
            similarity: Arc::new(DefaultSimilarity),
            infos,
            segments,
            buffer: DocumentBuffer::new(),
            pending_format: None,
            dirty: false,
            _lock: lock,
        })
    }

    // ------------------------------------------------------------------
    // write path

    /// Buffer a document; flushes into a new segment when the buffer
    /// reaches `max_buffered_docs`
    pub fn add_document(&mut self, doc: &Document) -> Result<()> {
        self.buffer.add_document(doc, &self.analyzer)?;
        self.dirty = true;
        if self.buffer.doc_count() >= self.config.max_buffered_docs {
            self.flush()?;
        }
        Ok(())
    }

    /// Tombstone a document by global id
    pub fn delete(&mut self, doc: u32) -> Result<()> {
        let (seg, local) = self.locate(doc)?;
        let handle = &mut self.segments[seg];
        if handle.reader.is_deleted(local) {
            return Ok(()); // already gone in a committed generation
        }
        if handle.pending.insert(local) {
            self.dirty = true;
        }
        Ok(())
    }

    /// Drop every tombstone added since the last commit. Deletions already
    /// committed are permanent.
    pub fn undelete_all(&mut self) -> Result<()> {
        for handle in &mut self.segments {
            if !handle.pending.is_empty() {
                handle.pending.clear();
                self.dirty = true;
            }
        }
        Ok(())
    }

    /// Publish all buffered documents and tombstones as a new generation
    pub fn commit(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        if !self.dirty && self.pending_format.is_none() {
            return Ok(());
        }

        self.apply_pending_deletes()?;
        self.maybe_merge()?;

        if let Some(format) = self.pending_format.take() {
            self.infos.format = format;
        }
        self.infos.write(self.dir.as_ref())?;
        self.dirty = false;
        info!(generation = self.infos.generation, "committed");

        self.delete_unused_files();
        Ok(())
    }

    /// Merge everything down to a single segment and commit
    pub fn optimize(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.flush()?;
        }
        self.apply_pending_deletes()?;

        loop {
            let doc_counts: Vec<u64> = self
                .infos
                .segments
                .iter()
                .map(|s| s.doc_count as u64)
                .collect();
            let has_deletions = self.has_committed_deletions();
            let max_merge_docs = self.config.max_merge_docs;
            let Some(group) = optimize_group(&doc_counts, has_deletions, max_merge_docs) else {
                break;
            };
            self.merge_segments(group)?;
        }

        if self.dirty || self.pending_format.is_some() {
            if let Some(format) = self.pending_format.take() {
                self.infos.format = format;
            }
            self.infos.write(self.dir.as_ref())?;
            self.dirty = false;
            info!(generation = self.infos.generation, "optimized");
            self.delete_unused_files();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // read path

    /// Run a query and return hits ranked by score
    pub fn find(&self, query: &Query) -> Result<Vec<QueryHit>> {
        let ctxs = self.snapshot_ctxs();
        let snapshot = Snapshot {
            segments: &ctxs,
            similarity: self.similarity.as_ref(),
        };
        search::execute(&snapshot, query)
    }

    /// Stored fields of a live document
    pub fn get_document(&self, doc: u32) -> Result<Document> {
        let (seg, local) = self.locate(doc)?;
        let handle = &self.segments[seg];
        if handle.reader.is_deleted(local) || handle.pending.contains(local) {
            return Err(NautexError::invalid_argument(format!(
                "document {doc} is deleted"
            )));
        }
        handle.reader.document(local)
    }

    /// Total documents including tombstoned ones
    pub fn max_doc(&self) -> u32 {
        self.infos.total_doc_count() as u32
    }

    /// Live documents
    pub fn num_docs(&self) -> u32 {
        self.segments
            .iter()
            .map(|h| h.reader.num_docs() - h.pending.len() as u32)
            .sum()
    }

    pub fn has_deletions(&self) -> bool {
        self.segments
            .iter()
            .any(|h| h.reader.has_deletions() || !h.pending.is_empty())
    }

    /// All terms of the index, ascending by `(field, text)`
    pub fn terms(&self) -> MultiTerms {
        MultiTerms::new(self.readers(), None)
    }

    /// All terms `>=` the given one
    pub fn terms_from(&self, term: &Term) -> MultiTerms {
        MultiTerms::new(self.readers(), Some(term.clone()))
    }

    /// Global ids of live documents containing `term`
    pub fn term_docs(&self, term: &Term) -> Result<Vec<u32>> {
        search::term_docs(&self.snapshot_ctxs(), term)
    }

    /// `(doc, freq)` pairs for `term`
    pub fn term_freqs(&self, term: &Term) -> Result<Vec<(u32, u32)>> {
        search::term_freqs(&self.snapshot_ctxs(), term)
    }

    /// `(doc, positions)` pairs for `term`
    pub fn term_positions(&self, term: &Term) -> Result<Vec<(u32, Vec<u32>)>> {
        search::term_positions(&self.snapshot_ctxs(), term)
    }

    /// Number of live documents containing `term`
    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        let ctxs = self.snapshot_ctxs();
        let snapshot = Snapshot {
            segments: &ctxs,
            similarity: self.similarity.as_ref(),
        };
        snapshot.doc_freq(term)
    }

    /// Field names across all segments, sorted; `indexed_only` restricts to
    /// searchable fields
    pub fn field_names(&self, indexed_only: bool) -> Vec<String> {
        let mut names = BTreeSet::new();
        for handle in &self.segments {
            for field in handle.reader.field_infos().iter() {
                if !indexed_only || field.indexed {
                    names.insert(field.name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Norm byte for `(doc, field)`; fields indexed without norms read as
    /// `encode_norm(1.0)`
    pub fn norm(&self, doc: u32, field: &str) -> Result<u8> {
        if !self.field_names(false).iter().any(|n| n == field) {
            return Err(NautexError::invalid_argument(format!(
                "unknown field: {field}"
            )));
        }
        let (seg, local) = self.locate(doc)?;
        Ok(match self.segments[seg].reader.norms(field) {
            Some(bytes) => bytes[local as usize],
            None => encode_norm(1.0),
        })
    }

    // ------------------------------------------------------------------
    // configuration surface

    pub fn get_format_version(&self) -> i32 {
        self.pending_format.unwrap_or(self.infos.format)
    }

    /// Accepts only the supported format tag; takes effect at next commit
    pub fn set_format_version(&mut self, version: i32) -> Result<()> {
        if version != crate::segment::SEGMENTS_FORMAT {
            return Err(NautexError::invalid_argument(format!(
                "unsupported format version {version}"
            )));
        }
        self.pending_format = Some(version);
        Ok(())
    }

    pub fn get_max_buffered_docs(&self) -> u32 {
        self.config.max_buffered_docs
    }

    pub fn set_max_buffered_docs(&mut self, value: u32) -> Result<()> {
        if value < 1 {
            return Err(NautexError::invalid_argument(
                "max_buffered_docs must be at least 1",
            ));
        }
        self.config.max_buffered_docs = value;
        Ok(())
    }

    pub fn get_max_merge_docs(&self) -> u32 {
        self.config.max_merge_docs
    }

    pub fn set_max_merge_docs(&mut self, value: u32) -> Result<()> {
        if value < 1 {
            return Err(NautexError::invalid_argument(
                "max_merge_docs must be at least 1",
            ));
        }
        self.config.max_merge_docs = value;
        Ok(())
    }

    pub fn get_merge_factor(&self) -> u32 {
        self.config.merge_factor
    }

    pub fn set_merge_factor(&mut self, value: u32) -> Result<()> {
        if value < 2 {
            return Err(NautexError::invalid_argument(
                "merge_factor must be at least 2",
            ));
        }
        self.config.merge_factor = value;
        Ok(())
    }

    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    // ------------------------------------------------------------------
    // internals

    fn readers(&self) -> Vec<Arc<SegmentReader>> {
        self.segments.iter().map(|h| h.reader.clone()).collect()
    }

    fn snapshot_ctxs(&self) -> Vec<SegmentCtx> {
        let mut base = 0;
        self.segments
            .iter()
            .map(|handle| {
                let ctx = SegmentCtx {
                    reader: handle.reader.clone(),
                    base,
                    overlay: if handle.pending.is_empty() {
                        None
                    } else {
                        Some(Arc::new(handle.pending.clone()))
                    },
                };
                base += handle.reader.max_doc();
                ctx
            })
            .collect()
    }

    /// Map a global doc id to `(segment index, local id)`
    fn locate(&self, doc: u32) -> Result<(usize, u32)> {
        let mut base = 0;
        for (i, handle) in self.segments.iter().enumerate() {
            let max = handle.reader.max_doc();
            if doc < base + max {
                return Ok((i, doc - base));
            }
            base += max;
        }
        Err(NautexError::invalid_argument(format!(
            "document {doc} out of range (max {base})"
        )))
    }

    /// Write the buffer out as a new segment and run the merge policy
    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let name = self.infos.next_segment_name();
        let buffer = std::mem::take(&mut self.buffer);
        let info = SegmentWriter::new(self.dir.as_ref(), name, &self.config).write(&buffer)?;
        let reader = Arc::new(SegmentReader::open(self.dir.as_ref(), &info)?);
        self.infos.segments.push(info);
        self.segments.push(SegmentHandle {
            reader,
            pending: RoaringBitmap::new(),
        });
        self.dirty = true;
        self.maybe_merge()
    }

    /// Rewrite the tombstone bitmaps of segments with pending deletions
    fn apply_pending_deletes(&mut self) -> Result<()> {
        for (handle, info) in self.segments.iter_mut().zip(&mut self.infos.segments) {
            if handle.pending.is_empty() {
                continue;
            }
            let mut bits = match handle.reader.deletions() {
                Some(existing) => (*existing).clone(),
                None => BitVector::new(info.doc_count),
            };
            for local in handle.pending.iter() {
                bits.set(local);
            }
            info.advance_del_gen();
            let file = info.del_file_name().expect("del gen advanced");
            bits.write(self.dir.as_ref(), &file)?;
            handle
                .reader
                .set_deletions(Arc::new(bits), info.del_gen);
            handle.pending.clear();
        }
        Ok(())
    }

    /// Run the merge policy until no level overflows
    fn maybe_merge(&mut self) -> Result<()> {
        loop {
            let doc_counts: Vec<u32> =
                self.infos.segments.iter().map(|s| s.doc_count).collect();
            let frozen: Vec<bool> = self
                .segments
                .iter()
                .map(|h| !h.pending.is_empty())
                .collect();
            let Some(group) = merge_policy::find_merge(
                &doc_counts,
                &frozen,
                self.config.merge_factor,
                self.config.max_merge_docs,
            ) else {
                return Ok(());
            };
            self.merge_segments(group)?;
        }
    }

    /// Merge the segments at `indices` (ascending) into one new segment
    fn merge_segments(&mut self, indices: Vec<usize>) -> Result<()> {
        let name = self.infos.next_segment_name();
        let readers: Vec<Arc<SegmentReader>> = indices
            .iter()
            .map(|&i| self.segments[i].reader.clone())
            .collect();
        let merged =
            SegmentMerger::new(self.dir.as_ref(), name, &self.config, readers).merge()?;
        let reader = Arc::new(SegmentReader::open(self.dir.as_ref(), &merged)?);

        let first = indices[0];
        for &i in indices.iter().rev() {
            self.infos.segments.remove(i);
            self.segments.remove(i);
        }
        self.infos.segments.insert(first, merged);
        self.segments.insert(
            first,
            SegmentHandle {
                reader,
                pending: RoaringBitmap::new(),
            },
        );
        self.dirty = true;
        Ok(())
    }

    fn has_committed_deletions(&self) -> bool {
        self.segments.iter().any(|h| h.reader.has_deletions())
    }

    /// Remove index files no commit references, skipping anything a live
    /// reader has pinned
    fn delete_unused_files(&self) {
        let mut referenced: BTreeSet<String> = BTreeSet::new();
        for handle in &self.segments {
            referenced.extend(handle.reader.files());
        }
        referenced.insert(SegmentInfos::file_name_from_generation(
            self.infos.generation,
        ));

        let Ok(names) = self.dir.list_all() else {
            return;
        };
        for name in names {
            let is_index_file = name.starts_with('_') || name.starts_with("segments_");
            if !is_index_file || referenced.contains(&name) {
                continue;
            }
            if self.dir.is_pinned(&name) {
                debug!(file = %name, "skipping pinned file");
                continue;
            }
            debug!(file = %name, "deleting unreferenced file");
            let _ = self.dir.delete_file(&name);
        }
    }
}

fn validate_config(config: &IndexConfig) -> Result<()> {
    if config.merge_factor < 2 {
        return Err(NautexError::invalid_argument(
            "merge_factor must be at least 2",
        ));
    }
    if config.max_buffered_docs < 1 {
        return Err(NautexError::invalid_argument(
            "max_buffered_docs must be at least 1",
        ));
    }
    if config.skip_interval < 2 || config.term_index_interval < 1 {
        return Err(NautexError::invalid_argument(
            "skip_interval must be >= 2 and term_index_interval >= 1",
        ));
    }
    Ok(())
}

/// Group of segment indices optimize should merge next: the first window
/// of at least two consecutive mergeable segments whose doc sum fits under
/// `max_merge_docs`; a lone segment qualifies only to expunge committed
/// tombstones. Segments too large to merge restart the scan after them
/// rather than ending it, so mergeable runs later in the list are still
/// found.
fn optimize_group(
    doc_counts: &[u64],
    has_deletions: bool,
    max_merge_docs: u32,
) -> Option<Vec<usize>> {
    if doc_counts.is_empty() || (doc_counts.len() <= 1 && !has_deletions) {
        return None;
    }
    let cap = max_merge_docs as u64;

    let mut group: Vec<usize> = Vec::new();
    let mut total = 0u64;
    for (i, &docs) in doc_counts.iter().enumerate() {
        if docs > cap {
            // an oversized segment never merges; keep a window already
            // worth merging, otherwise restart accumulation after it
            if group.len() >= 2 {
                break;
            }
            group.clear();
            total = 0;
            continue;
        }
        // slide the window forward until this segment fits
        while total + docs > cap {
            if group.len() >= 2 {
                return Some(group);
            }
            let dropped = group.remove(0);
            total -= doc_counts[dropped];
        }
        group.push(i);
        total += docs;
    }

    match group.len() {
        0 => None,
        1 => {
            if doc_counts.len() == 1 && has_deletions {
                Some(group)
            } else {
                None
            }
        }
        _ => Some(group),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_group_all_fit() {
        assert_eq!(
            optimize_group(&[5, 5, 5], false, u32::MAX),
            Some(vec![0, 1, 2])
        );
        assert_eq!(optimize_group(&[5], false, u32::MAX), None);
        assert_eq!(optimize_group(&[5], true, u32::MAX), Some(vec![0]));
        assert_eq!(optimize_group(&[], false, u32::MAX), None);
    }

    #[test]
    fn test_optimize_group_respects_cap() {
        // only the first two fit under the cap together
        assert_eq!(optimize_group(&[400, 400, 400], false, 1000), Some(vec![0, 1]));
        // a giant segment is left alone
        assert_eq!(optimize_group(&[5000, 1, 1], false, 1000), Some(vec![1, 2]));
    }

    #[test]
    fn test_optimize_group_scans_past_oversized_segment() {
        // a partial window before the giant must not end the scan; the
        // run after it still merges
        assert_eq!(
            optimize_group(&[500, 5000, 400, 400], false, 1000),
            Some(vec![2, 3])
        );
        // nothing mergeable on either side of the giant
        assert_eq!(optimize_group(&[500, 5000, 800], false, 1000), None);
    }

    #[test]
    fn test_optimize_group_slides_window_on_overflow() {
        // [0] alone busts the cap with [1]; sliding finds [1, 2]
        assert_eq!(
            optimize_group(&[600, 600, 400], false, 1000),
            Some(vec![1, 2])
        );
        // a finished window wins over sliding further
        assert_eq!(
            optimize_group(&[300, 300, 900], false, 1000),
            Some(vec![0, 1])
        );
        assert_eq!(optimize_group(&[600, 600], false, 1000), None);
    }
}

//! Index-wide term enumeration
//!
//! Merges the per-segment dictionaries into one ascending `(field, text)`
//! stream with summed document frequencies. Segments may have assigned
//! their field ordinals in different orders, so the merge walks field
//! names in sorted order and heap-merges one field at a time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Result;
use crate::segment::{SegmentReader, SegmentTerms, Term};

/// Ascending cursor over every term of the index
pub struct MultiTerms {
    readers: Vec<Arc<SegmentReader>>,
    /// Field names not yet visited, ascending
    fields: VecDeque<String>,
    /// Seek point applying to the first visited field only
    start: Option<Term>,
    current_field: Option<String>,
    cursors: Vec<Option<SegmentTerms>>,
    heap: BinaryHeap<Entry>,
}

/// Heap element, min-ordered by `(text, reader index)`
struct Entry {
    text: String,
    doc_freq: u32,
    idx: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.idx == other.idx
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.text.as_str(), other.idx).cmp(&(self.text.as_str(), self.idx))
    }
}

impl MultiTerms {
    /// Cursor over all terms, or over those `>= start` when given
    pub(crate) fn new(readers: Vec<Arc<SegmentReader>>, start: Option<Term>) -> Self {
        let mut names: Vec<String> = Vec::new();
        for reader in &readers {
            for field in reader.field_infos().iter() {
                if field.indexed && !names.contains(&field.name) {
                    names.push(field.name.clone());
                }
            }
        }
        names.sort();
        if let Some(start_term) = &start {
            names.retain(|n| n.as_str() >= start_term.field.as_str());
        }

        let cursors = readers.iter().map(|_| None).collect();
        Self {
            readers,
            fields: names.into(),
            start,
            current_field: None,
            cursors,
            heap: BinaryHeap::new(),
        }
    }

    fn open_next_field(&mut self) -> Result<bool> {
        let Some(field) = self.fields.pop_front() else {
            self.current_field = None;
            return Ok(false);
        };

        let seek_text = match &self.start {
            Some(term) if term.field == field => term.text.clone(),
            _ => String::new(),
        };
        self.heap.clear();
        for (idx, reader) in self.readers.iter().enumerate() {
            let cursor = reader.terms_from(&Term::new(field.clone(), seek_text.clone()))?;
            if let Some(entry) = entry_for(&cursor, &field, idx)? {
                self.heap.push(entry);
            }
            self.cursors[idx] = Some(cursor);
        }
        self.current_field = Some(field);
        Ok(true)
    }

    /// Next `(term, summed doc_freq)` pair, `None` at the end
    pub fn next(&mut self) -> Result<Option<(Term, u32)>> {
        loop {
            if self.heap.is_empty() && !self.open_next_field()? {
                return Ok(None);
            }
            let Some(first) = self.heap.pop() else {
                continue; // field had no terms at or past the seek point
            };

            let field = self.current_field.clone().expect("field open");
            let mut doc_freq = first.doc_freq;
            let mut group = vec![first.idx];
            while self
                .heap
                .peek()
                .map_or(false, |e| e.text == first.text)
            {
                let e = self.heap.pop().unwrap();
                doc_freq += e.doc_freq;
                group.push(e.idx);
            }

            for idx in group {
                let cursor = self.cursors[idx].as_mut().expect("cursor open");
                cursor.next()?;
                if let Some(entry) = entry_for(cursor, &field, idx)? {
                    self.heap.push(entry);
                }
            }

            return Ok(Some((Term::new(field, first.text), doc_freq)));
        }
    }
}

fn entry_for(cursor: &SegmentTerms, field: &str, idx: usize) -> Result<Option<Entry>> {
    match cursor.term()? {
        Some(term) if term.field == field => Ok(Some(Entry {
            text: term.text,
            doc_freq: cursor.info().expect("positioned cursor").doc_freq,
            idx,
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::Analyzer;
    use crate::config::IndexConfig;
    use crate::document::{Document, Field};
    use crate::segment::{DocumentBuffer, SegmentInfo, SegmentWriter};
    use crate::store::RamDirectory;

    use super::*;

    fn flush(dir: &RamDirectory, name: &str, docs: &[Document]) -> SegmentInfo {
        let analyzer = Analyzer::default();
        let mut buffer = DocumentBuffer::new();
        for doc in docs {
            buffer.add_document(doc, &analyzer).unwrap();
        }
        let config = IndexConfig::default();
        SegmentWriter::new(dir, name, &config).write(&buffer).unwrap()
    }

    #[test]
    fn test_merged_enumeration_sums_doc_freq() {
        let dir = RamDirectory::new();
        let a = flush(
            &dir,
            "_0",
            &[Document::new().with(Field::text("body", "apple banana"))],
        );
        let b = flush(
            &dir,
            "_1",
            &[Document::new().with(Field::text("body", "banana cherry"))],
        );

        let readers = vec![
            Arc::new(SegmentReader::open(&dir, &a).unwrap()),
            Arc::new(SegmentReader::open(&dir, &b).unwrap()),
        ];
        let mut terms = MultiTerms::new(readers, None);

        let mut seen = Vec::new();
        while let Some((term, df)) = terms.next().unwrap() {
            seen.push((term.text, df));
        }
        assert_eq!(
            seen,
            vec![
                ("apple".to_string(), 1),
                ("banana".to_string(), 2),
                ("cherry".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_fields_ordered_by_name_across_segments() {
        let dir = RamDirectory::new();
        // segment _0 sees fields (z, a); _1 sees only m
        let a = flush(
            &dir,
            "_0",
            &[Document::new()
                .with(Field::text("z", "zulu"))
                .with(Field::text("a", "alfa"))],
        );
        let b = flush(
            &dir,
            "_1",
            &[Document::new().with(Field::text("m", "mike"))],
        );

        let readers = vec![
            Arc::new(SegmentReader::open(&dir, &a).unwrap()),
            Arc::new(SegmentReader::open(&dir, &b).unwrap()),
        ];
        let mut terms = MultiTerms::new(readers, None);

        let mut fields = Vec::new();
        while let Some((term, _)) = terms.next().unwrap() {
            fields.push(term.field);
        }
        assert_eq!(fields, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_seek_start() {
        let dir = RamDirectory::new();
        let a = flush(
            &dir,
            "_0",
            &[Document::new().with(Field::text("body", "ant bee cow dog"))],
        );
        let readers = vec![Arc::new(SegmentReader::open(&dir, &a).unwrap())];
        let mut terms = MultiTerms::new(readers, Some(Term::new("body", "bee")));

        let mut seen = Vec::new();
        while let Some((term, _)) = terms.next().unwrap() {
            seen.push(term.text);
        }
        assert_eq!(seen, vec!["bee", "cow", "dog"]);
    }
}

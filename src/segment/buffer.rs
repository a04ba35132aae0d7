//! In-RAM buffer for documents awaiting flush
//!
//! Holds the same data a segment does — postings with positions, stored
//! fields, norms — but in growable memory structures. Flushing copies it
//! out through [`SegmentWriter`](super::SegmentWriter) without touching
//! the analyzed text again.

use std::collections::{BTreeMap, HashMap};

use crate::analysis::Analyzer;
use crate::document::{Document, FieldValue};
use crate::error::{NautexError, Result};

use super::field_infos::FieldInfos;
use super::norms::encode_norm;

/// Postings of one `(field, term)` pair, doc-ordered
#[derive(Debug, Default)]
pub(crate) struct BufferedPostings {
    /// `(local doc id, positions)`; docs strictly ascending
    pub entries: Vec<(u32, Vec<u32>)>,
}

/// Mutable pre-flush index over a batch of documents
pub struct DocumentBuffer {
    /// term text -> postings, nested under field name
    postings: HashMap<String, BTreeMap<String, BufferedPostings>>,
    field_infos: FieldInfos,
    /// stored-field snapshots, one per doc
    stored: Vec<Document>,
    /// field name -> norm bytes (padded lazily to doc count)
    norms: HashMap<String, Vec<u8>>,
    doc_count: u32,
}

impl DocumentBuffer {
    pub fn new() -> Self {
        Self {
            postings: HashMap::new(),
            field_infos: FieldInfos::new(),
            stored: Vec::new(),
            norms: HashMap::new(),
            doc_count: 0,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    /// Analyze and buffer one document
    pub fn add_document(&mut self, doc: &Document, analyzer: &Analyzer) -> Result<()> {
        if doc.is_empty() {
            return Err(NautexError::invalid_argument(
                "document has no fields",
            ));
        }

        let local = self.doc_count;
        // tokens and boost accumulate across same-named field instances
        let mut field_lengths: HashMap<String, u32> = HashMap::new();
        let mut field_boosts: HashMap<String, f32> = HashMap::new();

        for field in doc.fields() {
            self.field_infos.add(&field.name, field.indexed);

            if !field.indexed {
                continue;
            }
            let text = match &field.value {
                FieldValue::Text(text) => text,
                // binary values are stored-only
                FieldValue::Binary(_) => continue,
            };

            let offset = *field_lengths.get(&field.name).unwrap_or(&0);
            let mut added = 0u32;
            let by_term = self.postings.entry(field.name.clone()).or_default();

            if field.tokenized {
                for token in analyzer.analyze(text) {
                    push_position(by_term, &token.text, local, offset + token.position);
                    added += 1;
                }
            } else {
                push_position(by_term, text, local, offset);
                added = 1;
            }

            *field_lengths.entry(field.name.clone()).or_insert(0) += added;
            *field_boosts.entry(field.name.clone()).or_insert(1.0) *= field.boost;
        }

        for (name, num_tokens) in &field_lengths {
            let boost = doc.boost() * field_boosts[name];
            let norm = if *num_tokens == 0 {
                0.0
            } else {
                boost / (*num_tokens as f32).sqrt()
            };
            let bytes = self.norms.entry(name.clone()).or_default();
            bytes.resize(local as usize, 0);
            bytes.push(encode_norm(norm));
        }

        self.stored.push(doc.clone());
        self.doc_count += 1;
        Ok(())
    }

    pub(crate) fn field_infos(&self) -> &FieldInfos {
        &self.field_infos
    }

    pub(crate) fn stored_docs(&self) -> &[Document] {
        &self.stored
    }

    /// Postings of one field in term order, if the field was ever indexed
    pub(crate) fn field_postings(
        &self,
        field: &str,
    ) -> Option<&BTreeMap<String, BufferedPostings>> {
        self.postings.get(field)
    }

    /// Norm bytes for one field, padded to the full doc count
    pub(crate) fn field_norms(&self, field: &str) -> Vec<u8> {
        let mut bytes = self.norms.get(field).cloned().unwrap_or_default();
        bytes.resize(self.doc_count as usize, 0);
        bytes
    }
}

impl Default for DocumentBuffer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_position(
    by_term: &mut BTreeMap<String, BufferedPostings>,
    term: &str,
    doc: u32,
    position: u32,
) {
    let postings = by_term.entry(term.to_string()).or_default();
    match postings.entries.last_mut() {
        Some((last_doc, positions)) if *last_doc == doc => positions.push(position),
        _ => postings.entries.push((doc, vec![position])),
    }
}

#[cfg(test)]
mod tests {
    use crate::document::Field;

    use super::*;

    fn analyzer() -> Analyzer {
        Analyzer::default()
    }

    #[test]
    fn test_buffer_accumulates_postings() {
        let mut buffer = DocumentBuffer::new();
        let a = analyzer();

        buffer
            .add_document(
                &Document::new().with(Field::text("body", "hello world hello")),
                &a,
            )
            .unwrap();
        buffer
            .add_document(&Document::new().with(Field::text("body", "world")), &a)
            .unwrap();

        assert_eq!(buffer.doc_count(), 2);
        let body = buffer.field_postings("body").unwrap();

        let hello = &body["hello"];
        assert_eq!(hello.entries, vec![(0, vec![0, 2])]);

        let world = &body["world"];
        assert_eq!(world.entries, vec![(0, vec![1]), (1, vec![0])]);
    }

    #[test]
    fn test_keyword_field_single_token() {
        let mut buffer = DocumentBuffer::new();
        buffer
            .add_document(
                &Document::new().with(Field::keyword("id", "Doc-1")),
                &analyzer(),
            )
            .unwrap();

        // keyword fields bypass the analyzer entirely
        let id = buffer.field_postings("id").unwrap();
        assert!(id.contains_key("Doc-1"));
        assert_eq!(id["Doc-1"].entries, vec![(0, vec![0])]);
    }

    #[test]
    fn test_repeated_fields_concatenate_positions() {
        let mut buffer = DocumentBuffer::new();
        let doc = Document::new()
            .with(Field::text("body", "a b"))
            .with(Field::text("body", "c"));
        buffer.add_document(&doc, &analyzer()).unwrap();

        let body = buffer.field_postings("body").unwrap();
        assert_eq!(body["c"].entries, vec![(0, vec![2])]);
    }

    #[test]
    fn test_norms_padded_for_missing_fields() {
        let mut buffer = DocumentBuffer::new();
        let a = analyzer();
        buffer
            .add_document(&Document::new().with(Field::text("title", "one two")), &a)
            .unwrap();
        buffer
            .add_document(&Document::new().with(Field::text("other", "x")), &a)
            .unwrap();

        let title = buffer.field_norms("title");
        assert_eq!(title.len(), 2);
        assert_eq!(title[0], encode_norm(1.0 / 2f32.sqrt()));
        assert_eq!(title[1], 0); // doc 1 has no title

        let other = buffer.field_norms("other");
        assert_eq!(other[0], 0);
        assert_eq!(other[1], encode_norm(1.0));
    }

    #[test]
    fn test_boosts_fold_into_norms() {
        let mut buffer = DocumentBuffer::new();
        let doc = Document::new()
            .with(Field::text("t", "word").with_boost(2.0))
            .with_doc_boost(3.0);
        buffer.add_document(&doc, &analyzer()).unwrap();

        assert_eq!(buffer.field_norms("t")[0], encode_norm(6.0));
    }

    #[test]
    fn test_empty_document_rejected() {
        let mut buffer = DocumentBuffer::new();
        assert!(matches!(
            buffer.add_document(&Document::new(), &analyzer()),
            Err(NautexError::InvalidArgument(_))
        ));
    }
}

//! Documents and fields
//!
//! A document is an ordered list of named fields. Each field carries flags
//! deciding whether its value is kept in the stored-fields files, whether it
//! is indexed, and whether indexing runs the analyzer over it.

use serde::{Deserialize, Serialize};

/// A field value: analyzed/stored text or opaque bytes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Binary(Vec<u8>),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Binary(b) => Some(b),
            FieldValue::Text(_) => None,
        }
    }
}

/// One named field of a document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub stored: bool,
    pub indexed: bool,
    pub tokenized: bool,
    /// Multiplied into the field's norm byte at flush time
    pub boost: f32,
}

impl Field {
    /// Stored, indexed, analyzed text (the common case for body text)
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            stored: true,
            indexed: true,
            tokenized: true,
            boost: 1.0,
        }
    }

    /// Stored and indexed as a single term, not analyzed (ids, tags)
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            stored: true,
            indexed: true,
            tokenized: false,
            boost: 1.0,
        }
    }

    /// Stored only, never searchable
    pub fn unindexed(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            stored: true,
            indexed: false,
            tokenized: false,
            boost: 1.0,
        }
    }

    /// Indexed and analyzed but not kept in the stored fields
    pub fn unstored(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Text(value.into()),
            stored: false,
            indexed: true,
            tokenized: true,
            boost: 1.0,
        }
    }

    /// Stored opaque bytes, never indexed
    pub fn binary(name: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Binary(value),
            stored: true,
            indexed: false,
            tokenized: false,
            boost: 1.0,
        }
    }

    /// Set the field boost
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.value, FieldValue::Binary(_))
    }
}

/// An ordered list of fields plus a document-level boost
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: Vec<Field>,
    boost: Option<f32>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            boost: None,
        }
    }

    /// Add a field; fields with the same name may repeat
    pub fn add(&mut self, field: Field) -> &mut Self {
        self.fields.push(field);
        self
    }

    /// Builder-style variant of [`add`](Self::add)
    pub fn with(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Set the document boost, folded into every field norm
    pub fn with_doc_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    pub fn boost(&self) -> f32 {
        self.boost.unwrap_or(1.0)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First text value for a field name, if any
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_text())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_constructors() {
        let f = Field::text("body", "hello world");
        assert!(f.stored && f.indexed && f.tokenized);

        let f = Field::keyword("id", "doc-1");
        assert!(f.stored && f.indexed && !f.tokenized);

        let f = Field::unindexed("raw", "payload");
        assert!(f.stored && !f.indexed);

        let f = Field::unstored("body", "hello");
        assert!(!f.stored && f.indexed && f.tokenized);

        let f = Field::binary("blob", vec![1, 2, 3]);
        assert!(f.is_binary());
        assert_eq!(f.value.as_bytes(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_document_lookup() {
        let doc = Document::new()
            .with(Field::text("title", "the quick brown fox"))
            .with(Field::keyword("id", "1"));

        assert_eq!(doc.get("title"), Some("the quick brown fox"));
        assert_eq!(doc.get("id"), Some("1"));
        assert_eq!(doc.get("missing"), None);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_boosts() {
        let doc = Document::new()
            .with(Field::text("t", "x").with_boost(2.0))
            .with_doc_boost(3.0);
        assert_eq!(doc.boost(), 3.0);
        assert_eq!(doc.fields()[0].boost, 2.0);
    }
}

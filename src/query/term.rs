//! Term query: exact match on one `(field, text)` pair

use serde::{Deserialize, Serialize};

use crate::segment::Term;

/// The most basic query: documents containing an exact term
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub term: Term,
    pub boost: f32,
}

impl TermQuery {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            term: Term::new(field, text),
            boost: 1.0,
        }
    }

    pub fn for_term(term: Term) -> Self {
        Self { term, boost: 1.0 }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let q = TermQuery::new("title", "rust").with_boost(2.0);
        assert_eq!(q.term, Term::new("title", "rust"));
        assert_eq!(q.boost, 2.0);
    }
}

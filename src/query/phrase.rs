//! Phrase query: terms at relative positions, with optional slop

use serde::{Deserialize, Serialize};

use crate::segment::Term;

use super::{Query, TermQuery};

/// Matches documents where the terms occur at their relative positions,
/// allowing up to `slop` position edits
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    /// `(text, position)` pairs; positions need not be contiguous
    pub terms: Vec<(String, u32)>,
    pub slop: u32,
    pub boost: f32,
}

impl PhraseQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            terms: Vec::new(),
            slop: 0,
            boost: 1.0,
        }
    }

    /// Append a term at the next position
    pub fn add(mut self, text: impl Into<String>) -> Self {
        let position = self.terms.last().map_or(0, |(_, p)| p + 1);
        self.terms.push((text.into(), position));
        self
    }

    /// Append a term at an explicit position
    pub fn add_at(mut self, text: impl Into<String>, position: u32) -> Self {
        self.terms.push((text.into(), position));
        self
    }

    pub fn with_slop(mut self, slop: u32) -> Self {
        self.slop = slop;
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    /// Terms paired with their query positions
    pub(crate) fn terms(&self) -> Vec<(Term, u32)> {
        self.terms
            .iter()
            .map(|(text, pos)| (Term::new(self.field.clone(), text.clone()), *pos))
            .collect()
    }

    /// A one-term phrase is just that term
    pub(crate) fn rewrite(&self) -> Query {
        match self.terms.as_slice() {
            [] => Query::Empty,
            [(text, _)] => Query::Term(
                TermQuery::new(self.field.clone(), text.clone()).with_boost(self.boost),
            ),
            _ => Query::Phrase(self.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_assigned_in_order() {
        let q = PhraseQuery::new("body").add("quick").add("fox");
        assert_eq!(q.terms, vec![("quick".to_string(), 0), ("fox".to_string(), 1)]);
    }

    #[test]
    fn test_explicit_positions() {
        let q = PhraseQuery::new("body").add_at("a", 0).add_at("c", 2);
        assert_eq!(q.terms[1], ("c".to_string(), 2));
    }

    #[test]
    fn test_single_term_rewrites_to_term() {
        let q = PhraseQuery::new("body").add("only").with_boost(3.0);
        match q.rewrite() {
            Query::Term(t) => {
                assert_eq!(t.term.text, "only");
                assert_eq!(t.boost, 3.0);
            }
            other => panic!("expected term query, got {}", other.kind()),
        }
    }

    #[test]
    fn test_empty_phrase_rewrites_to_empty() {
        assert_eq!(PhraseQuery::new("body").rewrite(), Query::Empty);
    }
}

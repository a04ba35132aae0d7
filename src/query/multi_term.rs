//! Multi-term query: a flat bag of terms with signs
//!
//! The intermediate form Fuzzy/Wildcard/Range expansion produces; lowers
//! to a Boolean of term queries.

use serde::{Deserialize, Serialize};

use crate::error::{NautexError, Result};
use crate::segment::Term;

use super::{BooleanQuery, Occur, Query, TermQuery, MAX_CLAUSE_COUNT};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiTermQuery {
    pub terms: Vec<(Term, Occur)>,
    pub boost: f32,
}

impl Default for MultiTermQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiTermQuery {
    pub fn new() -> Self {
        Self {
            terms: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn add(mut self, term: Term, occur: Occur) -> Self {
        self.terms.push((term, occur));
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub(crate) fn rewrite(&self) -> Result<Query> {
        if self.terms.is_empty() {
            return Ok(Query::Empty);
        }
        if self.terms.len() > MAX_CLAUSE_COUNT {
            return Err(NautexError::invalid_argument(format!(
                "multi-term query expands to {} terms (limit {MAX_CLAUSE_COUNT})",
                self.terms.len()
            )));
        }
        let mut boolean = BooleanQuery::new().with_boost(self.boost);
        for (term, occur) in &self.terms {
            boolean = boolean.add(TermQuery::for_term(term.clone()), *occur);
        }
        Ok(Query::Boolean(boolean))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowers_to_boolean() {
        let q = MultiTermQuery::new()
            .add(Term::new("t", "color"), Occur::Should)
            .add(Term::new("t", "colour"), Occur::Should)
            .with_boost(2.0);

        match q.rewrite().unwrap() {
            Query::Boolean(b) => {
                assert_eq!(b.clauses.len(), 2);
                assert_eq!(b.boost, 2.0);
                assert!(b
                    .clauses
                    .iter()
                    .all(|c| c.occur == Occur::Should));
            }
            other => panic!("expected boolean, got {}", other.kind()),
        }
    }

    #[test]
    fn test_empty_lowers_to_empty() {
        assert_eq!(MultiTermQuery::new().rewrite().unwrap(), Query::Empty);
    }
}

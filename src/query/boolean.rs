//! Boolean query: REQUIRED / OPTIONAL / PROHIBITED clause combinations

use serde::{Deserialize, Serialize};

use crate::error::{NautexError, Result};
use crate::search::Snapshot;

use super::{Occur, Query};

/// Hard cap on clauses, protecting multi-term expansion from blowing up
pub const MAX_CLAUSE_COUNT: usize = 1024;

/// One clause of a Boolean query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanClause {
    pub query: Query,
    pub occur: Occur,
}

/// Combination of sub-queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BooleanQuery {
    pub clauses: Vec<BooleanClause>,
    pub boost: f32,
}

impl Default for BooleanQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl BooleanQuery {
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
            boost: 1.0,
        }
    }

    pub fn add(mut self, query: impl Into<Query>, occur: Occur) -> Self {
        self.clauses.push(BooleanClause {
            query: query.into(),
            occur,
        });
        self
    }

    /// Add a REQUIRED clause
    pub fn must(self, query: impl Into<Query>) -> Self {
        self.add(query, Occur::Must)
    }

    /// Add an OPTIONAL clause
    pub fn should(self, query: impl Into<Query>) -> Self {
        self.add(query, Occur::Should)
    }

    /// Add a PROHIBITED clause
    pub fn must_not(self, query: impl Into<Query>) -> Self {
        self.add(query, Occur::MustNot)
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub(crate) fn rewrite(&self, snapshot: &Snapshot) -> Result<Query> {
        if self.clauses.len() > MAX_CLAUSE_COUNT {
            return Err(NautexError::invalid_argument(format!(
                "boolean query has {} clauses (limit {MAX_CLAUSE_COUNT})",
                self.clauses.len()
            )));
        }

        let mut rewritten = BooleanQuery::new().with_boost(self.boost);
        for clause in &self.clauses {
            let sub = clause.query.rewrite(snapshot)?;
            match (&sub, clause.occur) {
                // a required impossibility makes the whole query impossible
                (Query::Empty, Occur::Must) => return Ok(Query::Empty),
                // optional/prohibited impossibilities just drop out
                (Query::Empty, _) => {}
                _ => rewritten = rewritten.add(sub, clause.occur),
            }
        }

        if rewritten.is_empty() {
            Ok(Query::Empty)
        } else {
            Ok(Query::Boolean(rewritten))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::query::TermQuery;

    use super::*;

    #[test]
    fn test_builder() {
        let q = BooleanQuery::new()
            .must(TermQuery::new("t", "alpha"))
            .must_not(TermQuery::new("t", "beta"))
            .should(TermQuery::new("t", "gamma"));
        assert_eq!(q.clauses.len(), 3);
        assert_eq!(q.clauses[0].occur, Occur::Must);
        assert_eq!(q.clauses[1].occur, Occur::MustNot);
        assert_eq!(q.clauses[2].occur, Occur::Should);
    }

    #[test]
    fn test_default_boost() {
        let q = BooleanQuery::default();
        assert_eq!(q.boost, 1.0);
        assert!(q.is_empty());
    }
}

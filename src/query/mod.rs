//! Query tree
//!
//! Queries form a small sum type. Before scoring, a query is rewritten
//! against the index: Range, Wildcard and Fuzzy expand into the matching
//! dictionary terms, MultiTerm lowers to Boolean, and what reaches the
//! weighting stage is only Term, Phrase, Boolean and Empty.

mod boolean;
mod fuzzy;
mod multi_term;
mod phrase;
mod range;
mod term;
mod wildcard;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::MultiTerms;
use crate::search::Snapshot;
use crate::segment::Term;

pub use boolean::{BooleanClause, BooleanQuery, MAX_CLAUSE_COUNT};
pub use fuzzy::FuzzyQuery;
pub use multi_term::MultiTermQuery;
pub use phrase::PhraseQuery;
pub use range::RangeQuery;
pub use term::TermQuery;
pub use wildcard::WildcardQuery;

/// How a clause participates in a Boolean query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Occur {
    /// The clause must match (REQUIRED)
    Must,
    /// The clause may match and contributes to the score (OPTIONAL)
    Should,
    /// Documents matching the clause are excluded (PROHIBITED)
    MustNot,
}

/// A search query
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Query {
    Term(TermQuery),
    Phrase(PhraseQuery),
    Boolean(BooleanQuery),
    Range(RangeQuery),
    Fuzzy(FuzzyQuery),
    Wildcard(WildcardQuery),
    MultiTerm(MultiTermQuery),
    /// Matches nothing; the identity of impossible rewrites
    Empty,
}

impl Query {
    pub fn boost(&self) -> f32 {
        match self {
            Query::Term(q) => q.boost,
            Query::Phrase(q) => q.boost,
            Query::Boolean(q) => q.boost,
            Query::Range(q) => q.boost,
            Query::Fuzzy(q) => q.boost,
            Query::Wildcard(q) => q.boost,
            Query::MultiTerm(q) => q.boost,
            Query::Empty => 1.0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::Term(_) => "term",
            Query::Phrase(_) => "phrase",
            Query::Boolean(_) => "boolean",
            Query::Range(_) => "range",
            Query::Fuzzy(_) => "fuzzy",
            Query::Wildcard(_) => "wildcard",
            Query::MultiTerm(_) => "multi_term",
            Query::Empty => "empty",
        }
    }

    /// Expand this query against the index until only Term, Phrase,
    /// Boolean and Empty remain
    pub(crate) fn rewrite(&self, snapshot: &Snapshot) -> Result<Query> {
        match self {
            Query::Term(_) | Query::Empty => Ok(self.clone()),
            Query::Phrase(q) => Ok(q.rewrite()),
            Query::Boolean(q) => q.rewrite(snapshot),
            Query::Range(q) => q.rewrite(snapshot)?.rewrite(snapshot),
            Query::Fuzzy(q) => q.rewrite(snapshot)?.rewrite(snapshot),
            Query::Wildcard(q) => q.rewrite(snapshot)?.rewrite(snapshot),
            Query::MultiTerm(q) => q.rewrite(),
        }
    }
}

impl From<TermQuery> for Query {
    fn from(q: TermQuery) -> Self {
        Query::Term(q)
    }
}

impl From<PhraseQuery> for Query {
    fn from(q: PhraseQuery) -> Self {
        Query::Phrase(q)
    }
}

impl From<BooleanQuery> for Query {
    fn from(q: BooleanQuery) -> Self {
        Query::Boolean(q)
    }
}

impl From<RangeQuery> for Query {
    fn from(q: RangeQuery) -> Self {
        Query::Range(q)
    }
}

impl From<FuzzyQuery> for Query {
    fn from(q: FuzzyQuery) -> Self {
        Query::Fuzzy(q)
    }
}

impl From<WildcardQuery> for Query {
    fn from(q: WildcardQuery) -> Self {
        Query::Wildcard(q)
    }
}

impl From<MultiTermQuery> for Query {
    fn from(q: MultiTermQuery) -> Self {
        Query::MultiTerm(q)
    }
}

/// Term cursor over one field of the snapshot, starting at `start_text`
pub(crate) fn field_terms(snapshot: &Snapshot, field: &str, start_text: &str) -> MultiTerms {
    let readers = snapshot
        .segments
        .iter()
        .map(|ctx| ctx.reader.clone())
        .collect();
    MultiTerms::new(readers, Some(Term::new(field, start_text)))
}

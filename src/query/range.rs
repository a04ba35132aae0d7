//! Range query: all terms of a field between two bounds

use serde::{Deserialize, Serialize};

use crate::error::{NautexError, Result};
use crate::search::Snapshot;

use super::{field_terms, MultiTermQuery, Occur, Query, MAX_CLAUSE_COUNT};

/// Matches documents containing any dictionary term inside the bounds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    pub lower: Option<String>,
    pub upper: Option<String>,
    pub include_lower: bool,
    pub include_upper: bool,
    pub boost: f32,
}

impl RangeQuery {
    pub fn new(
        field: impl Into<String>,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    ) -> Self {
        Self {
            field: field.into(),
            lower,
            upper,
            include_lower,
            include_upper,
            boost: 1.0,
        }
    }

    /// `[lower, upper]`, both ends included
    pub fn inclusive(
        field: impl Into<String>,
        lower: impl Into<String>,
        upper: impl Into<String>,
    ) -> Self {
        Self::new(field, Some(lower.into()), Some(upper.into()), true, true)
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn rewrite(&self, snapshot: &Snapshot) -> Result<Query> {
        let start = self.lower.as_deref().unwrap_or("");
        let mut cursor = field_terms(snapshot, &self.field, start);

        let mut expanded = MultiTermQuery::new().with_boost(self.boost);
        while let Some((term, _)) = cursor.next()? {
            if term.field != self.field {
                break;
            }
            if !self.include_lower && Some(term.text.as_str()) == self.lower.as_deref() {
                continue;
            }
            if let Some(upper) = &self.upper {
                if term.text.as_str() > upper.as_str()
                    || (!self.include_upper && term.text.as_str() == upper.as_str())
                {
                    break;
                }
            }
            if expanded.len() >= MAX_CLAUSE_COUNT {
                return Err(NautexError::invalid_argument(format!(
                    "range on '{}' expands past {MAX_CLAUSE_COUNT} terms",
                    self.field
                )));
            }
            expanded = expanded.add(term, Occur::Should);
        }
        Ok(Query::MultiTerm(expanded))
    }
}

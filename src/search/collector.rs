//! Hit collection
//!
//! Drains a scorer, drops non-positive scores, and orders hits by score
//! descending with ascending doc id as the tiebreak.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::scorer::Scorer;

/// One ranked search hit
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Global document id
    pub doc: u32,
    pub score: f32,
}

/// Exhaust the scorer into a ranked hit list
pub(crate) fn collect_all(scorer: &mut dyn Scorer) -> Result<Vec<QueryHit>> {
    let mut hits = Vec::new();
    while scorer.next()? {
        let score = scorer.score()?;
        if score > 0.0 {
            hits.push(QueryHit {
                doc: scorer.doc(),
                score,
            });
        }
    }
    hits.sort_by_key(|hit| (std::cmp::Reverse(OrderedFloat(hit.score)), hit.doc));
    Ok(hits)
}

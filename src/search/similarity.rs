//! Scoring model
//!
//! The default similarity is the classical tf·idf formulation: square-root
//! term frequency, log-damped inverse document frequency, inverse-sqrt
//! length normalization, a coordination factor for Boolean queries and a
//! query norm making scores comparable across queries.

use std::fmt::Debug;

/// Pluggable scoring primitives
pub trait Similarity: Send + Sync + Debug {
    /// Term-frequency component
    fn tf(&self, freq: f32) -> f32;

    /// Inverse document frequency of a term
    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32;

    /// Length normalization stored in the norm byte at index time
    fn length_norm(&self, num_tokens: u32) -> f32;

    /// Reward for matching more optional clauses of a Boolean query
    fn coord(&self, overlap: u32, max_overlap: u32) -> f32;

    /// Normalization applied to all weights of one query
    fn query_norm(&self, sum_of_squared_weights: f32) -> f32;

    /// Contribution of one sloppy-phrase occurrence at the given edit
    /// distance
    fn sloppy_freq(&self, distance: u32) -> f32 {
        1.0 / (distance as f32 + 1.0)
    }
}

/// tf·idf with the classical constants
#[derive(Clone, Debug, Default)]
pub struct DefaultSimilarity;

impl Similarity for DefaultSimilarity {
    fn tf(&self, freq: f32) -> f32 {
        freq.sqrt()
    }

    fn idf(&self, doc_freq: u32, num_docs: u32) -> f32 {
        1.0 + (num_docs as f32 / (doc_freq as f32 + 1.0)).ln()
    }

    fn length_norm(&self, num_tokens: u32) -> f32 {
        if num_tokens == 0 {
            0.0
        } else {
            1.0 / (num_tokens as f32).sqrt()
        }
    }

    fn coord(&self, overlap: u32, max_overlap: u32) -> f32 {
        if max_overlap == 0 {
            1.0
        } else {
            overlap as f32 / max_overlap as f32
        }
    }

    fn query_norm(&self, sum_of_squared_weights: f32) -> f32 {
        if sum_of_squared_weights <= 0.0 {
            1.0
        } else {
            1.0 / sum_of_squared_weights.sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tf_is_sqrt() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.tf(4.0), 2.0);
        assert_eq!(sim.tf(1.0), 1.0);
    }

    #[test]
    fn test_idf_decreases_with_doc_freq() {
        let sim = DefaultSimilarity;
        let rare = sim.idf(1, 1000);
        let common = sim.idf(999, 1000);
        assert!(rare > common);
        // docFreq == numDocs still yields a positive value
        assert!(sim.idf(1000, 1000) > 0.0);
    }

    #[test]
    fn test_length_norm() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.length_norm(4), 0.5);
        assert_eq!(sim.length_norm(0), 0.0);
    }

    #[test]
    fn test_coord_and_query_norm() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.coord(1, 2), 0.5);
        assert_eq!(sim.coord(0, 0), 1.0);
        assert_eq!(sim.query_norm(4.0), 0.5);
        assert_eq!(sim.query_norm(0.0), 1.0);
    }

    #[test]
    fn test_sloppy_freq() {
        let sim = DefaultSimilarity;
        assert_eq!(sim.sloppy_freq(0), 1.0);
        assert_eq!(sim.sloppy_freq(1), 0.5);
    }
}

//! Fuzzy query: terms within an edit-distance-derived similarity bound
//!
//! A candidate term's similarity to the query term is
//! `1 - distance / (prefix + min(|a|, |b|))` computed over the text after
//! the required exact prefix. Terms above `min_similarity` are collected
//! into a MultiTerm query.

use serde::{Deserialize, Serialize};

use crate::error::{NautexError, Result};
use crate::search::Snapshot;
use crate::segment::Term;

use super::{field_terms, MultiTermQuery, Occur, Query, MAX_CLAUSE_COUNT};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FuzzyQuery {
    pub term: Term,
    /// Similarity threshold in `[0, 1)`; candidates must exceed it
    pub min_similarity: f32,
    /// Leading characters that must match exactly
    pub prefix_length: usize,
    pub boost: f32,
}

impl FuzzyQuery {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            term: Term::new(field, text),
            min_similarity: 0.5,
            prefix_length: 0,
            boost: 1.0,
        }
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn prefix_length(mut self, prefix_length: usize) -> Self {
        self.prefix_length = prefix_length;
        self
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = boost;
        self
    }

    pub(crate) fn rewrite(&self, snapshot: &Snapshot) -> Result<Query> {
        if !(0.0..1.0).contains(&self.min_similarity) {
            return Err(NautexError::invalid_argument(format!(
                "fuzzy minimum similarity {} outside [0, 1)",
                self.min_similarity
            )));
        }

        let target: Vec<char> = self.term.text.chars().collect();
        let prefix_len = self.prefix_length.min(target.len());
        let prefix: String = target[..prefix_len].iter().collect();
        let target_rest = &target[prefix_len..];

        let mut cursor = field_terms(snapshot, &self.term.field, &prefix);
        let mut expanded = MultiTermQuery::new().with_boost(self.boost);
        while let Some((term, _)) = cursor.next()? {
            if term.field != self.term.field || !term.text.starts_with(prefix.as_str()) {
                break;
            }
            let candidate: Vec<char> = term.text.chars().collect();
            let candidate_rest = &candidate[prefix_len.min(candidate.len())..];

            if similarity(target_rest, candidate_rest, prefix_len) > self.min_similarity {
                if expanded.len() >= MAX_CLAUSE_COUNT {
                    return Err(NautexError::invalid_argument(format!(
                        "fuzzy query on '{}' expands past {MAX_CLAUSE_COUNT} terms",
                        self.term
                    )));
                }
                expanded = expanded.add(term, Occur::Should);
            }
        }
        Ok(Query::MultiTerm(expanded))
    }
}

fn similarity(a: &[char], b: &[char], prefix_len: usize) -> f32 {
    let dist = levenshtein(a, b);
    let denom = prefix_len + a.len().min(b.len());
    if denom == 0 {
        return if dist == 0 { 1.0 } else { 0.0 };
    }
    1.0 - dist as f32 / denom as f32
}

/// Plain dynamic-programming edit distance over chars
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            row[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(row[j] + 1);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[b.len()]
}

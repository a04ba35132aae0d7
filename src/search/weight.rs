//! Weights
//!
//! A weight is built once per search from a rewritten query: it snapshots
//! the statistics scoring needs (idf, boosts), takes part in query
//! normalization, and then produces scorers. It deliberately holds no
//! reference to the reader it was built from.

use crate::error::{NautexError, Result};
use crate::query::{Occur, Query};
use crate::segment::Term;

use super::boolean_scorer::BooleanScorer;
use super::phrase_scorer::PhraseScorer;
use super::scorer::{open_postings, Scorer, SubScorer, TermScorer};
use super::Snapshot;

pub(crate) enum Weight {
    Term(TermWeight),
    Phrase(PhraseWeight),
    Boolean(BooleanWeight),
    Empty,
}

impl Weight {
    /// Build the weight tree for a query already rewritten to primitives
    pub fn for_query(query: &Query, snapshot: &Snapshot) -> Result<Weight> {
        match query {
            Query::Term(q) => {
                let idf = snapshot
                    .similarity
                    .idf(snapshot.doc_freq(&q.term)?, snapshot.num_docs().max(1));
                Ok(Weight::Term(TermWeight {
                    term: q.term.clone(),
                    idf,
                    boost: q.boost,
                    query_weight: 0.0,
                    value: 0.0,
                }))
            }
            Query::Phrase(q) => {
                let terms = q.terms();
                if terms.is_empty() {
                    return Ok(Weight::Empty);
                }
                let mut idf = 0.0;
                for (term, _) in &terms {
                    idf += snapshot
                        .similarity
                        .idf(snapshot.doc_freq(term)?, snapshot.num_docs().max(1));
                }
                Ok(Weight::Phrase(PhraseWeight {
                    terms,
                    slop: q.slop,
                    idf,
                    boost: q.boost,
                    query_weight: 0.0,
                    value: 0.0,
                }))
            }
            Query::Boolean(q) => {
                let mut clauses = Vec::with_capacity(q.clauses.len());
                for clause in &q.clauses {
                    clauses.push((Weight::for_query(&clause.query, snapshot)?, clause.occur));
                }
                Ok(Weight::Boolean(BooleanWeight {
                    clauses,
                    boost: q.boost,
                }))
            }
            Query::Empty => Ok(Weight::Empty),
            other => Err(NautexError::invalid_argument(format!(
                "{} query must be rewritten before weighting",
                other.kind()
            ))),
        }
    }

    pub fn sum_of_squared_weights(&mut self) -> f32 {
        match self {
            Weight::Term(w) => {
                w.query_weight = w.idf * w.boost;
                w.query_weight * w.query_weight
            }
            Weight::Phrase(w) => {
                w.query_weight = w.idf * w.boost;
                w.query_weight * w.query_weight
            }
            Weight::Boolean(w) => {
                let mut sum = 0.0;
                for (sub, occur) in &mut w.clauses {
                    if *occur != Occur::MustNot {
                        sum += sub.sum_of_squared_weights();
                    }
                }
                if sum == 0.0 {
                    sum = 1.0; // empty Boolean still normalizes cleanly
                }
                sum * w.boost * w.boost
            }
            Weight::Empty => 0.0,
        }
    }

    pub fn normalize(&mut self, norm: f32) {
        match self {
            Weight::Term(w) => {
                w.query_weight *= norm;
                // idf applied once in the weight and once here
                w.value = w.query_weight * w.idf;
            }
            Weight::Phrase(w) => {
                w.query_weight *= norm;
                w.value = w.query_weight * w.idf;
            }
            Weight::Boolean(w) => {
                let child_norm = norm * w.boost;
                for (sub, _) in &mut w.clauses {
                    sub.normalize(child_norm);
                }
            }
            Weight::Empty => {}
        }
    }

    /// Produce a scorer, or `None` when nothing can match
    pub fn scorer<'a>(&self, snapshot: &Snapshot<'a>) -> Result<Option<Box<dyn Scorer + 'a>>> {
        match self {
            Weight::Term(w) => {
                let postings = open_postings(snapshot, &w.term, false)?;
                if postings.is_empty() {
                    return Ok(None);
                }
                Ok(Some(Box::new(TermScorer::new(
                    postings,
                    w.value,
                    snapshot.similarity,
                ))))
            }
            Weight::Phrase(w) => w.scorer(snapshot),
            Weight::Boolean(w) => w.scorer(snapshot),
            Weight::Empty => Ok(None),
        }
    }
}

pub(crate) struct TermWeight {
    term: Term,
    idf: f32,
    boost: f32,
    query_weight: f32,
    value: f32,
}

pub(crate) struct PhraseWeight {
    /// `(term, query position)` pairs, all in one field
    terms: Vec<(Term, u32)>,
    slop: u32,
    idf: f32,
    boost: f32,
    query_weight: f32,
    value: f32,
}

impl PhraseWeight {
    fn scorer<'a>(&self, snapshot: &Snapshot<'a>) -> Result<Option<Box<dyn Scorer + 'a>>> {
        let field = &self.terms[0].0.field;
        if self.terms.iter().any(|(t, _)| &t.field != field) {
            return Err(NautexError::invalid_argument(
                "phrase terms must share one field",
            ));
        }

        // a segment participates only if it has every phrase term
        let mut per_segment = Vec::new();
        'segments: for ctx in snapshot.segments {
            let mut cursors = Vec::with_capacity(self.terms.len());
            for (term, _) in &self.terms {
                match ctx.reader.term_info(term)? {
                    Some(info) => {
                        let cursor = ctx.reader.postings_from_info(
                            &info,
                            true,
                            false,
                            ctx.overlay.clone(),
                        )?;
                        cursors.push(super::scorer::SegPostings {
                            cursor,
                            base: ctx.base,
                            max_doc: ctx.reader.max_doc(),
                            norms: ctx.reader.norms(field),
                        });
                    }
                    None => continue 'segments,
                }
            }
            per_segment.push(cursors);
        }
        if per_segment.is_empty() {
            return Ok(None);
        }

        let offsets = self.terms.iter().map(|(_, p)| *p).collect();
        Ok(Some(Box::new(PhraseScorer::new(
            per_segment,
            offsets,
            self.slop,
            self.value,
            snapshot.similarity,
        ))))
    }
}

pub(crate) struct BooleanWeight {
    clauses: Vec<(Weight, Occur)>,
    boost: f32,
}

impl BooleanWeight {
    fn scorer<'a>(&self, snapshot: &Snapshot<'a>) -> Result<Option<Box<dyn Scorer + 'a>>> {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        let mut prohibited = Vec::new();
        let mut max_coord = 0u32;

        for (weight, occur) in &self.clauses {
            if *occur != Occur::MustNot {
                max_coord += 1;
            }
            match (weight.scorer(snapshot)?, occur) {
                (Some(s), Occur::Must) => required.push(SubScorer::new(s)),
                // a required clause with nothing to match kills the query
                (None, Occur::Must) => return Ok(None),
                (Some(s), Occur::Should) => optional.push(SubScorer::new(s)),
                (None, Occur::Should) => {}
                (Some(s), Occur::MustNot) => prohibited.push(SubScorer::new(s)),
                (None, Occur::MustNot) => {}
            }
        }

        if required.is_empty() && optional.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(BooleanScorer::new(
            required,
            optional,
            prohibited,
            max_coord,
            snapshot.similarity,
        ))))
    }
}

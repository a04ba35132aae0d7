//! Boolean scorer
//!
//! Conjunction over REQUIRED clauses (leapfrog on the first one),
//! disjunction over OPTIONAL clauses when nothing is required. A document
//! matching any PROHIBITED clause is excluded. The per-doc score is the
//! sum of matching scoring clauses times the coordination factor.

use crate::error::Result;

use super::scorer::{Scorer, SubScorer};
use super::Similarity;

pub(crate) struct BooleanScorer<'a> {
    required: Vec<SubScorer<'a>>,
    optional: Vec<SubScorer<'a>>,
    prohibited: Vec<SubScorer<'a>>,
    sim: &'a dyn Similarity,
    /// All non-prohibited clauses of the query, matched or not
    max_coord: u32,
    doc: u32,
    cached_score: f32,
    started: bool,
}

impl<'a> BooleanScorer<'a> {
    pub fn new(
        required: Vec<SubScorer<'a>>,
        optional: Vec<SubScorer<'a>>,
        prohibited: Vec<SubScorer<'a>>,
        max_coord: u32,
        sim: &'a dyn Similarity,
    ) -> Self {
        Self {
            required,
            optional,
            prohibited,
            sim,
            max_coord,
            doc: 0,
            cached_score: 0.0,
            started: false,
        }
    }

    /// Next doc on which every required clause agrees
    fn advance_required(&mut self) -> Result<Option<u32>> {
        if !self.started {
            for sub in &mut self.required {
                if sub.advance()?.is_none() {
                    return Ok(None);
                }
            }
        } else if self.required[0].advance()?.is_none() {
            return Ok(None);
        }

        'align: loop {
            let mut target = 0;
            for sub in &self.required {
                match sub.doc {
                    Some(doc) => target = target.max(doc),
                    None => return Ok(None),
                }
            }
            for sub in &mut self.required {
                match sub.skip(target)? {
                    Some(doc) if doc > target => continue 'align,
                    Some(_) => {}
                    None => return Ok(None),
                }
            }
            return Ok(Some(target));
        }
    }

    /// Smallest current doc among the optional clauses
    fn advance_disjunction(&mut self) -> Result<Option<u32>> {
        for sub in &mut self.optional {
            if !self.started || sub.matches(self.doc) {
                sub.advance()?;
            }
        }
        Ok(self.optional.iter().filter_map(|s| s.doc).min())
    }

    fn is_prohibited(&mut self, doc: u32) -> Result<bool> {
        for sub in &mut self.prohibited {
            if sub.skip(doc)? == Some(doc) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn score_at(&mut self, doc: u32) -> Result<f32> {
        let mut sum = 0.0;
        let mut overlap = 0;
        for sub in &mut self.required {
            sum += sub.scorer.score()?;
            overlap += 1;
        }
        for sub in &mut self.optional {
            if !self.required.is_empty() {
                sub.skip(doc)?;
            }
            if sub.matches(doc) {
                sum += sub.scorer.score()?;
                overlap += 1;
            }
        }
        Ok(sum * self.sim.coord(overlap, self.max_coord))
    }
}

impl Scorer for BooleanScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        loop {
            let candidate = if !self.required.is_empty() {
                self.advance_required()?
            } else {
                self.advance_disjunction()?
            };
            let Some(doc) = candidate else {
                return Ok(false);
            };
            self.started = true;
            self.doc = doc;
            if self.is_prohibited(doc)? {
                continue;
            }
            self.cached_score = self.score_at(doc)?;
            return Ok(true);
        }
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.started && self.doc >= target {
            return Ok(true);
        }
        while self.next()? {
            if self.doc >= target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn score(&mut self) -> Result<f32> {
        Ok(self.cached_score)
    }
}

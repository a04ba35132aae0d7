//! Document-at-a-time scorers
//!
//! A scorer iterates matching documents in ascending global id order and
//! scores the one it is positioned on. `skip_to` may be called before the
//! first `next`.

use std::sync::Arc;

use crate::error::Result;
use crate::segment::{decode_norm, PostingsCursor, Term};

use super::{Similarity, Snapshot};

pub(crate) trait Scorer {
    /// Current document (global id); only valid after a successful advance
    fn doc(&self) -> u32;

    fn next(&mut self) -> Result<bool>;

    /// Advance to the first match `>= target`; stays put if already there
    fn skip_to(&mut self, target: u32) -> Result<bool>;

    fn score(&mut self) -> Result<f32>;
}

/// Per-segment postings plus what scoring it needs
pub(crate) struct SegPostings {
    pub cursor: PostingsCursor,
    pub base: u32,
    pub max_doc: u32,
    pub norms: Option<Arc<Vec<u8>>>,
}

/// Open live-filtered postings of `term` in every segment that has it
pub(crate) fn open_postings(
    snapshot: &Snapshot,
    term: &Term,
    with_positions: bool,
) -> Result<Vec<SegPostings>> {
    let mut out = Vec::new();
    for ctx in snapshot.segments {
        if let Some(info) = ctx.reader.term_info(term)? {
            let cursor =
                ctx.reader
                    .postings_from_info(&info, with_positions, false, ctx.overlay.clone())?;
            out.push(SegPostings {
                cursor,
                base: ctx.base,
                max_doc: ctx.reader.max_doc(),
                norms: ctx.reader.norms(&term.field),
            });
        }
    }
    Ok(out)
}

/// Norm decode helper; missing norms score as 1.0
fn norm_factor(norms: &Option<Arc<Vec<u8>>>, local: u32) -> f32 {
    match norms {
        Some(bytes) => decode_norm(bytes[local as usize]),
        None => 1.0,
    }
}

/// Scores a single term: `tf(freq) · weight_value · norm(doc)`
pub(crate) struct TermScorer<'a> {
    segments: Vec<SegPostings>,
    seg: usize,
    doc: u32,
    started: bool,
    value: f32,
    sim: &'a dyn Similarity,
}

impl<'a> TermScorer<'a> {
    pub fn new(segments: Vec<SegPostings>, value: f32, sim: &'a dyn Similarity) -> Self {
        Self {
            segments,
            seg: 0,
            doc: 0,
            started: false,
            value,
            sim,
        }
    }
}

impl Scorer for TermScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        while self.seg < self.segments.len() {
            let seg = &mut self.segments[self.seg];
            if seg.cursor.next()? {
                self.doc = seg.base + seg.cursor.doc();
                self.started = true;
                return Ok(true);
            }
            self.seg += 1;
        }
        Ok(false)
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.started && self.doc >= target {
            return Ok(true);
        }
        while self.seg < self.segments.len() {
            let seg = &mut self.segments[self.seg];
            // whole segment below the target: fall through to the next one
            if seg.base + seg.max_doc <= target {
                self.seg += 1;
                continue;
            }
            let local_target = target.saturating_sub(seg.base);
            if seg.cursor.skip_to(local_target)? {
                self.doc = seg.base + seg.cursor.doc();
                self.started = true;
                return Ok(true);
            }
            self.seg += 1;
        }
        Ok(false)
    }

    fn score(&mut self) -> Result<f32> {
        let seg = &self.segments[self.seg];
        let freq = seg.cursor.freq() as f32;
        let local = seg.cursor.doc();
        Ok(self.sim.tf(freq) * self.value * norm_factor(&seg.norms, local))
    }
}

/// Shared advancement bookkeeping for compound scorers
pub(crate) struct SubScorer<'a> {
    pub scorer: Box<dyn Scorer + 'a>,
    pub doc: Option<u32>,
    started: bool,
}

impl<'a> SubScorer<'a> {
    pub fn new(scorer: Box<dyn Scorer + 'a>) -> Self {
        Self {
            scorer,
            doc: None,
            started: false,
        }
    }

    pub fn advance(&mut self) -> Result<Option<u32>> {
        self.started = true;
        self.doc = if self.scorer.next()? {
            Some(self.scorer.doc())
        } else {
            None
        };
        Ok(self.doc)
    }

    /// Move to the first match `>= target` (no-op when already there or
    /// exhausted)
    pub fn skip(&mut self, target: u32) -> Result<Option<u32>> {
        if self.started && self.doc.is_none() {
            return Ok(None); // exhausted stays exhausted
        }
        if let Some(doc) = self.doc {
            if doc >= target {
                return Ok(self.doc);
            }
        }
        self.started = true;
        self.doc = if self.scorer.skip_to(target)? {
            Some(self.scorer.doc())
        } else {
            None
        };
        Ok(self.doc)
    }

    pub fn matches(&self, doc: u32) -> bool {
        self.doc == Some(doc)
    }
}

//! Phrase scorer
//!
//! Conjunction over the phrase's term postings within each segment; on a
//! doc where all terms co-occur, the phrase frequency is computed from
//! positions. Exact phrases count aligned starts; sloppy phrases weight
//! each occurrence by its edit distance, up to the query's slop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::segment::decode_norm;

use super::scorer::{Scorer, SegPostings};
use super::Similarity;

/// One segment's conjunction state: a postings cursor per phrase term
struct SegPhrase {
    cursors: Vec<SegPostings>,
    started: bool,
}

pub(crate) struct PhraseScorer<'a> {
    /// Query position offset of each term, parallel to each segment's
    /// cursor list
    offsets: Vec<u32>,
    segments: Vec<SegPhrase>,
    seg: usize,
    slop: u32,
    value: f32,
    sim: &'a dyn Similarity,
    doc: u32,
    freq: f32,
}

impl<'a> PhraseScorer<'a> {
    /// `per_segment[i]` holds one cursor per phrase term, all for the same
    /// segment; segments where any term is missing must be filtered out by
    /// the caller
    pub fn new(
        per_segment: Vec<Vec<SegPostings>>,
        offsets: Vec<u32>,
        slop: u32,
        value: f32,
        sim: &'a dyn Similarity,
    ) -> Self {
        Self {
            offsets,
            segments: per_segment
                .into_iter()
                .map(|cursors| SegPhrase {
                    cursors,
                    started: false,
                })
                .collect(),
            seg: 0,
            slop,
            value,
            sim,
            doc: 0,
            freq: 0.0,
        }
    }

    /// Advance the current segment's conjunction to its next aligned doc
    fn align_current(&mut self) -> Result<Option<u32>> {
        let seg = &mut self.segments[self.seg];
        if !seg.started {
            seg.started = true;
            for sp in &mut seg.cursors {
                if !sp.cursor.next()? {
                    return Ok(None);
                }
            }
        } else if !seg.cursors[0].cursor.next()? {
            return Ok(None);
        }

        'align: loop {
            let mut target = 0;
            for sp in &seg.cursors {
                target = target.max(sp.cursor.doc());
            }
            for sp in &mut seg.cursors {
                if sp.cursor.doc() < target {
                    if !sp.cursor.skip_to(target)? {
                        return Ok(None);
                    }
                    if sp.cursor.doc() > target {
                        continue 'align;
                    }
                }
            }
            return Ok(Some(target));
        }
    }

    fn phrase_freq(&mut self) -> Result<f32> {
        // positions adjusted by the query offsets; an exact occurrence is a
        // value present in every list
        let seg = &mut self.segments[self.seg];
        let mut adjusted: Vec<Vec<i64>> = Vec::with_capacity(seg.cursors.len());
        for (sp, offset) in seg.cursors.iter_mut().zip(&self.offsets) {
            let positions = sp.cursor.positions()?;
            adjusted.push(
                positions
                    .iter()
                    .map(|&p| p as i64 - *offset as i64)
                    .collect(),
            );
        }
        if self.slop == 0 {
            Ok(exact_freq(&adjusted))
        } else {
            Ok(sloppy_freq(&adjusted, self.slop, self.sim))
        }
    }
}

impl Scorer for PhraseScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next(&mut self) -> Result<bool> {
        while self.seg < self.segments.len() {
            match self.align_current()? {
                Some(local) => {
                    let freq = self.phrase_freq()?;
                    if freq > 0.0 {
                        self.doc = self.segments[self.seg].cursors[0].base + local;
                        self.freq = freq;
                        return Ok(true);
                    }
                }
                None => self.seg += 1,
            }
        }
        Ok(false)
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        while self.next()? {
            if self.doc >= target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn score(&mut self) -> Result<f32> {
        let seg = &self.segments[self.seg];
        let first = &seg.cursors[0];
        let local = first.cursor.doc();
        let norm = match &first.norms {
            Some(bytes) => decode_norm(bytes[local as usize]),
            None => 1.0,
        };
        Ok(self.sim.tf(self.freq) * self.value * norm)
    }
}

/// Number of positions common to every adjusted list (all lists ascending)
fn exact_freq(adjusted: &[Vec<i64>]) -> f32 {
    let mut indices = vec![0usize; adjusted.len()];
    let mut freq = 0u32;
    'outer: loop {
        // candidate from the first list
        let Some(&candidate) = adjusted[0].get(indices[0]) else {
            break;
        };
        let mut max = candidate;
        for (list, idx) in adjusted.iter().zip(indices.iter_mut()).skip(1) {
            while let Some(&v) = list.get(*idx) {
                if v >= max {
                    break;
                }
                *idx += 1;
            }
            match list.get(*idx) {
                Some(&v) => max = max.max(v),
                None => break 'outer,
            }
        }
        if adjusted
            .iter()
            .zip(&indices)
            .all(|(list, &i)| list.get(i) == Some(&max))
        {
            freq += 1;
            for idx in &mut indices {
                *idx += 1;
            }
        } else {
            // advance lists below the current maximum
            for (list, idx) in adjusted.iter().zip(indices.iter_mut()) {
                while let Some(&v) = list.get(*idx) {
                    if v >= max {
                        break;
                    }
                    *idx += 1;
                }
            }
        }
    }
    freq as f32
}

/// Heap element for the sloppy-phrase sweep, min-ordered by position
struct PhrasePos {
    positions: std::vec::IntoIter<i64>,
    position: i64,
}

impl PhrasePos {
    fn advance(&mut self) -> bool {
        match self.positions.next() {
            Some(p) => {
                self.position = p;
                true
            }
            None => false,
        }
    }
}

impl PartialEq for PhrasePos {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl Eq for PhrasePos {}

impl PartialOrd for PhrasePos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhrasePos {
    fn cmp(&self, other: &Self) -> Ordering {
        other.position.cmp(&self.position) // reversed for a min-heap
    }
}

/// Sum of `sloppy_freq(edit distance)` over occurrences within `slop`
fn sloppy_freq(adjusted: &[Vec<i64>], slop: u32, sim: &dyn Similarity) -> f32 {
    if adjusted.len() == 1 {
        return adjusted[0].len() as f32;
    }
    let mut pq = BinaryHeap::with_capacity(adjusted.len());
    let mut end = i64::MIN;
    for list in adjusted {
        let mut pp = PhrasePos {
            positions: list.clone().into_iter(),
            position: 0,
        };
        if !pp.advance() {
            return 0.0;
        }
        end = end.max(pp.position);
        pq.push(pp);
    }

    let mut freq = 0.0f32;
    let mut done = false;
    while !done {
        let mut pp = pq.pop().expect("phrase heap never empty");
        let mut start = pp.position;
        let next = pq.peek().expect("phrase has at least two terms").position;
        let mut pos = start;
        while pos <= next {
            start = pos;
            if !pp.advance() {
                done = true;
                break;
            }
            pos = pp.position;
        }
        let match_length = end - start;
        if match_length >= 0 && match_length <= slop as i64 {
            freq += sim.sloppy_freq(match_length as u32);
        }
        if pp.position > end {
            end = pp.position;
        }
        pq.push(pp);
    }
    freq
}

//! Query evaluation
//!
//! A search runs against a [`Snapshot`]: an ordered list of segments, each
//! with its global doc id base and (for the writer's own searches) an
//! overlay of uncommitted tombstones. The pipeline is: rewrite the query
//! down to primitives, build a [`Weight`](weight::Weight), normalize it,
//! then drive a [`Scorer`](scorer::Scorer) into the hit collector.

mod boolean_scorer;
mod collector;
mod phrase_scorer;
mod scorer;
mod similarity;
mod weight;

use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::query::Query;
use crate::segment::{SegmentReader, Term};

pub use collector::QueryHit;
pub use similarity::{DefaultSimilarity, Similarity};

pub(crate) use weight::Weight;

/// One segment as seen by a search: reader, global base, and uncommitted
/// tombstones layered on top of the committed bitmap
#[derive(Clone)]
pub(crate) struct SegmentCtx {
    pub reader: Arc<SegmentReader>,
    pub base: u32,
    pub overlay: Option<Arc<RoaringBitmap>>,
}

impl SegmentCtx {
    pub fn is_deleted(&self, local: u32) -> bool {
        if self.reader.is_deleted(local) {
            return true;
        }
        self.overlay
            .as_ref()
            .map_or(false, |o| o.contains(local))
    }

    pub fn live_docs(&self) -> u32 {
        let overlay_only = self.overlay.as_ref().map_or(0, |o| o.len() as u32);
        self.reader.num_docs() - overlay_only
    }

    pub fn has_tombstones(&self) -> bool {
        self.reader.has_deletions() || self.overlay.as_ref().map_or(false, |o| !o.is_empty())
    }
}

/// Everything a query evaluation needs, borrowed for the duration of one
/// operation
pub(crate) struct Snapshot<'a> {
    pub segments: &'a [SegmentCtx],
    pub similarity: &'a dyn Similarity,
}

impl<'a> Snapshot<'a> {
    pub fn max_doc(&self) -> u32 {
        self.segments
            .iter()
            .map(|s| s.reader.max_doc())
            .sum()
    }

    pub fn num_docs(&self) -> u32 {
        self.segments.iter().map(|s| s.live_docs()).sum()
    }

    /// Live document frequency: the dictionary value on clean segments, a
    /// postings count where tombstones could make it lie
    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        let mut total = 0;
        for ctx in self.segments {
            if !ctx.has_tombstones() {
                total += ctx.reader.doc_freq(term)?;
                continue;
            }
            if let Some(info) = ctx.reader.term_info(term)? {
                let mut cursor =
                    ctx.reader
                        .postings_from_info(&info, false, false, ctx.overlay.clone())?;
                while cursor.next()? {
                    total += 1;
                }
            }
        }
        Ok(total)
    }
}

/// Run a query against a snapshot and return hits ranked by score
pub(crate) fn execute(snapshot: &Snapshot, query: &Query) -> Result<Vec<QueryHit>> {
    let rewritten = query.rewrite(snapshot)?;
    let mut weight = Weight::for_query(&rewritten, snapshot)?;
    let sum = weight.sum_of_squared_weights();
    let norm = snapshot.similarity.query_norm(sum);
    weight.normalize(norm);

    match weight.scorer(snapshot)? {
        Some(mut scorer) => collector::collect_all(scorer.as_mut()),
        None => Ok(Vec::new()),
    }
}

/// All live documents containing `term`, as global ids
pub(crate) fn term_docs(segments: &[SegmentCtx], term: &Term) -> Result<Vec<u32>> {
    let mut docs = Vec::new();
    for ctx in segments {
        if let Some(info) = ctx.reader.term_info(term)? {
            let mut cursor =
                ctx.reader
                    .postings_from_info(&info, false, false, ctx.overlay.clone())?;
            while cursor.next()? {
                docs.push(ctx.base + cursor.doc());
            }
        }
    }
    Ok(docs)
}

/// `(doc, freq)` pairs for `term` over live documents
pub(crate) fn term_freqs(segments: &[SegmentCtx], term: &Term) -> Result<Vec<(u32, u32)>> {
    let mut freqs = Vec::new();
    for ctx in segments {
        if let Some(info) = ctx.reader.term_info(term)? {
            let mut cursor =
                ctx.reader
                    .postings_from_info(&info, false, false, ctx.overlay.clone())?;
            while cursor.next()? {
                freqs.push((ctx.base + cursor.doc(), cursor.freq()));
            }
        }
    }
    Ok(freqs)
}

/// `(doc, positions)` pairs for `term` over live documents
pub(crate) fn term_positions(
    segments: &[SegmentCtx],
    term: &Term,
) -> Result<Vec<(u32, Vec<u32>)>> {
    let mut out = Vec::new();
    for ctx in segments {
        if let Some(info) = ctx.reader.term_info(term)? {
            let mut cursor =
                ctx.reader
                    .postings_from_info(&info, true, false, ctx.overlay.clone())?;
            while cursor.next()? {
                let doc = ctx.base + cursor.doc();
                out.push((doc, cursor.positions()?));
            }
        }
    }
    Ok(out)
}

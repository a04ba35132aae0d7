//! Standalone snapshot reader
//!
//! An [`IndexReader`] opens the current committed generation and stays on
//! it: later commits are invisible, and the files it uses are pinned
//! against the writer's deletion pass for the reader's lifetime. If a
//! racing commit removes segment files mid-open, opening retries once at
//! the newer generation before reporting the reader stale.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use crate::document::Document;
use crate::error::{NautexError, Result};
use crate::query::Query;
use crate::search::{self, DefaultSimilarity, QueryHit, SegmentCtx, Similarity, Snapshot};
use crate::segment::{encode_norm, SegmentInfos, SegmentReader, Term};
use crate::store::{Directory, PinGuard};

use super::terms::MultiTerms;

/// Read-only view of one committed generation
pub struct IndexReader {
    segments: Vec<SegmentCtx>,
    similarity: Arc<dyn Similarity>,
    generation: i64,
    _pins: Option<PinGuard>,
}

impl IndexReader {
    /// Open the current generation of `dir`
    pub fn open(dir: Arc<dyn Directory>) -> Result<Self> {
        match Self::try_open(&dir) {
            Ok(reader) => Ok(reader),
            Err(NautexError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                // a commit raced us and removed files; resolve again
                warn!("segment files vanished mid-open, re-resolving generation");
                Self::try_open(&dir).map_err(|second| match second {
                    NautexError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        NautexError::stale_reader(
                            "segment files deleted while opening reader",
                        )
                    }
                    other => other,
                })
            }
            Err(other) => Err(other),
        }
    }

    fn try_open(dir: &Arc<dyn Directory>) -> Result<Self> {
        let infos = SegmentInfos::read_current(dir.as_ref())?;

        let mut segments = Vec::with_capacity(infos.segments.len());
        let mut base = 0;
        for info in &infos.segments {
            let reader = Arc::new(SegmentReader::open(dir.as_ref(), info)?);
            let max_doc = reader.max_doc();
            segments.push(SegmentCtx {
                reader,
                base,
                overlay: None,
            });
            base += max_doc;
        }

        let pins = if infos.generation >= 0 {
            let mut files: Vec<String> = segments
                .iter()
                .flat_map(|ctx| ctx.reader.files())
                .collect();
            files.push(SegmentInfos::file_name_from_generation(infos.generation));
            Some(PinGuard::new(Arc::clone(dir), files))
        } else {
            None
        };

        Ok(Self {
            segments,
            similarity: Arc::new(DefaultSimilarity),
            generation: infos.generation,
            _pins: pins,
        })
    }

    /// Generation this reader is snapshotted at
    pub fn generation(&self) -> i64 {
        self.generation
    }

    pub fn max_doc(&self) -> u32 {
        self.segments.iter().map(|c| c.reader.max_doc()).sum()
    }

    pub fn num_docs(&self) -> u32 {
        self.segments.iter().map(|c| c.reader.num_docs()).sum()
    }

    pub fn has_deletions(&self) -> bool {
        self.segments.iter().any(|c| c.reader.has_deletions())
    }

    /// Run a query against this snapshot
    pub fn find(&self, query: &Query) -> Result<Vec<QueryHit>> {
        let snapshot = Snapshot {
            segments: &self.segments,
            similarity: self.similarity.as_ref(),
        };
        search::execute(&snapshot, query)
    }

    /// Stored fields of a live document
    pub fn get_document(&self, doc: u32) -> Result<Document> {
        let (ctx, local) = self.locate(doc)?;
        if ctx.is_deleted(local) {
            return Err(NautexError::invalid_argument(format!(
                "document {doc} is deleted"
            )));
        }
        ctx.reader.document(local)
    }

    pub fn terms(&self) -> MultiTerms {
        MultiTerms::new(self.readers(), None)
    }

    pub fn terms_from(&self, term: &Term) -> MultiTerms {
        MultiTerms::new(self.readers(), Some(term.clone()))
    }

    pub fn term_docs(&self, term: &Term) -> Result<Vec<u32>> {
        search::term_docs(&self.segments, term)
    }

    pub fn term_freqs(&self, term: &Term) -> Result<Vec<(u32, u32)>> {
        search::term_freqs(&self.segments, term)
    }

    pub fn term_positions(&self, term: &Term) -> Result<Vec<(u32, Vec<u32>)>> {
        search::term_positions(&self.segments, term)
    }

    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        let snapshot = Snapshot {
            segments: &self.segments,
            similarity: self.similarity.as_ref(),
        };
        snapshot.doc_freq(term)
    }

    pub fn field_names(&self, indexed_only: bool) -> Vec<String> {
        let mut names = BTreeSet::new();
        for ctx in &self.segments {
            for field in ctx.reader.field_infos().iter() {
                if !indexed_only || field.indexed {
                    names.insert(field.name.clone());
                }
            }
        }
        names.into_iter().collect()
    }

    pub fn norm(&self, doc: u32, field: &str) -> Result<u8> {
        if !self.field_names(false).iter().any(|n| n == field) {
            return Err(NautexError::invalid_argument(format!(
                "unknown field: {field}"
            )));
        }
        let (ctx, local) = self.locate(doc)?;
        Ok(match ctx.reader.norms(field) {
            Some(bytes) => bytes[local as usize],
            None => encode_norm(1.0),
        })
    }

    pub fn similarity(&self) -> &Arc<dyn Similarity> {
        &self.similarity
    }

    fn readers(&self) -> Vec<Arc<SegmentReader>> {
        self.segments.iter().map(|c| c.reader.clone()).collect()
    }

    fn locate(&self, doc: u32) -> Result<(&SegmentCtx, u32)> {
        for ctx in &self.segments {
            if doc < ctx.base + ctx.reader.max_doc() {
                return Ok((ctx, doc - ctx.base));
            }
        }
        Err(NautexError::invalid_argument(format!(
            "document {doc} out of range (max {})",
            self.max_doc()
        )))
    }
}

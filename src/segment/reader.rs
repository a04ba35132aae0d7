//! Read side of one segment
//!
//! Opens every file of the segment once and hands out independent cursors
//! over the dictionary and postings. Everything here is immutable after
//! open except the deletion bitmap, which the writer may swap for a newer
//! one; cursors capture the bitmap current at their creation, so an open
//! cursor never sees deletions appear mid-iteration.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use roaring::RoaringBitmap;

use crate::document::Document;
use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput};

use super::deletes::BitVector;
use super::field_infos::FieldInfos;
use super::infos::SegmentInfo;
use super::postings::PostingsCursor;
use super::stored::StoredFieldsReader;
use super::term_dict::{Term, TermDict, TermInfo, TermsCursor};
use super::{norms, norms_file, segment_file};

/// Reader over one immutable segment
pub struct SegmentReader {
    info: SegmentInfo,
    field_infos: Arc<FieldInfos>,
    dict: TermDict,
    frq: Box<dyn IndexInput>,
    prx: Box<dyn IndexInput>,
    norms: HashMap<String, Arc<Vec<u8>>>,
    stored: StoredFieldsReader,
    deletions: RwLock<DeletionState>,
}

/// Tombstones plus the generation of the file they came from
#[derive(Clone, Default)]
struct DeletionState {
    bits: Option<Arc<BitVector>>,
    del_gen: i64,
}

impl SegmentReader {
    pub fn open(dir: &dyn Directory, info: &SegmentInfo) -> Result<Self> {
        let field_infos = FieldInfos::read(dir, &info.name)?;
        let dict = TermDict::open(dir, &info.name)?;
        let frq = dir.open_input(&segment_file(&info.name, "frq"))?;
        let prx = dir.open_input(&segment_file(&info.name, "prx"))?;

        let mut norm_bytes = HashMap::new();
        for field in field_infos.iter() {
            if field.indexed {
                let bytes = norms::read_norms(dir, &info.name, field.ord, info.doc_count)?;
                norm_bytes.insert(field.name.clone(), Arc::new(bytes));
            }
        }

        let stored =
            StoredFieldsReader::open(dir, &info.name, Arc::clone(&field_infos), info.doc_count)?;

        let deletions = match info.del_file_name() {
            Some(name) => DeletionState {
                bits: Some(Arc::new(BitVector::read(dir, &name, info.doc_count)?)),
                del_gen: info.del_gen,
            },
            None => DeletionState::default(),
        };

        Ok(Self {
            info: info.clone(),
            field_infos,
            dict,
            frq,
            prx,
            norms: norm_bytes,
            stored,
            deletions: RwLock::new(deletions),
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    pub fn field_infos(&self) -> &Arc<FieldInfos> {
        &self.field_infos
    }

    pub fn max_doc(&self) -> u32 {
        self.info.doc_count
    }

    pub fn deleted_count(&self) -> u32 {
        self.deletions.read().bits.as_ref().map_or(0, |d| d.count())
    }

    pub fn num_docs(&self) -> u32 {
        self.max_doc() - self.deleted_count()
    }

    pub fn has_deletions(&self) -> bool {
        self.deleted_count() > 0
    }

    pub fn is_deleted(&self, doc: u32) -> bool {
        self.deletions
            .read()
            .bits
            .as_ref()
            .map_or(false, |d| d.get(doc))
    }

    /// Committed tombstones, if any
    pub fn deletions(&self) -> Option<Arc<BitVector>> {
        self.deletions.read().bits.clone()
    }

    /// Swap in a rewritten bitmap (the writer's commit path); open cursors
    /// keep the bitmap they started with
    pub(crate) fn set_deletions(&self, bits: Arc<BitVector>, del_gen: i64) {
        *self.deletions.write() = DeletionState {
            bits: Some(bits),
            del_gen,
        };
    }

    /// Dictionary entry for a term, `None` when absent
    pub fn term_info(&self, term: &Term) -> Result<Option<TermInfo>> {
        let Some(ord) = self.field_infos.ord(&term.field) else {
            return Ok(None);
        };
        self.dict.get(ord, &term.text)
    }

    /// Dictionary document frequency (deleted docs included)
    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        Ok(self.term_info(term)?.map_or(0, |ti| ti.doc_freq))
    }

    /// Postings cursor for a term; `raw` disables tombstone filtering (the
    /// merger wants every posting)
    pub fn postings(
        &self,
        term: &Term,
        with_positions: bool,
        raw: bool,
    ) -> Result<Option<PostingsCursor>> {
        match self.term_info(term)? {
            Some(info) => Ok(Some(self.postings_from_info(&info, with_positions, raw, None)?)),
            None => Ok(None),
        }
    }

    /// Core cursor constructor; `overlay` adds the writer's pending
    /// tombstones on top of the committed bitmap
    pub(crate) fn postings_from_info(
        &self,
        info: &TermInfo,
        with_positions: bool,
        raw: bool,
        overlay: Option<Arc<RoaringBitmap>>,
    ) -> Result<PostingsCursor> {
        let deletions = if raw { None } else { self.deletions() };
        PostingsCursor::new(
            self.frq.as_ref(),
            if with_positions {
                Some(self.prx.as_ref())
            } else {
                None
            },
            info.clone(),
            self.dict.skip_interval(),
            deletions,
            if raw { None } else { overlay },
        )
    }

    /// Cursor over every term of the segment in sort order
    pub fn terms(&self) -> Result<SegmentTerms> {
        Ok(SegmentTerms {
            cursor: self.dict.cursor()?,
            field_infos: Arc::clone(&self.field_infos),
        })
    }

    /// Cursor positioned at the first term `>=` the given one
    pub fn terms_from(&self, term: &Term) -> Result<SegmentTerms> {
        let cursor = match self.field_infos.ord(&term.field) {
            Some(ord) => self.dict.cursor_at(ord, &term.text)?,
            None => {
                // unknown field: position after any smaller field ordinal
                let mut c = self.dict.cursor()?;
                c.seek(u32::MAX, "")?;
                c
            }
        };
        Ok(SegmentTerms {
            cursor,
            field_infos: Arc::clone(&self.field_infos),
        })
    }

    pub fn norms(&self, field: &str) -> Option<Arc<Vec<u8>>> {
        self.norms.get(field).cloned()
    }

    /// Stored fields of a document; tombstones are not consulted here
    pub fn document(&self, doc: u32) -> Result<Document> {
        self.stored.document(doc)
    }

    /// Every file this segment references (for pinning and the deletion
    /// pass)
    pub fn files(&self) -> Vec<String> {
        let name = &self.info.name;
        let mut files: Vec<String> = ["fnm", "fdx", "fdt", "tis", "tii", "frq", "prx"]
            .iter()
            .map(|ext| segment_file(name, ext))
            .collect();
        for field in self.field_infos.iter() {
            if field.indexed {
                files.push(norms_file(name, field.ord));
            }
        }
        let del_gen = self.deletions.read().del_gen;
        if del_gen > 0 {
            files.push(super::deletes_file(name, del_gen));
        }
        files
    }
}

/// Terms cursor resolved to field names
pub struct SegmentTerms {
    cursor: TermsCursor,
    field_infos: Arc<FieldInfos>,
}

impl SegmentTerms {
    pub fn next(&mut self) -> Result<bool> {
        self.cursor.next()
    }

    /// Current term as a `(field name, text)` pair
    pub fn term(&self) -> Result<Option<Term>> {
        match self.cursor.current() {
            Some((ord, text, _)) => {
                let field = self.field_infos.by_ord(ord).ok_or_else(|| {
                    NautexError::corrupt(format!("term references unknown field ordinal {ord}"))
                })?;
                Ok(Some(Term::new(field.name.clone(), text)))
            }
            None => Ok(None),
        }
    }

    pub fn info(&self) -> Option<&TermInfo> {
        self.cursor.current().map(|(_, _, info)| info)
    }
}

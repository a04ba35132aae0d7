//! Term dictionary (`.tis` / `.tii`)
//!
//! Terms are stored in `(field ordinal, text)` order, each entry sharing a
//! character prefix with its predecessor. Every `index_interval`-th entry is
//! mirrored into the `.tii` side file together with a pointer into `.tis`,
//! so a lookup binary-searches the in-memory index and then scans at most
//! one block of the main file.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput, IndexOutput};

use super::segment_file;

/// On-disk format tag of both dictionary files
pub const TERM_DICT_FORMAT: i32 = -2;

/// Byte length of the dictionary file header
const HEADER_LEN: u64 = 4 + 8 + 4 + 4;

/// A `(field, text)` pair; the unit the inverted index is keyed by
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    pub field: String,
    pub text: String,
}

impl Term {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// Dictionary entry: document frequency plus offsets into the postings
/// streams
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TermInfo {
    pub doc_freq: u32,
    pub freq_pointer: u64,
    pub prox_pointer: u64,
    /// Offset of the skip table relative to `freq_pointer`; only meaningful
    /// when `doc_freq >= skip_interval`
    pub skip_delta: u64,
}

fn common_prefix_chars(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}

fn char_boundary(s: &str, chars: usize) -> usize {
    s.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// One delta-coded output stream (shared by `.tis` and `.tii`)
struct DictStream {
    out: Box<dyn IndexOutput>,
    last_field: u32,
    last_text: String,
    last_freq_ptr: u64,
    last_prox_ptr: u64,
    count: u64,
}

impl DictStream {
    fn new(
        dir: &dyn Directory,
        name: &str,
        index_interval: u32,
        skip_interval: u32,
    ) -> Result<Self> {
        let mut out = dir.create_output(name)?;
        out.write_i32(TERM_DICT_FORMAT)?;
        out.write_u64(0)?; // entry count, patched in finish()
        out.write_u32(index_interval)?;
        out.write_u32(skip_interval)?;
        Ok(Self {
            out,
            last_field: 0,
            last_text: String::new(),
            last_freq_ptr: 0,
            last_prox_ptr: 0,
            count: 0,
        })
    }

    fn write_entry(
        &mut self,
        field: u32,
        text: &str,
        info: &TermInfo,
        skip_interval: u32,
    ) -> Result<()> {
        let prefix = common_prefix_chars(&self.last_text, text);
        let suffix = &text[char_boundary(text, prefix)..];
        self.out.write_vint(prefix as u32)?;
        self.out.write_string(suffix)?;
        self.out.write_vint(field)?;
        self.out.write_vint(info.doc_freq)?;
        self.out.write_vlong(info.freq_pointer - self.last_freq_ptr)?;
        self.out.write_vlong(info.prox_pointer - self.last_prox_ptr)?;
        if info.doc_freq >= skip_interval {
            self.out.write_vint(info.skip_delta as u32)?;
        }
        self.last_field = field;
        self.last_text = text.to_string();
        self.last_freq_ptr = info.freq_pointer;
        self.last_prox_ptr = info.prox_pointer;
        self.count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.seek(4)?;
        self.out.write_u64(self.count)?;
        self.out.finish()
    }
}

/// Writer producing both dictionary files for one segment
///
/// Terms must be added in strictly ascending `(field ordinal, text)` order.
pub struct TermDictWriter {
    tis: DictStream,
    tii: DictStream,
    index_interval: u32,
    skip_interval: u32,
    last_tis_pointer: u64,
    last_term: Option<(u32, String)>,
    last_info: TermInfo,
}

impl TermDictWriter {
    pub fn new(
        dir: &dyn Directory,
        segment: &str,
        index_interval: u32,
        skip_interval: u32,
    ) -> Result<Self> {
        Ok(Self {
            tis: DictStream::new(
                dir,
                &segment_file(segment, "tis"),
                index_interval,
                skip_interval,
            )?,
            tii: DictStream::new(
                dir,
                &segment_file(segment, "tii"),
                index_interval,
                skip_interval,
            )?,
            index_interval,
            skip_interval,
            last_tis_pointer: 0,
            last_term: None,
            last_info: TermInfo::default(),
        })
    }

    pub fn add(&mut self, field: u32, text: &str, info: &TermInfo) -> Result<()> {
        if let Some((last_field, last_text)) = &self.last_term {
            if (field, text) <= (*last_field, last_text.as_str()) {
                return Err(NautexError::invalid_argument(format!(
                    "terms added out of order: ({field}, {text}) after ({last_field}, {last_text})"
                )));
            }
        }

        if self.tis.count % self.index_interval as u64 == 0 {
            // index the predecessor of this block: its term, its info, and
            // a pointer to where this entry begins in .tis
            let (idx_field, idx_text) = self
                .last_term
                .clone()
                .unwrap_or((0, String::new()));
            let tis_pointer = self.tis.out.tell();
            self.tii
                .write_entry(idx_field, &idx_text, &self.last_info, self.skip_interval)?;
            self.tii.out.write_vlong(tis_pointer - self.last_tis_pointer)?;
            self.last_tis_pointer = tis_pointer;
        }

        self.tis.write_entry(field, text, info, self.skip_interval)?;
        self.last_term = Some((field, text.to_string()));
        self.last_info = info.clone();
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.tis.finish()?;
        self.tii.finish()
    }
}

struct IndexEntry {
    field: u32,
    text: String,
    info: TermInfo,
    tis_pointer: u64,
}

struct DictInner {
    index: Vec<IndexEntry>,
    tis: Box<dyn IndexInput>,
    term_count: u64,
    index_interval: u32,
    skip_interval: u32,
}

/// Read side of the dictionary: the `.tii` index in memory plus a shared
/// handle on `.tis` cloned into every cursor
#[derive(Clone)]
pub struct TermDict {
    inner: Arc<DictInner>,
}

fn read_header(input: &mut dyn IndexInput, name: &str) -> Result<(u64, u32, u32)> {
    let format = input.read_i32()?;
    if format != TERM_DICT_FORMAT {
        return Err(NautexError::corrupt(format!(
            "unknown term dictionary format {format} in {name}"
        )));
    }
    let count = input.read_u64()?;
    let index_interval = input.read_u32()?;
    let skip_interval = input.read_u32()?;
    Ok((count, index_interval, skip_interval))
}

impl TermDict {
    pub fn open(dir: &dyn Directory, segment: &str) -> Result<Self> {
        let tii_name = segment_file(segment, "tii");
        let mut tii = dir.open_input(&tii_name)?;
        let (index_count, index_interval, skip_interval) = read_header(tii.as_mut(), &tii_name)?;

        let mut index = Vec::with_capacity(index_count as usize);
        let mut text = String::new();
        let mut info = TermInfo::default();
        let mut tis_pointer = 0u64;
        for _ in 0..index_count {
            let prefix = tii.read_vint()? as usize;
            let suffix = tii.read_string()?;
            let mut next: String = text.chars().take(prefix).collect();
            next.push_str(&suffix);
            text = next;
            let field = tii.read_vint()?;
            info.doc_freq = tii.read_vint()?;
            info.freq_pointer += tii.read_vlong()?;
            info.prox_pointer += tii.read_vlong()?;
            info.skip_delta = if info.doc_freq >= skip_interval {
                tii.read_vint()? as u64
            } else {
                0
            };
            tis_pointer += tii.read_vlong()?;
            index.push(IndexEntry {
                field,
                text: text.clone(),
                info: info.clone(),
                tis_pointer,
            });
        }

        let tis_name = segment_file(segment, "tis");
        let mut tis = dir.open_input(&tis_name)?;
        let (term_count, tis_interval, tis_skip) = read_header(tis.as_mut(), &tis_name)?;
        if tis_interval != index_interval || tis_skip != skip_interval {
            return Err(NautexError::corrupt(
                "term dictionary and index disagree on intervals",
            ));
        }

        Ok(Self {
            inner: Arc::new(DictInner {
                index,
                tis,
                term_count,
                index_interval,
                skip_interval,
            }),
        })
    }

    pub fn term_count(&self) -> u64 {
        self.inner.term_count
    }

    pub fn skip_interval(&self) -> u32 {
        self.inner.skip_interval
    }

    /// Exact lookup
    pub fn get(&self, field: u32, text: &str) -> Result<Option<TermInfo>> {
        let mut cursor = self.cursor_at(field, text)?;
        match cursor.current() {
            Some((f, t, info)) if f == field && t == text => Ok(Some(info.clone())),
            _ => Ok(None),
        }
    }

    /// Cursor over the whole dictionary in sort order
    pub fn cursor(&self) -> Result<TermsCursor> {
        let mut input = self.inner.tis.clone_input()?;
        input.seek(HEADER_LEN)?;
        Ok(TermsCursor {
            inner: Arc::clone(&self.inner),
            input,
            consumed: 0,
            valid: false,
            field: 0,
            text: String::new(),
            info: TermInfo::default(),
        })
    }

    /// Cursor positioned at the first term `>= (field, text)`
    pub fn cursor_at(&self, field: u32, text: &str) -> Result<TermsCursor> {
        let mut cursor = self.cursor()?;
        cursor.seek(field, text)?;
        Ok(cursor)
    }
}

/// Restartable cursor yielding `(field ordinal, text, TermInfo)` in
/// ascending order; owns an independent handle on the `.tis` file
pub struct TermsCursor {
    inner: Arc<DictInner>,
    input: Box<dyn IndexInput>,
    consumed: u64,
    valid: bool,
    field: u32,
    text: String,
    info: TermInfo,
}

impl TermsCursor {
    /// Advance to the next term; false when the dictionary is exhausted
    pub fn next(&mut self) -> Result<bool> {
        if self.consumed >= self.inner.term_count {
            self.valid = false;
            return Ok(false);
        }
        let prefix = self.input.read_vint()? as usize;
        let suffix = self.input.read_string()?;
        let kept: String = self.text.chars().take(prefix).collect();
        if kept.chars().count() < prefix {
            return Err(NautexError::corrupt("term prefix longer than predecessor"));
        }
        let mut text = kept;
        text.push_str(&suffix);
        let field = self.input.read_vint()?;

        if self.valid && (field, text.as_str()) <= (self.field, self.text.as_str()) {
            return Err(NautexError::corrupt(format!(
                "term dictionary out of order at ({}, {})",
                field, text
            )));
        }

        self.info.doc_freq = self.input.read_vint()?;
        self.info.freq_pointer += self.input.read_vlong()?;
        self.info.prox_pointer += self.input.read_vlong()?;
        self.info.skip_delta = if self.info.doc_freq >= self.inner.skip_interval {
            self.input.read_vint()? as u64
        } else {
            0
        };

        self.field = field;
        self.text = text;
        self.consumed += 1;
        self.valid = true;
        Ok(true)
    }

    /// Current term, when positioned on one
    pub fn current(&self) -> Option<(u32, &str, &TermInfo)> {
        if self.valid {
            Some((self.field, &self.text, &self.info))
        } else {
            None
        }
    }

    /// Reposition at the first term `>= (field, text)`; afterwards
    /// [`current`](Self::current) is that term or `None` if the dictionary
    /// ends before it
    pub fn seek(&mut self, field: u32, text: &str) -> Result<()> {
        let index = &self.inner.index;
        // greatest index entry <= target seeds the scan
        let n_le = index.partition_point(|e| (e.field, e.text.as_str()) <= (field, text));
        if n_le == 0 {
            self.input.seek(HEADER_LEN)?;
            self.consumed = 0;
            self.valid = false;
            self.field = 0;
            self.text.clear();
            self.info = TermInfo::default();
        } else {
            let i = n_le - 1;
            let entry = &index[i];
            self.input.seek(entry.tis_pointer)?;
            self.consumed = i as u64 * self.inner.index_interval as u64;
            // entry 0 indexes the empty predecessor of the first term
            self.valid = i > 0;
            self.field = entry.field;
            self.text = entry.text.clone();
            self.info = entry.info.clone();
        }

        loop {
            if self.valid && (self.field, self.text.as_str()) >= (field, text) {
                break;
            }
            if !self.next()? {
                break;
            }
        }
        Ok(())
    }
}

//! Postings streams (`.frq` / `.prx`)
//!
//! For each term, the frequency stream holds one entry per document:
//! `doc_delta << 1 | (freq == 1)`, followed by a VInt freq when the low bit
//! is clear. The position stream holds `freq` position deltas per document.
//!
//! Every `skip_interval` postings a skip point is buffered; the buffered
//! table is appended to `.frq` after the term's postings, and the term's
//! dictionary entry records its offset. Skipping lands on the greatest
//! entry at or before the target doc, then scans.

use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput, IndexOutput};

use super::deletes::BitVector;
use super::segment_file;
use super::term_dict::TermInfo;

/// Write side: one instance streams every term of a segment in dictionary
/// order
pub struct PostingsWriter {
    frq: Box<dyn IndexOutput>,
    prx: Box<dyn IndexOutput>,
    skip_interval: u32,
    // per-term state
    freq_start: u64,
    prox_start: u64,
    last_doc: u32,
    doc_freq: u32,
    skip_points: Vec<SkipPoint>,
}

struct SkipPoint {
    doc: u32,
    freq_ptr: u64,
    prox_ptr: u64,
}

impl PostingsWriter {
    pub fn new(dir: &dyn Directory, segment: &str, skip_interval: u32) -> Result<Self> {
        Ok(Self {
            frq: dir.create_output(&segment_file(segment, "frq"))?,
            prx: dir.create_output(&segment_file(segment, "prx"))?,
            skip_interval,
            freq_start: 0,
            prox_start: 0,
            last_doc: 0,
            doc_freq: 0,
            skip_points: Vec::new(),
        })
    }

    /// Begin the posting list of the next term
    pub fn start_term(&mut self) {
        self.freq_start = self.frq.tell();
        self.prox_start = self.prx.tell();
        self.last_doc = 0;
        self.doc_freq = 0;
        self.skip_points.clear();
    }

    /// Append one `(doc, positions)` posting; docs must be strictly
    /// ascending and `positions` non-empty and ascending
    pub fn add_posting(&mut self, doc: u32, positions: &[u32]) -> Result<()> {
        if positions.is_empty() {
            return Err(NautexError::invalid_argument(
                "posting requires at least one position",
            ));
        }
        if self.doc_freq > 0 && doc <= self.last_doc {
            return Err(NautexError::invalid_argument(format!(
                "postings out of order: doc {doc} after {}",
                self.last_doc
            )));
        }

        if self.doc_freq > 0 && self.doc_freq % self.skip_interval == 0 {
            self.skip_points.push(SkipPoint {
                doc: self.last_doc,
                freq_ptr: self.frq.tell(),
                prox_ptr: self.prx.tell(),
            });
        }

        let delta = doc - if self.doc_freq == 0 { 0 } else { self.last_doc };
        let freq = positions.len() as u32;
        if freq == 1 {
            self.frq.write_vint(delta << 1 | 1)?;
        } else {
            self.frq.write_vint(delta << 1)?;
            self.frq.write_vint(freq)?;
        }

        let mut last_pos = 0u32;
        for &pos in positions {
            self.prx.write_vint(pos - last_pos)?;
            last_pos = pos;
        }

        self.last_doc = doc;
        self.doc_freq += 1;
        Ok(())
    }

    /// Close out the current term, appending its skip table, and return the
    /// dictionary entry describing it
    pub fn end_term(&mut self) -> Result<TermInfo> {
        let mut skip_delta = 0;
        if self.doc_freq >= self.skip_interval {
            let skip_start = self.frq.tell();
            let mut last = SkipPoint {
                doc: 0,
                freq_ptr: self.freq_start,
                prox_ptr: self.prox_start,
            };
            for point in &self.skip_points {
                self.frq.write_vint(point.doc - last.doc)?;
                self.frq.write_vint((point.freq_ptr - last.freq_ptr) as u32)?;
                self.frq.write_vint((point.prox_ptr - last.prox_ptr) as u32)?;
                last = SkipPoint {
                    doc: point.doc,
                    freq_ptr: point.freq_ptr,
                    prox_ptr: point.prox_ptr,
                };
            }
            skip_delta = skip_start - self.freq_start;
        }

        Ok(TermInfo {
            doc_freq: self.doc_freq,
            freq_pointer: self.freq_start,
            prox_pointer: self.prox_start,
            skip_delta,
        })
    }

    pub fn finish(mut self) -> Result<()> {
        self.frq.finish()?;
        self.prx.finish()
    }
}

#[derive(Clone, Copy)]
struct SkipEntry {
    doc: u32,
    freq_ptr: u64,
    prox_ptr: u64,
    /// Postings consumed once positioned at this entry
    count: u32,
}

/// Read cursor over one term's postings
///
/// Deleted documents are silently skipped when a tombstone filter is set;
/// the merger reads raw. Position data is consumed lazily so doc-only
/// iteration never touches `.prx`.
pub struct PostingsCursor {
    frq: Box<dyn IndexInput>,
    prx: Option<Box<dyn IndexInput>>,
    info: TermInfo,
    skip_interval: u32,
    deletions: Option<Arc<BitVector>>,
    overlay: Option<Arc<RoaringBitmap>>,

    count: u32,
    doc: u32,
    freq: u32,
    started: bool,
    /// Position deltas in `.prx` belonging to docs we moved past unread
    prox_pending: u64,
    /// Positions of the current doc not yet read
    freq_unread: u32,
    skip_entries: Option<Vec<SkipEntry>>,
}

impl PostingsCursor {
    pub(crate) fn new(
        frq_master: &dyn IndexInput,
        prx_master: Option<&dyn IndexInput>,
        info: TermInfo,
        skip_interval: u32,
        deletions: Option<Arc<BitVector>>,
        overlay: Option<Arc<RoaringBitmap>>,
    ) -> Result<Self> {
        let mut frq = frq_master.clone_input()?;
        frq.seek(info.freq_pointer)?;
        let prx = match prx_master {
            Some(master) => {
                let mut p = master.clone_input()?;
                p.seek(info.prox_pointer)?;
                Some(p)
            }
            None => None,
        };
        Ok(Self {
            frq,
            prx,
            info,
            skip_interval,
            deletions,
            overlay,
            count: 0,
            doc: 0,
            freq: 0,
            started: false,
            prox_pending: 0,
            freq_unread: 0,
            skip_entries: None,
        })
    }

    pub fn doc(&self) -> u32 {
        self.doc
    }

    pub fn freq(&self) -> u32 {
        self.freq
    }

    fn is_deleted(&self, doc: u32) -> bool {
        if let Some(bits) = &self.deletions {
            if bits.get(doc) {
                return true;
            }
        }
        if let Some(overlay) = &self.overlay {
            if overlay.contains(doc) {
                return true;
            }
        }
        false
    }

    /// Advance to the next live document
    pub fn next(&mut self) -> Result<bool> {
        loop {
            if self.count >= self.info.doc_freq {
                return Ok(false);
            }
            self.prox_pending += self.freq_unread as u64;

            let code = self.frq.read_vint()?;
            let delta = code >> 1;
            self.doc = if self.started { self.doc + delta } else { delta };
            self.freq = if code & 1 == 1 { 1 } else { self.frq.read_vint()? };
            self.count += 1;
            self.started = true;
            self.freq_unread = self.freq;

            if !self.is_deleted(self.doc) {
                return Ok(true);
            }
        }
    }

    /// Advance to the first live document `>= target`
    pub fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.started && self.doc >= target {
            return Ok(true);
        }

        if self.info.skip_delta > 0 && target > self.doc {
            self.load_skip_entries()?;
            let entries = self.skip_entries.as_ref().unwrap();
            let mut best: Option<SkipEntry> = None;
            for entry in entries {
                if entry.doc <= target && entry.count > self.count {
                    best = Some(*entry);
                } else if entry.doc > target {
                    break;
                }
            }
            if let Some(entry) = best {
                self.frq.seek(entry.freq_ptr)?;
                if let Some(prx) = self.prx.as_mut() {
                    prx.seek(entry.prox_ptr)?;
                }
                self.doc = entry.doc;
                self.count = entry.count;
                self.started = true;
                self.prox_pending = 0;
                self.freq_unread = 0;
            }
        }

        while self.next()? {
            if self.doc >= target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Positions of the current document, ascending
    pub fn positions(&mut self) -> Result<Vec<u32>> {
        let prx = self.prx.as_mut().ok_or_else(|| {
            NautexError::invalid_argument("postings cursor opened without positions")
        })?;
        for _ in 0..self.prox_pending {
            prx.read_vint()?;
        }
        self.prox_pending = 0;

        let mut positions = Vec::with_capacity(self.freq as usize);
        let mut pos = 0u32;
        for _ in 0..self.freq_unread {
            pos += prx.read_vint()?;
            positions.push(pos);
        }
        self.freq_unread = 0;
        Ok(positions)
    }

    fn load_skip_entries(&mut self) -> Result<()> {
        if self.skip_entries.is_some() {
            return Ok(());
        }
        let n_entries = if self.info.doc_freq == 0 {
            0
        } else {
            (self.info.doc_freq - 1) / self.skip_interval
        };
        let mut input = self.frq.clone_input()?;
        input.seek(self.info.freq_pointer + self.info.skip_delta)?;

        let mut entries = Vec::with_capacity(n_entries as usize);
        let mut doc = 0u32;
        let mut freq_ptr = self.info.freq_pointer;
        let mut prox_ptr = self.info.prox_pointer;
        for k in 1..=n_entries {
            doc += input.read_vint()?;
            freq_ptr += input.read_vint()? as u64;
            prox_ptr += input.read_vint()? as u64;
            entries.push(SkipEntry {
                doc,
                freq_ptr,
                prox_ptr,
                count: k * self.skip_interval,
            });
        }
        self.skip_entries = Some(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{Directory, RamDirectory};

    use super::*;

    fn write_term(
        dir: &RamDirectory,
        postings: &[(u32, Vec<u32>)],
        skip_interval: u32,
    ) -> TermInfo {
        let mut writer = PostingsWriter::new(dir, "_0", skip_interval).unwrap();
        writer.start_term();
        for (doc, positions) in postings {
            writer.add_posting(*doc, positions).unwrap();
        }
        let info = writer.end_term().unwrap();
        writer.finish().unwrap();
        info
    }

    fn open_cursor(
        dir: &RamDirectory,
        info: &TermInfo,
        skip_interval: u32,
        deletions: Option<Arc<BitVector>>,
    ) -> PostingsCursor {
        let frq = dir.open_input(&segment_file("_0", "frq")).unwrap();
        let prx = dir.open_input(&segment_file("_0", "prx")).unwrap();
        PostingsCursor::new(
            frq.as_ref(),
            Some(prx.as_ref()),
            info.clone(),
            skip_interval,
            deletions,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_iterate_docs_freqs_positions() {
        let dir = RamDirectory::new();
        let postings = vec![
            (0u32, vec![0u32, 5, 9]),
            (3, vec![2]),
            (4, vec![1, 7]),
            (100, vec![42]),
        ];
        let info = write_term(&dir, &postings, 16);
        assert_eq!(info.doc_freq, 4);

        let mut cursor = open_cursor(&dir, &info, 16, None);
        for (doc, positions) in &postings {
            assert!(cursor.next().unwrap());
            assert_eq!(cursor.doc(), *doc);
            assert_eq!(cursor.freq(), positions.len() as u32);
            assert_eq!(&cursor.positions().unwrap(), positions);
        }
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_doc_only_iteration_skips_prox() {
        let dir = RamDirectory::new();
        let postings = vec![(1u32, vec![0u32, 1]), (2, vec![3, 4, 5]), (7, vec![2])];
        let info = write_term(&dir, &postings, 16);

        let mut cursor = open_cursor(&dir, &info, 16, None);
        assert!(cursor.next().unwrap());
        assert!(cursor.next().unwrap());
        assert!(cursor.next().unwrap());
        // positions of earlier docs were never read; doc 7's still correct
        assert_eq!(cursor.positions().unwrap(), vec![2]);
    }

    #[test]
    fn test_skip_to_with_skip_table() {
        let dir = RamDirectory::new();
        let postings: Vec<(u32, Vec<u32>)> =
            (0..200).map(|i| (i * 3, vec![i])).collect();
        let info = write_term(&dir, &postings, 16);
        assert!(info.skip_delta > 0);

        let mut cursor = open_cursor(&dir, &info, 16, None);
        assert!(cursor.skip_to(300).unwrap());
        assert_eq!(cursor.doc(), 300);
        assert_eq!(cursor.positions().unwrap(), vec![100]);

        // target between docs lands on the next one
        assert!(cursor.skip_to(301).unwrap());
        assert_eq!(cursor.doc(), 303);

        // past the end
        assert!(!cursor.skip_to(10_000).unwrap());
    }

    #[test]
    fn test_skip_to_without_skip_table() {
        let dir = RamDirectory::new();
        let postings = vec![(2u32, vec![0u32]), (5, vec![0]), (9, vec![0])];
        let info = write_term(&dir, &postings, 16);
        assert_eq!(info.skip_delta, 0);

        let mut cursor = open_cursor(&dir, &info, 16, None);
        assert!(cursor.skip_to(6).unwrap());
        assert_eq!(cursor.doc(), 9);
    }

    #[test]
    fn test_deleted_docs_filtered() {
        let dir = RamDirectory::new();
        let postings = vec![(0u32, vec![0u32]), (1, vec![0]), (2, vec![0])];
        let info = write_term(&dir, &postings, 16);

        let mut deletions = BitVector::new(3);
        deletions.set(1);

        let mut cursor = open_cursor(&dir, &info, 16, Some(Arc::new(deletions)));
        let mut docs = Vec::new();
        while cursor.next().unwrap() {
            docs.push(cursor.doc());
        }
        assert_eq!(docs, vec![0, 2]);
    }

    #[test]
    fn test_overlay_filter() {
        let dir = RamDirectory::new();
        let postings = vec![(0u32, vec![0u32]), (1, vec![0]), (2, vec![0])];
        let info = write_term(&dir, &postings, 16);

        let mut overlay = RoaringBitmap::new();
        overlay.insert(0);
        overlay.insert(2);

        let frq = dir.open_input(&segment_file("_0", "frq")).unwrap();
        let mut cursor = PostingsCursor::new(
            frq.as_ref(),
            None,
            info,
            16,
            None,
            Some(Arc::new(overlay)),
        )
        .unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.doc(), 1);
        assert!(!cursor.next().unwrap());
    }
}

//! The commit manifest (`segments_<gen>`) and its sentinel (`segments.gen`)
//!
//! A generation is a monotone commit number; the manifest file for
//! generation `g` is named `segments_<g base36>` and lists every live
//! segment. Readers resolve the current generation through the sentinel
//! when possible and fall back to a directory listing; writers publish a
//! new generation by writing to a temp name and renaming atomically.

use tracing::{debug, warn};

use crate::error::{NautexError, Result};
use crate::store::{Directory, IndexInput, IndexOutput, RamOutput};

/// Only supported manifest format tag
pub const SEGMENTS_FORMAT: i32 = -9;

/// Format tag of the `segments.gen` sentinel
const SEGMENTS_GEN_FORMAT: i32 = -2;

/// Name of the generation sentinel file
pub const SEGMENTS_GEN_NAME: &str = "segments.gen";

const SEGMENTS_PREFIX: &str = "segments_";

/// Lowercase base-36 rendering (generation and deletion-generation suffixes)
pub(crate) fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for c in s.chars() {
        let d = c.to_digit(36)?;
        n = n.checked_mul(36)?.checked_add(d as u64)?;
    }
    Some(n)
}

/// One live segment as recorded in the manifest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentInfo {
    pub name: String,
    pub doc_count: u32,
    /// `-1` no deletions, `0` legacy (rejected), `> 0` the generation of
    /// the current `.del` file
    pub del_gen: i64,
}

impl SegmentInfo {
    pub fn new(name: impl Into<String>, doc_count: u32) -> Self {
        Self {
            name: name.into(),
            doc_count,
            del_gen: -1,
        }
    }

    pub fn has_deletions(&self) -> bool {
        self.del_gen > 0
    }

    /// Name of the current deletion bitmap file, if any
    pub fn del_file_name(&self) -> Option<String> {
        if self.has_deletions() {
            Some(super::deletes_file(&self.name, self.del_gen))
        } else {
            None
        }
    }

    /// Bump the deletion generation for the next bitmap rewrite
    pub fn advance_del_gen(&mut self) {
        self.del_gen = if self.del_gen > 0 { self.del_gen + 1 } else { 1 };
    }
}

/// The manifest: format tag, commit version, segment name counter and the
/// live segment list
#[derive(Clone, Debug)]
pub struct SegmentInfos {
    pub format: i32,
    pub version: i64,
    name_counter: u32,
    pub segments: Vec<SegmentInfo>,
    /// Generation this state was read from; `-1` before the first commit
    pub generation: i64,
}

impl SegmentInfos {
    pub fn new() -> Self {
        Self {
            format: SEGMENTS_FORMAT,
            version: 0,
            name_counter: 0,
            segments: Vec::new(),
            generation: -1,
        }
    }

    /// Allocate the next segment name (`_0`, `_1`, ... in base-36)
    pub fn next_segment_name(&mut self) -> String {
        let name = format!("_{}", to_base36(self.name_counter as u64));
        self.name_counter += 1;
        name
    }

    pub fn total_doc_count(&self) -> u64 {
        self.segments.iter().map(|s| s.doc_count as u64).sum()
    }

    /// Manifest file name for a generation
    pub fn file_name_from_generation(gen: i64) -> String {
        format!("{SEGMENTS_PREFIX}{}", to_base36(gen as u64))
    }

    /// Parse a generation out of a manifest file name
    fn generation_from_file_name(name: &str) -> Option<i64> {
        let suffix = name.strip_prefix(SEGMENTS_PREFIX)?;
        from_base36(suffix).map(|g| g as i64)
    }

    /// Largest committed generation in the directory, `-1` when none.
    ///
    /// Prefers the `segments.gen` sentinel; falls back to listing the
    /// directory when the sentinel is missing, unreadable, or stale.
    pub fn current_generation(dir: &dyn Directory) -> Result<i64> {
        if let Some(gen) = Self::generation_from_sentinel(dir) {
            if dir.exists(&Self::file_name_from_generation(gen))? {
                return Ok(gen);
            }
            warn!(gen, "segments.gen points at a missing manifest, listing directory");
        }
        Self::generation_from_listing(dir)
    }

    fn generation_from_sentinel(dir: &dyn Directory) -> Option<i64> {
        let mut input = dir.open_input(SEGMENTS_GEN_NAME).ok()?;
        let format = input.read_i32().ok()?;
        if format != SEGMENTS_GEN_FORMAT {
            return None;
        }
        let gen0 = input.read_i64().ok()?;
        let gen1 = input.read_i64().ok()?;
        if gen0 != gen1 {
            return None;
        }
        Some(gen0)
    }

    fn generation_from_listing(dir: &dyn Directory) -> Result<i64> {
        let mut max_gen = -1i64;
        let mut saw_legacy = false;
        for name in dir.list_all()? {
            if name == "segments" {
                saw_legacy = true;
            } else if let Some(gen) = Self::generation_from_file_name(&name) {
                max_gen = max_gen.max(gen);
            }
        }
        if max_gen < 0 && saw_legacy {
            return Err(NautexError::corrupt(
                "pre-2.1 single-file segments format is not supported",
            ));
        }
        Ok(max_gen)
    }

    /// Read the manifest at a specific generation
    pub fn read(dir: &dyn Directory, gen: i64) -> Result<Self> {
        let name = Self::file_name_from_generation(gen);
        let mut input = dir.open_input(&name)?;

        let body_len = input
            .len()
            .checked_sub(8)
            .ok_or_else(|| NautexError::corrupt(format!("{name} shorter than its checksum")))?;
        let mut body = vec![0u8; body_len as usize];
        input.read_bytes(&mut body)?;
        let declared = input.read_i64()?;
        let actual = checksum(&body);
        if declared != actual {
            return Err(NautexError::corrupt(format!(
                "checksum mismatch in {name}: declared {declared}, computed {actual}"
            )));
        }

        let mut input = dir.open_input(&name)?;
        let format = input.read_i32()?;
        if format != SEGMENTS_FORMAT {
            return Err(NautexError::corrupt(format!(
                "unsupported segments format {format} (expected {SEGMENTS_FORMAT})"
            )));
        }
        let version = input.read_i64()?;
        let name_counter = input.read_i32()?;
        let segment_count = input.read_i32()?;
        if segment_count < 0 {
            return Err(NautexError::corrupt("negative segment count"));
        }

        let mut segments = Vec::with_capacity(segment_count as usize);
        for _ in 0..segment_count {
            let seg_name = input.read_string()?;
            let doc_count = input.read_i32()?;
            if doc_count < 0 {
                return Err(NautexError::corrupt("negative doc count"));
            }
            let del_gen = input.read_i64()?;
            if del_gen == 0 {
                return Err(NautexError::corrupt(format!(
                    "segment {seg_name} uses the unsupported pre-2.1 deletions layout"
                )));
            }
            segments.push(SegmentInfo {
                name: seg_name,
                doc_count: doc_count as u32,
                del_gen,
            });
        }

        Ok(Self {
            format,
            version,
            name_counter: name_counter as u32,
            segments,
            generation: gen,
        })
    }

    /// Read the manifest at the current generation; empty state when the
    /// directory has no commit yet
    pub fn read_current(dir: &dyn Directory) -> Result<Self> {
        let gen = Self::current_generation(dir)?;
        if gen < 0 {
            return Ok(Self::new());
        }
        debug!(gen, "opening segments file");
        Self::read(dir, gen)
    }

    /// Publish the next generation: serialize, write to a temp name, fsync,
    /// rename atomically, then update the sentinel best-effort
    pub fn write(&mut self, dir: &dyn Directory) -> Result<()> {
        let next_gen = if self.generation < 0 {
            1
        } else {
            self.generation + 1
        };
        self.version += 1;

        let mut body = RamOutput::new();
        {
            body.write_i32(self.format)?;
            body.write_i64(self.version)?;
            body.write_i32(self.name_counter as i32)?;
            body.write_i32(self.segments.len() as i32)?;
            for segment in &self.segments {
                body.write_string(&segment.name)?;
                body.write_i32(segment.doc_count as i32)?;
                body.write_i64(segment.del_gen)?;
            }
        }
        let bytes = body.into_bytes();
        let sum = checksum(&bytes);

        let final_name = Self::file_name_from_generation(next_gen);
        let temp_name = format!("{final_name}.tmp");
        let mut out = dir.create_output(&temp_name)?;
        out.write_bytes(&bytes)?;
        out.write_i64(sum)?;
        out.finish()?;
        dir.rename(&temp_name, &final_name)?;
        self.generation = next_gen;

        // sentinel update is advisory; readers tolerate staleness
        if let Err(e) = self.write_sentinel(dir) {
            warn!(error = %e, "failed to update segments.gen");
        }
        Ok(())
    }

    fn write_sentinel(&self, dir: &dyn Directory) -> Result<()> {
        let mut out = dir.create_output(SEGMENTS_GEN_NAME)?;
        out.write_i32(SEGMENTS_GEN_FORMAT)?;
        out.write_i64(self.generation)?;
        out.write_i64(self.generation)?;
        out.finish()
    }
}

impl Default for SegmentInfos {
    fn default() -> Self {
        Self::new()
    }
}

/// Additive checksum: byte sum mod 2^63
fn checksum(bytes: &[u8]) -> i64 {
    let mut sum: u64 = 0;
    for &b in bytes {
        sum = sum.wrapping_add(b as u64);
    }
    (sum & 0x7FFF_FFFF_FFFF_FFFF) as i64
}

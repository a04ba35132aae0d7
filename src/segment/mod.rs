//! Immutable segments
//!
//! A segment is a self-contained sub-index written once and never modified
//! afterwards, except for its deletion bitmap which is replaced as a whole
//! file under a new generation suffix. This module implements the segment
//! file formats and the readers/writers/merger over them:
//!
//! - `field_infos`: `.fnm` field table
//! - `stored`: `.fdx`/`.fdt` stored fields
//! - `term_dict`: `.tis`/`.tii` sorted term dictionary with skip index
//! - `postings`: `.frq`/`.prx` doc/frequency and position streams
//! - `norms`: `.f<ord>` per-field length normalization bytes
//! - `deletes`: `_<gen>.del` tombstone bitmap
//! - `infos`: the `segments_<gen>` manifest and `segments.gen` sentinel
//! - `buffer` / `writer`: the in-RAM pre-flush index and the flush path
//! - `reader`: cursors over one on-disk segment
//! - `merger`: k-way merge of several segments into one

mod buffer;
mod deletes;
mod field_infos;
mod infos;
mod merger;
mod norms;
mod postings;
mod reader;
mod stored;
mod term_dict;
mod writer;

pub use buffer::DocumentBuffer;
pub use deletes::BitVector;
pub use field_infos::{FieldInfo, FieldInfos};
pub use infos::{SegmentInfo, SegmentInfos, SEGMENTS_FORMAT, SEGMENTS_GEN_NAME};
pub use merger::SegmentMerger;
pub use norms::{decode_norm, encode_norm};
pub use postings::{PostingsCursor, PostingsWriter};
pub use reader::{SegmentReader, SegmentTerms};
pub use term_dict::{Term, TermDict, TermDictWriter, TermInfo};
pub use writer::SegmentWriter;

/// `<segment>.<ext>` file name
pub(crate) fn segment_file(segment: &str, ext: &str) -> String {
    format!("{segment}.{ext}")
}

/// `<segment>.f<ord>` norms file name
pub(crate) fn norms_file(segment: &str, field_ord: u32) -> String {
    format!("{segment}.f{field_ord}")
}

/// `<segment>_<delGen base36>.del` tombstone file name
pub(crate) fn deletes_file(segment: &str, del_gen: i64) -> String {
    format!("{segment}_{}.del", infos::to_base36(del_gen as u64))
}

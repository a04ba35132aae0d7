use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Index configuration
///
/// Tunables for the write path: buffering, merging, and the on-disk term
/// dictionary / postings granularity. All of these can also be adjusted on
/// a live [`Index`](crate::index::Index) through its setters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Segments merged at once; also the growth factor between merge levels
    pub merge_factor: u32,
    /// Buffered documents that trigger a flush into a new segment
    pub max_buffered_docs: u32,
    /// A merge whose result would exceed this many documents is skipped
    pub max_merge_docs: u32,
    /// Every n-th term dictionary entry is mirrored into the `.tii` index
    pub term_index_interval: u32,
    /// Postings between consecutive skip-list entries
    pub skip_interval: u32,
    /// How long to wait for `write.lock` before failing
    #[serde(with = "duration_millis")]
    pub write_lock_timeout: Duration,
    /// Text analysis settings used when indexing tokenized fields
    pub analyzer: AnalyzerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            merge_factor: 10,
            max_buffered_docs: 10,
            max_merge_docs: u32::MAX,
            term_index_interval: 128,
            skip_interval: 16,
            write_lock_timeout: Duration::from_millis(1000),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

/// Analyzer configuration
///
/// The default keeps every word as-is apart from lowercasing, so exact
/// single-character terms survive (phrase queries depend on that).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: 255,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.merge_factor, 10);
        assert_eq!(config.max_buffered_docs, 10);
        assert_eq!(config.max_merge_docs, u32::MAX);
        assert_eq!(config.term_index_interval, 128);
        assert_eq!(config.skip_interval, 16);
    }

    #[test]
    fn test_analyzer_defaults_keep_short_tokens() {
        let config = AnalyzerConfig::default();
        assert!(config.lowercase);
        assert!(!config.remove_stopwords);
        assert!(!config.stem);
        assert_eq!(config.min_token_length, 1);
    }
}

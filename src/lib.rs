//! # nautex
//!
//! An embedded full-text search engine over an immutable-segment inverted
//! index. Documents are buffered in memory, flushed into self-contained
//! segments, and published atomically through a generation-numbered
//! manifest; a logarithmic merge policy keeps the segment count bounded.
//! Queries (term, phrase, Boolean, range, fuzzy, wildcard) are rewritten
//! against the dictionary and scored with classical tf·idf.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nautex::{Document, Field, FsDirectory, Index, IndexConfig, TermQuery};
//!
//! # fn main() -> nautex::Result<()> {
//! let dir = Arc::new(FsDirectory::open("/tmp/my-index")?);
//! let mut index = Index::open(dir, IndexConfig::default())?;
//!
//! index.add_document(
//!     &Document::new().with(Field::text("title", "the quick brown fox")),
//! )?;
//! index.commit()?;
//!
//! let hits = index.find(&TermQuery::new("title", "quick").into())?;
//! assert_eq!(hits.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod query;
pub mod search;
pub mod segment;
pub mod store;

pub use analysis::Analyzer;
pub use config::{AnalyzerConfig, IndexConfig};
pub use document::{Document, Field, FieldValue};
pub use error::{NautexError, Result};
pub use index::{Index, IndexReader, MultiTerms};
pub use query::{
    BooleanClause, BooleanQuery, FuzzyQuery, MultiTermQuery, Occur, PhraseQuery, Query,
    RangeQuery, TermQuery, WildcardQuery,
};
pub use search::{DefaultSimilarity, QueryHit, Similarity};
pub use segment::Term;
pub use store::{Directory, FsDirectory, RamDirectory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

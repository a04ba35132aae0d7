//! Storage directory abstraction
//!
//! An index lives entirely inside a [`Directory`]: a flat namespace of byte
//! streams with atomic rename and an advisory lock. Two implementations are
//! provided, one over the filesystem and one in memory.
//!
//! Inputs support random access and cheap cloning (independent cursors over
//! the same file); outputs are append-oriented but can seek back to patch a
//! header. The integer/string codec shared by every index file lives as
//! provided methods on the [`IndexInput`]/[`IndexOutput`] traits.

mod fs;
mod input;
mod output;
mod ram;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;

pub use fs::FsDirectory;
pub use input::IndexInput;
pub use output::{IndexOutput, RamOutput};
pub use ram::RamDirectory;

/// Name of the advisory writer lock file
pub const WRITE_LOCK_NAME: &str = "write.lock";

/// A held advisory lock; released on drop
pub trait Lock: Send {
    fn name(&self) -> &str;
}

/// A flat namespace of named byte streams
///
/// All index files of one index live in one directory. Renames must be
/// atomic; they are the commit point of the index.
pub trait Directory: Send + Sync {
    /// All file names in the directory, unordered
    fn list_all(&self) -> Result<Vec<String>>;

    fn exists(&self, name: &str) -> Result<bool>;

    fn file_length(&self, name: &str) -> Result<u64>;

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Create (or truncate) a named stream for writing
    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>>;

    /// Open a named stream for random-access reading
    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>>;

    /// Atomically replace `to` with `from`
    fn rename(&self, from: &str, to: &str) -> Result<()>;

    /// Acquire an advisory lock, waiting up to `timeout` (`None` = fail
    /// immediately if held)
    fn acquire_lock(&self, name: &str, timeout: Option<Duration>) -> Result<Box<dyn Lock>>;

    /// Pin files against deletion (in-process reader refcount)
    fn pin(&self, names: &[String]);

    /// Drop one pin per name
    fn unpin(&self, names: &[String]);

    /// Whether any live reader still pins this file
    fn is_pinned(&self, name: &str) -> bool;
}

/// Refcounting pin table shared by the directory implementations
///
/// A snapshot reader pins every file of its generation on open; the
/// writer's post-commit deletion pass skips pinned files.
#[derive(Default)]
pub(crate) struct PinTable {
    counts: Mutex<HashMap<String, usize>>,
}

impl PinTable {
    pub fn pin(&self, names: &[String]) {
        let mut counts = self.counts.lock();
        for name in names {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
    }

    pub fn unpin(&self, names: &[String]) {
        let mut counts = self.counts.lock();
        for name in names {
            if let Some(count) = counts.get_mut(name) {
                *count -= 1;
                if *count == 0 {
                    counts.remove(name);
                }
            }
        }
    }

    pub fn is_pinned(&self, name: &str) -> bool {
        self.counts.lock().contains_key(name)
    }
}

/// RAII guard that unpins a file set when dropped
pub struct PinGuard {
    dir: Arc<dyn Directory>,
    names: Vec<String>,
}

impl PinGuard {
    pub fn new(dir: Arc<dyn Directory>, names: Vec<String>) -> Self {
        dir.pin(&names);
        Self { dir, names }
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        self.dir.unpin(&self.names);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_table_refcounts() {
        let table = PinTable::default();
        let names = vec!["a".to_string(), "b".to_string()];

        table.pin(&names);
        table.pin(&names[..1].to_vec());
        assert!(table.is_pinned("a"));
        assert!(table.is_pinned("b"));

        table.unpin(&names);
        assert!(table.is_pinned("a")); // one pin left
        assert!(!table.is_pinned("b"));

        table.unpin(&names[..1].to_vec());
        assert!(!table.is_pinned("a"));
    }
}

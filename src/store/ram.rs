//! In-memory directory
//!
//! Byte-for-byte equivalent to the filesystem directory, minus durability.
//! Used by tests and by transient indexes.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::error::{NautexError, Result};

use super::input::IndexInput;
use super::output::{IndexOutput, RamOutput};
use super::{Directory, Lock, PinTable};

struct RamInner {
    files: RwLock<HashMap<String, Arc<Vec<u8>>>>,
    locks: Mutex<HashSet<String>>,
    pins: PinTable,
}

/// A directory held entirely in memory; cloning shares the same store
#[derive(Clone)]
pub struct RamDirectory {
    inner: Arc<RamInner>,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RamInner {
                files: RwLock::new(HashMap::new()),
                locks: Mutex::new(HashSet::new()),
                pins: PinTable::default(),
            }),
        }
    }
}

impl Default for RamDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(name: &str) -> NautexError {
    NautexError::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file: {name}"),
    ))
}

impl Directory for RamDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        Ok(self.inner.files.read().keys().cloned().collect())
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.inner.files.read().contains_key(name))
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        self.inner
            .files
            .read()
            .get(name)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(name))
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.inner
            .files
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_found(name))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let inner = Arc::clone(&self.inner);
        let name = name.to_string();
        Ok(Box::new(RamOutput::with_publish(Box::new(move |bytes| {
            inner.files.write().insert(name.clone(), Arc::new(bytes));
        }))))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let data = self
            .inner
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(name))?;
        Ok(Box::new(RamInput::new(data)))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.inner.files.write();
        let data = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn acquire_lock(&self, name: &str, timeout: Option<Duration>) -> Result<Box<dyn Lock>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            {
                let mut locks = self.inner.locks.lock();
                if !locks.contains(name) {
                    locks.insert(name.to_string());
                    return Ok(Box::new(RamLock {
                        inner: Arc::clone(&self.inner),
                        name: name.to_string(),
                    }));
                }
            }
            match deadline {
                Some(d) if Instant::now() < d => {
                    std::thread::sleep(Duration::from_millis(10));
                }
                _ => {
                    return Err(NautexError::lock_failed(format!("lock held: {name}")));
                }
            }
        }
    }

    fn pin(&self, names: &[String]) {
        self.inner.pins.pin(names);
    }

    fn unpin(&self, names: &[String]) {
        self.inner.pins.unpin(names);
    }

    fn is_pinned(&self, name: &str) -> bool {
        self.inner.pins.is_pinned(name)
    }
}

struct RamLock {
    inner: Arc<RamInner>,
    name: String,
}

impl Lock for RamLock {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RamLock {
    fn drop(&mut self) {
        self.inner.locks.lock().remove(&self.name);
    }
}

/// Cursor over an immutable in-memory file
pub(crate) struct RamInput {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl RamInput {
    fn new(data: Arc<Vec<u8>>) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(Arc::new(bytes))
    }
}

impl IndexInput for RamInput {
    fn read_byte(&mut self) -> Result<u8> {
        let b = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| NautexError::eof("read past end of in-memory file"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(NautexError::eof("read past end of in-memory file"));
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.data.len() as u64 {
            return Err(NautexError::corrupt(format!(
                "seek to {} past end of file ({} bytes)",
                pos,
                self.data.len()
            )));
        }
        self.pos = pos as usize;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos as u64
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn clone_input(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(RamInput {
            data: Arc::clone(&self.data),
            pos: self.pos,
        }))
    }
}

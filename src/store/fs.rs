//! Filesystem directory
//!
//! One index = one flat OS directory. Outputs buffer through `BufWriter`
//! and fsync on finish; `rename` maps to the platform's atomic rename. The
//! writer lock is a `create_new` lock file removed on drop.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{NautexError, Result};

use super::input::IndexInput;
use super::output::IndexOutput;
use super::{Directory, Lock, PinTable};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Directory over a filesystem path
pub struct FsDirectory {
    path: PathBuf,
    pins: PinTable,
}

impl FsDirectory {
    /// Open (creating if necessary) the directory at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        fs::create_dir_all(&path)?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            pins: PinTable::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Directory for FsDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Ok(name) = entry.file_name().into_string() {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.resolve(name).is_file())
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        Ok(fs::metadata(self.resolve(name))?.len())
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name))?;
        Ok(())
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file = File::create(self.resolve(name))?;
        Ok(Box::new(FsIndexOutput {
            writer: BufWriter::new(file),
            pos: 0,
        }))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let file = File::open(self.resolve(name))?;
        let len = file.metadata()?.len();
        Ok(Box::new(FsIndexInput {
            file: Arc::new(file),
            pos: 0,
            len,
        }))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.resolve(from), self.resolve(to))?;
        Ok(())
    }

    fn acquire_lock(&self, name: &str, timeout: Option<Duration>) -> Result<Box<dyn Lock>> {
        let path = self.resolve(name);
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    return Ok(Box::new(FsLock {
                        path,
                        name: name.to_string(),
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => match deadline {
                    Some(d) if Instant::now() < d => std::thread::sleep(LOCK_POLL_INTERVAL),
                    _ => {
                        return Err(NautexError::lock_failed(format!(
                            "lock file exists: {}",
                            path.display()
                        )));
                    }
                },
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn pin(&self, names: &[String]) {
        self.pins.pin(names);
    }

    fn unpin(&self, names: &[String]) {
        self.pins.unpin(names);
    }

    fn is_pinned(&self, name: &str) -> bool {
        self.pins.is_pinned(name)
    }
}

struct FsLock {
    path: PathBuf,
    name: String,
}

impl Lock for FsLock {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FsLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

struct FsIndexOutput {
    writer: BufWriter<File>,
    pos: u64,
}

impl IndexOutput for FsIndexOutput {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.writer.write_all(&[b])?;
        self.pos += 1;
        Ok(())
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.writer.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.writer.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

struct FsIndexInput {
    file: Arc<File>,
    pos: u64,
    len: u64,
}

impl IndexInput for FsIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.pos + buf.len() as u64 > self.len {
            return Err(NautexError::eof("read past end of file"));
        }
        self.file.read_exact_at(buf, self.pos)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(NautexError::corrupt(format!(
                "seek to {} past end of file ({} bytes)",
                pos, self.len
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn clone_input(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(FsIndexInput {
            file: Arc::clone(&self.file),
            pos: self.pos,
            len: self.len,
        }))
    }
}

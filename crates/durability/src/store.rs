//! The `Store` abstraction: a byte-addressable backing medium that the
//! snapshot and WAL engines read and write through, without caring whether
//! the bytes live in a file or a memory buffer.
//!
//! Reads past the logical size are not an error -- they return zero bytes,
//! as if the store were an infinite zero-filled tape past its high-water
//! mark. Seeking past the end is allowed (it is how a write extends the
//! store); seeking is not itself a read.

use persistkit_core::{Error, Result};
use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom, Write as _};
use std::path::Path;

/// Polymorphic sink/source for snapshot and WAL bytes.
///
/// A `Store` is exclusively owned by at most one [`crate::context::PersistContext`]
/// at a time; the trait itself does not enforce that, callers must.
pub trait Store {
    /// Write `buf` at the current position, advancing it and extending the
    /// logical size if necessary.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Fill `buf` from the current position, advancing it. Bytes past the
    /// logical size are zero, not an error.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Move the current position. Not bounds-checked; writing there will
    /// extend the store, reading there will return zeros up to the current
    /// size.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// The current position.
    fn tell(&self) -> Result<u64>;

    /// Flush buffered data to the underlying medium and make it durable.
    fn sync(&mut self) -> Result<()>;

    /// Set the logical size to the current position, discarding any bytes
    /// beyond it.
    fn truncate(&mut self) -> Result<()>;

    /// The current logical size.
    fn size(&self) -> Result<u64>;

    /// Release any resources. Best-effort; further operations after `close`
    /// are a contract violation.
    fn close(&mut self) -> Result<()>;
}

/// An in-memory `Store` backed by a growing `Vec<u8>` with geometric
/// capacity doubling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buf: Vec<u8>,
    size: usize,
    position: usize,
}

impl MemoryStore {
    /// A fresh, empty memory store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Build a memory store pre-populated with `bytes`, positioned at 0.
    pub fn from_bytes(bytes: Vec<u8>) -> MemoryStore {
        let size = bytes.len();
        MemoryStore {
            buf: bytes,
            size,
            position: 0,
        }
    }

    /// The backing bytes and current logical size, for callers (tests,
    /// inspection tools) that need a direct read of what was written.
    pub fn peek(&self) -> (&[u8], usize) {
        (&self.buf[..self.size], self.size)
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if self.buf.len() >= needed {
            return;
        }
        let mut new_cap = self.buf.len().max(64);
        while new_cap < needed {
            new_cap *= 2;
        }
        self.buf.resize(new_cap, 0);
    }
}

impl Store for MemoryStore {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let end = self.position + data.len();
        self.ensure_capacity(end);
        self.buf[self.position..end].copy_from_slice(data);
        self.position = end;
        if self.size < end {
            self.size = end;
        }
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let available = self.size.saturating_sub(self.position);
        let to_copy = available.min(out.len());
        if to_copy > 0 {
            out[..to_copy].copy_from_slice(&self.buf[self.position..self.position + to_copy]);
        }
        for b in &mut out[to_copy..] {
            *b = 0;
        }
        self.position += out.len();
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.position = pos as usize;
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.position as u64)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.size = self.position;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.size as u64)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A `Store` backed by a real file via positioned file-descriptor I/O.
pub struct FileStore {
    file: File,
    position: u64,
}

impl FileStore {
    /// Open (creating if necessary) a file-backed store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FileStore> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileStore { file, position: 0 })
    }

    /// Atomically replace the contents of the file at `path` with `bytes`:
    /// write to a sibling temp file, fsync it, then rename over the
    /// original. A crash at any point leaves either the old file intact or
    /// the new one -- never a partially-written one in its place.
    pub fn replace_atomically<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp-replace");
        {
            let mut tmp = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(bytes)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

impl Store for FileStore {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.write_all(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<()> {
        let size = self.size()?;
        if self.position >= size {
            out.fill(0);
            self.position += out.len() as u64;
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.position))?;
        let available = (size - self.position).min(out.len() as u64) as usize;
        self.file.read_exact(&mut out[..available])?;
        for b in &mut out[available..] {
            *b = 0;
        }
        self.position += out.len() as u64;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.position = pos;
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.position)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn truncate(&mut self) -> Result<()> {
        self.file.set_len(self.position)?;
        Ok(())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn close(&mut self) -> Result<()> {
        self.file.sync_all().map_err(Error::from)
    }
}

use crate::error::LogError;
use crate::storage::Enc;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Width of the length prefix written before every payload.
pub const LEN_WIDTH: u64 = 8;

/// A Store is the append-only byte container backing one segment.
///
/// Responsibilities:
/// - Own one file on disk
/// - Append length-prefixed payloads through a write buffer
/// - Read payloads back by byte position
/// - Track the current size (next append position)
///
/// NOT responsible for:
/// - Offset assignment or lookup (Index/Segment handle that)
/// - Interpreting payload bytes (opaque to the store)
/// - Rotation decisions
///
/// ## On-disk format:
/// ```text
/// | length: u64 BE | payload: [u8; length] | ...
/// ```
///
/// ## Buffering and visibility:
/// Appends go to a buffered writer and are NOT flushed per call; the
/// durability point is an explicit flush/close. Every read flushes the
/// buffer first, so a record appended moments earlier is immediately
/// visible to any reader of the same store.
///
/// ## Thread safety:
/// All state sits behind one internal lock, so a standalone Store
/// serializes concurrent append/read/close on its own. The log's exclusive
/// lock makes this redundant on the normal path; it stays for defense in
/// depth.
pub struct Store {
    path: PathBuf,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    /// Handle used for positional reads. Shares the descriptor with the
    /// writer; safe because writes are append-mode and reads seek first.
    reader: File,

    /// Buffered writer for appends.
    writer: BufWriter<File>,

    /// Size in bytes, including buffered-but-unflushed writes. This is the
    /// position the next append will start at.
    size: u64,
}

impl Store {
    /// Open or create the store file at the given path.
    ///
    /// The size is recovered from file metadata, so reopening an existing
    /// store resumes appending where the previous process stopped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        let reader = file.try_clone()?;

        Ok(Store {
            path,
            inner: Mutex::new(StoreInner {
                reader,
                writer: BufWriter::new(file),
                size,
            }),
        })
    }

    /// Append a payload, prefixed with its 8-byte big-endian length.
    ///
    /// Returns `(bytes_written, position)`: the total bytes this append
    /// occupies (prefix + payload) and the position the entry starts at.
    /// The position is what gets recorded in the index.
    pub fn append(&self, payload: &[u8]) -> Result<(u64, u64), LogError> {
        let mut inner = self.lock()?;

        let pos = inner.size;
        inner.writer.write_u64::<Enc>(payload.len() as u64)?;
        inner.writer.write_all(payload)?;

        let written = LEN_WIDTH + payload.len() as u64;
        inner.size += written;
        Ok((written, pos))
    }

    /// Read the payload of the entry starting at `pos`.
    ///
    /// Flushes the write buffer first so the store's own appends are always
    /// readable, then reads the length prefix and exactly that many payload
    /// bytes.
    pub fn read(&self, pos: u64) -> Result<Vec<u8>, LogError> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        inner.reader.seek(SeekFrom::Start(pos))?;
        let len = inner.reader.read_u64::<Enc>()?;

        let mut payload = vec![0u8; len as usize];
        inner.reader.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Raw positional read after a flush.
    ///
    /// Fills `buf` with as many bytes as are available at `offset` and
    /// returns the count (0 at end of file). Used for full-file streaming,
    /// not for record lookup.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, LogError> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        inner.reader.seek(SeekFrom::Start(offset))?;
        Ok(inner.reader.read(buf)?)
    }

    /// A sequential reader over this store's raw bytes.
    ///
    /// The reader is bounded by the store's size at the time of this call
    /// and holds its own file handle, so it stays valid (and finite) while
    /// the store keeps appending.
    pub fn reader(&self) -> Result<StoreReader, LogError> {
        let mut inner = self.lock()?;
        inner.writer.flush()?;

        Ok(StoreReader {
            file: File::open(&self.path)?,
            pos: 0,
            len: inner.size,
        })
    }

    /// Current size in bytes, counting buffered writes.
    pub fn size(&self) -> Result<u64, LogError> {
        Ok(self.lock()?.size)
    }

    /// Flush buffered appends to the OS.
    pub fn flush(&self) -> Result<(), LogError> {
        Ok(self.lock()?.writer.flush()?)
    }

    /// Flush and close the store.
    pub fn close(self) -> Result<(), LogError> {
        let mut inner = self.inner.into_inner().map_err(|_| LogError::LockPoisoned)?;
        inner.writer.flush()?;
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, LogError> {
        self.inner.lock().map_err(|_| LogError::LockPoisoned)
    }
}

/// Sequential `io::Read` over one store's `[length][payload]` frames.
///
/// Bounded by the store size captured at creation; yields raw frames, not
/// decoded records.
pub struct StoreReader {
    file: File,
    pos: u64,
    len: u64,
}

impl Read for StoreReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let remaining = (self.len - self.pos) as usize;
        let want = buf.len().min(remaining);

        self.file.seek(SeekFrom::Start(self.pos))?;
        let n = self.file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

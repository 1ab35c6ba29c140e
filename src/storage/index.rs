use crate::error::LogError;
use crate::storage::Enc;
use byteorder::ByteOrder;
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Width of the relative-offset half of an entry.
pub const OFF_WIDTH: u64 = 4;
/// Width of the store-position half of an entry.
pub const POS_WIDTH: u64 = 8;
/// Width of one index entry.
pub const ENT_WIDTH: u64 = OFF_WIDTH + POS_WIDTH;

/// An Index maps relative offsets to byte positions in a segment's store.
///
/// Responsibilities:
/// - Own one file on disk, memory-mapped read/write
/// - Append fixed-width entries at the logical size
/// - Read entries by position, or the last entry
/// - Track the logical size separately from the allocated capacity
///
/// NOT responsible for:
/// - Reading store data
/// - Absolute/relative offset translation (Segment handles that)
/// - Concurrency: entries are written straight into the mapping, so
///   integrity under concurrent writers relies on the log's external lock
///
/// ## On-disk format:
/// Each entry is exactly 12 bytes:
/// ```text
/// | relative offset: u32 BE | store position: u64 BE |
/// ```
///
/// ## Pre-allocation:
/// A memory mapping cannot be resized after it is created, so the file is
/// grown to the configured maximum before mapping. The logical size (bytes
/// actually holding entries) is tracked separately, and `close` truncates
/// the file back down to it. Skipping that truncation leaves capacity
/// padding that would corrupt the next open's last-entry recovery.
pub struct Index {
    path: PathBuf,
    file: File,
    mmap: MmapMut,

    /// Bytes actually used by entries, as opposed to the mapped capacity.
    size: u64,
}

impl Index {
    /// Open or create an index file, grow it to `max_index_bytes`, and map
    /// it shared read/write.
    ///
    /// The logical size is recovered from the file's length before the
    /// grow, which is why `close` must have truncated it on the previous
    /// clean shutdown.
    pub fn open(path: impl AsRef<Path>, max_index_bytes: u64) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let size = file.metadata()?.len();
        if size % ENT_WIDTH != 0 {
            return Err(LogError::CorruptIndex(format!(
                "size {} is not a multiple of the entry width {}",
                size, ENT_WIDTH
            )));
        }

        file.set_len(max_index_bytes)?;

        // SAFETY: the mapping is backed by a file this process just opened
        // and owns for the lifetime of the Index. The file is not truncated
        // or resized while mapped (close drops the mapping before the final
        // truncate), and the data directory is assumed exclusive to this
        // process, as with any mmap-based storage engine.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        Ok(Index {
            path,
            file,
            mmap,
            size,
        })
    }

    /// Append one entry at the current logical size.
    ///
    /// Fails with `IndexFull` when the mapped capacity cannot hold one more
    /// entry; callers treat that as "segment full", not as a fatal error.
    pub fn write(&mut self, rel_offset: u32, pos: u64) -> Result<(), LogError> {
        if (self.mmap.len() as u64) < self.size + ENT_WIDTH {
            return Err(LogError::IndexFull);
        }

        let at = self.size as usize;
        Enc::write_u32(&mut self.mmap[at..at + OFF_WIDTH as usize], rel_offset);
        Enc::write_u64(
            &mut self.mmap[at + OFF_WIDTH as usize..at + ENT_WIDTH as usize],
            pos,
        );
        self.size += ENT_WIDTH;
        Ok(())
    }

    /// Read the entry at position `rel`, or the last entry when `rel` is
    /// `None`.
    ///
    /// Returns `(relative_offset, store_position)`. Fails with `EndOfIndex`
    /// when the index is empty or `rel` is past the logical size.
    pub fn read(&self, rel: Option<u32>) -> Result<(u32, u64), LogError> {
        if self.size == 0 {
            return Err(LogError::EndOfIndex);
        }

        let slot = match rel {
            Some(r) => r as u64,
            None => self.size / ENT_WIDTH - 1,
        };

        let at = slot * ENT_WIDTH;
        if self.size < at + ENT_WIDTH {
            return Err(LogError::EndOfIndex);
        }

        let at = at as usize;
        let out = Enc::read_u32(&self.mmap[at..at + OFF_WIDTH as usize]);
        let pos = Enc::read_u64(&self.mmap[at + OFF_WIDTH as usize..at + ENT_WIDTH as usize]);
        Ok((out, pos))
    }

    /// Logical size in bytes (entries written, not allocated capacity).
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Sync the mapping and the file, truncate back down to the logical
    /// size, and close.
    ///
    /// The truncation undoes the pre-allocation so the next open can
    /// recover the entry count from the file length.
    pub fn close(self) -> Result<(), LogError> {
        self.mmap.flush()?;
        self.file.sync_all()?;

        // Drop the mapping before shrinking the file beneath it.
        drop(self.mmap);
        self.file.set_len(self.size)?;
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

use crate::config::Config;
use crate::error::LogError;
use crate::record::Record;
use crate::storage::index::{Index, ENT_WIDTH};
use crate::storage::store::Store;
use std::fs;
use std::path::Path;

/// A Segment pairs one store and one index under a shared base offset.
///
/// Responsibilities:
/// - Open/create the `<base_offset>.store` and `<base_offset>.index` files
/// - Stamp records with the next offset and keep store + index in step
/// - Translate absolute offsets to index-relative ones
/// - Report when either size limit makes the segment full
///
/// NOT responsible for:
/// - Choosing when to rotate (the log decides, via `is_maxed`)
/// - Routing reads across segments
///
/// ## Offsets:
/// `base_offset` is the absolute offset of the first record this segment
/// can hold; `next_offset` is the absolute offset the next append will be
/// assigned. The index stores offsets relative to the base, so
/// `next_offset == base_offset + index.size() / ENT_WIDTH` at all times.
pub struct Segment {
    store: Store,
    index: Index,
    base_offset: u64,
    next_offset: u64,
    config: Config,
}

impl Segment {
    /// Open or create the segment for `base_offset` inside `dir`.
    ///
    /// Recovery: if the index already holds entries, the next offset picks
    /// up after the last one; an empty index means a fresh segment starting
    /// at the base offset.
    pub fn open(dir: impl AsRef<Path>, base_offset: u64, config: Config) -> Result<Self, LogError> {
        let dir = dir.as_ref();

        let store = Store::open(dir.join(format!("{}.store", base_offset)))?;
        let index = Index::open(
            dir.join(format!("{}.index", base_offset)),
            config.segment.max_index_bytes,
        )?;

        let next_offset = match index.read(None) {
            Ok((last_rel, _)) => base_offset + last_rel as u64 + 1,
            Err(LogError::EndOfIndex) => base_offset,
            Err(e) => return Err(e),
        };

        Ok(Segment {
            store,
            index,
            base_offset,
            next_offset,
            config,
        })
    }

    /// Append a record, stamping it with the segment's next offset.
    ///
    /// The record bytes go to the store first, then the `(relative offset,
    /// position)` entry to the index. A failure at either step aborts the
    /// append and propagates; there is no rollback, so a store-ok/index-err
    /// split leaves the record's bytes on disk but unreachable by offset.
    pub fn append(&mut self, record: &mut Record) -> Result<u64, LogError> {
        let cur = self.next_offset;
        record.offset = cur;

        let bytes = record.encode()?;
        let (_, pos) = self.store.append(&bytes)?;
        self.index.write((cur - self.base_offset) as u32, pos)?;

        self.next_offset += 1;
        Ok(cur)
    }

    /// Read the record at an absolute offset.
    ///
    /// Offsets below the base have no entry here; like any position past
    /// the logical size, they surface as `EndOfIndex`.
    pub fn read(&self, offset: u64) -> Result<Record, LogError> {
        let rel = offset
            .checked_sub(self.base_offset)
            .ok_or(LogError::EndOfIndex)?;
        let (_, pos) = self.index.read(Some(rel as u32))?;
        let bytes = self.store.read(pos)?;
        Record::decode(&bytes)
    }

    /// Whether the segment has reached either of its size limits.
    ///
    /// Store entries are variable-size, so the store is full once its
    /// current size reaches the limit. Index entries are fixed-width, so
    /// the next write's cost is known in advance and checked ahead of time.
    pub fn is_maxed(&self) -> Result<bool, LogError> {
        Ok(self.store.size()? >= self.config.segment.max_store_bytes
            || self.index.size() + ENT_WIDTH >= self.config.segment.max_index_bytes)
    }

    /// Absolute offset of the first record this segment can hold.
    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    /// Absolute offset the next append will be assigned.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// A bounded sequential reader over the segment's raw store bytes.
    pub fn store_reader(&self) -> Result<crate::storage::store::StoreReader, LogError> {
        self.store.reader()
    }

    /// Close the index (sync + truncate to logical size) and the store.
    pub fn close(self) -> Result<(), LogError> {
        self.index.close()?;
        self.store.close()?;
        Ok(())
    }

    /// Close the segment and delete both files from disk.
    pub fn remove(self) -> Result<(), LogError> {
        let index_path = self.index.path().to_path_buf();
        let store_path = self.store.path().to_path_buf();

        self.close()?;
        fs::remove_file(index_path)?;
        fs::remove_file(store_path)?;
        Ok(())
    }
}

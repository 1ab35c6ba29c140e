use crate::config::Config;
use crate::error::LogError;
use crate::record::Record;
use crate::storage::segment::Segment;
use crate::storage::store::StoreReader;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A Log presents one contiguous offset space over a rotating sequence of
/// segments.
///
/// Responsibilities:
/// - Recover segments from the directory on startup
/// - Route appends to the active segment, rolling a new one when it fills
/// - Route reads to the segment owning the offset
/// - Retention truncation, full-log streaming, lifecycle (close/remove/reset)
///
/// ## Segment list:
/// Segments are kept sorted by ascending base offset and partition the
/// offset space into contiguous, non-overlapping ranges
/// `[base_offset, next_offset)`. The active segment is always the last
/// element and the only one accepting appends.
///
/// ## Locking:
/// One exclusive lock serializes every operation that touches the segment
/// list. Coarse on purpose: rotation swaps the active segment while
/// replacing the list readers scan, and a single lock removes that whole
/// class of races at the cost of read parallelism.
pub struct Log {
    dir: PathBuf,
    config: Config,
    segments: Mutex<Vec<Segment>>,
}

impl Log {
    /// Open a log over `dir`, creating the directory if needed.
    ///
    /// Zero-valued size limits are normalized to the defaults. Existing
    /// segment files are recovered in ascending base-offset order; an empty
    /// directory gets one fresh segment at the configured initial offset.
    pub fn open(dir: impl AsRef<Path>, mut config: Config) -> Result<Self, LogError> {
        if config.segment.max_store_bytes == 0 {
            config.segment.max_store_bytes = Config::default().segment.max_store_bytes;
        }
        if config.segment.max_index_bytes == 0 {
            config.segment.max_index_bytes = Config::default().segment.max_index_bytes;
        }

        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let segments = Self::load_segments(&dir, config)?;
        debug!(
            dir = %dir.display(),
            segments = segments.len(),
            "opened log"
        );

        Ok(Log {
            dir,
            config,
            segments: Mutex::new(segments),
        })
    }

    /// Discover base offsets from the numeric file stems in `dir` and open
    /// one segment per unique base, ascending.
    ///
    /// Each base offset registers twice (store and index file share the
    /// stem), so the sorted list is deduplicated. Files whose stem is not a
    /// base-10 integer are ignored.
    fn load_segments(dir: &Path, config: Config) -> Result<Vec<Segment>, LogError> {
        let mut base_offsets = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let stem = path.file_stem().and_then(|s| s.to_str());
            if let Some(off) = stem.and_then(|s| s.parse::<u64>().ok()) {
                base_offsets.push(off);
            }
        }
        base_offsets.sort_unstable();
        base_offsets.dedup();

        let mut segments = Vec::with_capacity(base_offsets.len().max(1));
        for off in base_offsets {
            segments.push(Segment::open(dir, off, config)?);
        }
        if segments.is_empty() {
            segments.push(Segment::open(dir, config.segment.initial_offset, config)?);
        }
        Ok(segments)
    }

    /// Append a record and return its assigned offset.
    ///
    /// When the active segment is full, a new segment starting at its next
    /// offset is rolled first and becomes the active one.
    pub fn append(&self, record: &mut Record) -> Result<u64, LogError> {
        let mut segments = self.lock()?;

        let active = segments.len() - 1;
        if segments[active].is_maxed()? {
            let off = segments[active].next_offset();
            debug!(base_offset = off, "rolling to new segment");
            segments.push(Segment::open(&self.dir, off, self.config)?);
        }

        let active = segments.len() - 1;
        segments[active].append(record)
    }

    /// Read the record stored at `offset`.
    ///
    /// Scans the segment list for the one covering the offset; anything not
    /// covered — including the offset right past the head that a tailing
    /// consumer polls for — fails with the typed out-of-range condition.
    pub fn read(&self, offset: u64) -> Result<Record, LogError> {
        let segments = self.lock()?;

        segments
            .iter()
            .find(|s| s.base_offset() <= offset && offset < s.next_offset())
            .ok_or(LogError::OffsetOutOfRange(offset))?
            .read(offset)
    }

    /// The lowest offset held by the log.
    pub fn lowest_offset(&self) -> Result<u64, LogError> {
        let segments = self.lock()?;
        Ok(segments[0].base_offset())
    }

    /// The highest offset written so far, or 0 when nothing has been
    /// written yet.
    pub fn highest_offset(&self) -> Result<u64, LogError> {
        let segments = self.lock()?;
        let next = segments[segments.len() - 1].next_offset();
        Ok(next.saturating_sub(1))
    }

    /// Remove every segment whose records all sit at or below `lowest`.
    ///
    /// Used for retention: after a caller has snapshotted the log up to
    /// `lowest`, the fully-covered segments can be deleted. There is no
    /// rollback — a failure partway leaves the remaining files on disk.
    pub fn truncate(&self, lowest: u64) -> Result<(), LogError> {
        let mut segments = self.lock()?;

        let mut kept = Vec::with_capacity(segments.len());
        let mut removed = 0usize;
        for segment in segments.drain(..) {
            if segment.next_offset() <= lowest + 1 {
                segment.remove()?;
                removed += 1;
            } else {
                kept.push(segment);
            }
        }
        *segments = kept;

        debug!(lowest, removed, "truncated log");
        Ok(())
    }

    /// A sequential reader over the whole log's raw `[length][payload]`
    /// frames, segment stores concatenated in base-offset order.
    ///
    /// The stream is derived from the segment list at call time and bounded
    /// by each store's current size, so it is finite and a fresh call picks
    /// up records appended since. It is not safe against a concurrent
    /// truncation deleting store files mid-stream.
    pub fn reader(&self) -> Result<LogReader, LogError> {
        let segments = self.lock()?;

        let mut readers = Vec::with_capacity(segments.len());
        for segment in segments.iter() {
            readers.push(segment.store_reader()?);
        }
        Ok(LogReader {
            readers,
            current: 0,
        })
    }

    /// Close every segment, truncating the indexes to their logical sizes.
    pub fn close(self) -> Result<(), LogError> {
        let segments = self
            .segments
            .into_inner()
            .map_err(|_| LogError::LockPoisoned)?;
        for segment in segments {
            segment.close()?;
        }
        Ok(())
    }

    /// Close the log and delete its directory.
    pub fn remove(self) -> Result<(), LogError> {
        let dir = self.dir.clone();
        self.close()?;
        fs::remove_dir_all(&dir)?;
        Ok(())
    }

    /// Delete all data and re-initialize, yielding an empty log at the
    /// configured initial offset.
    pub fn reset(&self) -> Result<(), LogError> {
        let mut segments = self.lock()?;

        for segment in segments.drain(..) {
            segment.remove()?;
        }
        fs::remove_dir_all(&self.dir)?;
        fs::create_dir_all(&self.dir)?;

        *segments = Self::load_segments(&self.dir, self.config)?;
        debug!(dir = %self.dir.display(), "reset log");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Segment>>, LogError> {
        self.segments.lock().map_err(|_| LogError::LockPoisoned)
    }
}

/// Sequential `io::Read` over every segment store, in base-offset order.
///
/// Yields the raw frames the stores hold, not decoded records; used for
/// whole-log transfer such as snapshot export.
pub struct LogReader {
    readers: Vec<StoreReader>,
    current: usize,
}

impl Read for LogReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.current < self.readers.len() {
            let n = self.readers[self.current].read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            self.current += 1;
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegmentConfig;
    use crate::storage::store::LEN_WIDTH;

    fn temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("failed to create temp dir")
    }

    fn small_config() -> Config {
        Config {
            segment: SegmentConfig {
                // Fits one encoded ~11-byte-value record per segment.
                max_store_bytes: 32,
                max_index_bytes: 1024,
                initial_offset: 0,
            },
        }
    }

    #[test]
    fn test_append_read_roundtrip() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), Config::default()).expect("failed to open log");

        let mut record = Record::new(b"hello world".to_vec());
        let off = log.append(&mut record).expect("failed to append");
        assert_eq!(off, 0);

        let got = log.read(off).expect("failed to read");
        assert_eq!(got.value, b"hello world");
        assert_eq!(got.offset, off);
    }

    #[test]
    fn test_offsets_are_gapless_across_rotation() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), small_config()).expect("failed to open log");

        for i in 0..10u64 {
            let off = log
                .append(&mut Record::new(b"hello world".to_vec()))
                .expect("failed to append");
            assert_eq!(off, i);
        }

        // The small store limit forces multiple segments.
        assert!(log.lock().unwrap().len() > 1);
        for i in 0..10u64 {
            assert_eq!(log.read(i).expect("failed to read").offset, i);
        }
    }

    #[test]
    fn test_read_out_of_range() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), Config::default()).expect("failed to open log");

        // Empty log: nothing is readable, including offset 0.
        assert!(matches!(log.read(0), Err(LogError::OffsetOutOfRange(0))));

        log.append(&mut Record::new(b"only".to_vec()))
            .expect("failed to append");
        assert!(log.read(0).is_ok());
        assert!(matches!(log.read(1), Err(LogError::OffsetOutOfRange(1))));
    }

    #[test]
    fn test_lowest_highest_offsets() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), Config::default()).expect("failed to open log");

        // Empty-log convention: both report 0.
        assert_eq!(log.lowest_offset().unwrap(), 0);
        assert_eq!(log.highest_offset().unwrap(), 0);

        for _ in 0..3 {
            log.append(&mut Record::new(b"x".to_vec()))
                .expect("failed to append");
        }
        assert_eq!(log.lowest_offset().unwrap(), 0);
        assert_eq!(log.highest_offset().unwrap(), 2);
    }

    #[test]
    fn test_initial_offset() {
        let dir = temp_dir();
        let mut config = Config::default();
        config.segment.initial_offset = 100;

        let log = Log::open(dir.path(), config).expect("failed to open log");
        let off = log
            .append(&mut Record::new(b"first".to_vec()))
            .expect("failed to append");

        assert_eq!(off, 100);
        assert_eq!(log.lowest_offset().unwrap(), 100);
        assert_eq!(log.highest_offset().unwrap(), 100);
    }

    #[test]
    fn test_reopen_recovers_existing_segments() {
        let dir = temp_dir();

        {
            let log = Log::open(dir.path(), small_config()).expect("failed to open log");
            for _ in 0..6 {
                log.append(&mut Record::new(b"hello world".to_vec()))
                    .expect("failed to append");
            }
            log.close().expect("failed to close");
        }

        let log = Log::open(dir.path(), small_config()).expect("failed to reopen log");
        assert_eq!(log.lowest_offset().unwrap(), 0);
        assert_eq!(log.highest_offset().unwrap(), 5);

        for i in 0..6u64 {
            let got = log.read(i).expect("failed to read");
            assert_eq!(got.value, b"hello world");
            assert_eq!(got.offset, i);
        }

        // Appends continue the recovered sequence.
        let off = log
            .append(&mut Record::new(b"hello world".to_vec()))
            .expect("failed to append");
        assert_eq!(off, 6);
    }

    #[test]
    fn test_recovery_ignores_foreign_files() {
        let dir = temp_dir();
        std::fs::write(dir.path().join("notes.txt"), b"not a segment").unwrap();

        let log = Log::open(dir.path(), Config::default()).expect("failed to open log");
        assert_eq!(log.lowest_offset().unwrap(), 0);
    }

    #[test]
    fn test_truncate_removes_covered_segments() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), small_config()).expect("failed to open log");

        for _ in 0..6 {
            log.append(&mut Record::new(b"hello world".to_vec()))
                .expect("failed to append");
        }

        log.truncate(2).expect("failed to truncate");

        // Everything at or below the boundary is gone, the rest survives.
        assert!(matches!(log.read(0), Err(LogError::OffsetOutOfRange(0))));
        assert!(matches!(log.read(2), Err(LogError::OffsetOutOfRange(2))));
        assert!(log.read(3).is_ok());
        assert_eq!(log.lowest_offset().unwrap(), 3);
        assert_eq!(log.highest_offset().unwrap(), 5);
    }

    #[test]
    fn test_reader_streams_whole_log() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), small_config()).expect("failed to open log");

        let mut records = Vec::new();
        for i in 0..4u8 {
            let mut record = Record::new(vec![b'a' + i; 5]);
            log.append(&mut record).expect("failed to append");
            records.push(record);
        }

        let mut raw = Vec::new();
        log.reader()
            .expect("failed to create reader")
            .read_to_end(&mut raw)
            .expect("failed to stream");

        // Walk the concatenated frames and decode each payload.
        let mut at = 0usize;
        for expected in &records {
            let len =
                u64::from_be_bytes(raw[at..at + LEN_WIDTH as usize].try_into().unwrap()) as usize;
            at += LEN_WIDTH as usize;
            let got = Record::decode(&raw[at..at + len]).expect("failed to decode frame");
            at += len;
            assert_eq!(&got, expected);
        }
        assert_eq!(at, raw.len());
    }

    #[test]
    fn test_reset_yields_empty_log() {
        let dir = temp_dir();
        let log = Log::open(dir.path(), small_config()).expect("failed to open log");

        for _ in 0..6 {
            log.append(&mut Record::new(b"hello world".to_vec()))
                .expect("failed to append");
        }

        log.reset().expect("failed to reset");

        assert_eq!(log.lowest_offset().unwrap(), 0);
        assert_eq!(log.highest_offset().unwrap(), 0);
        assert!(matches!(log.read(0), Err(LogError::OffsetOutOfRange(0))));

        // The reset log accepts appends from the initial offset again.
        let off = log
            .append(&mut Record::new(b"fresh".to_vec()))
            .expect("failed to append");
        assert_eq!(off, 0);
    }

    #[test]
    fn test_remove_deletes_directory() {
        let dir = temp_dir();
        let log_dir = dir.path().join("log");

        let log = Log::open(&log_dir, Config::default()).expect("failed to open log");
        log.append(&mut Record::new(b"doomed".to_vec()))
            .expect("failed to append");

        log.remove().expect("failed to remove");
        assert!(!log_dir.exists());
    }
}

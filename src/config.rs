/// Engine configuration.
///
/// Zero-valued limits are normalized to the defaults when a log opens, so a
/// caller can set only the knobs it cares about.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub segment: SegmentConfig,
}

/// Per-segment size limits and the starting offset for a brand-new log.
#[derive(Debug, Clone, Copy)]
pub struct SegmentConfig {
    /// Store size ceiling in bytes. Once the store reaches this, the
    /// segment stops accepting appends.
    pub max_store_bytes: u64,

    /// Index size ceiling in bytes. The index file is pre-allocated to this
    /// size while the segment is open.
    pub max_index_bytes: u64,

    /// Offset assigned to the first record of a brand-new log.
    pub initial_offset: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment: SegmentConfig {
                max_store_bytes: 1024,
                max_index_bytes: 1024,
                initial_offset: 0,
            },
        }
    }
}

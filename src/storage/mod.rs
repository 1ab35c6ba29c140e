//! Storage layer for Seglog
//!
//! This module provides the segmented append-only log abstraction.
//!
//! Components, leaves first:
//! - Store: append-only byte container with length-prefix framing
//! - Index: offset → byte position mapping over a memory-mapped file
//! - Segment: one Store + one Index sharing a base offset
//! - Log: ordered segments with rotation, recovery, retention, streaming

pub mod index;
pub mod log;
pub mod segment;
pub mod store;

/// Byte order shared by the store framing and the index entries. Both sides
/// of the on-disk format must agree on this for the files to interoperate.
pub(crate) type Enc = byteorder::BigEndian;

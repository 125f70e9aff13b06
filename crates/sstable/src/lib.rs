//! # SSTable: Sorted String Table
//!
//! Immutable, on-disk storage files for the StrataKV storage engine.
//!
//! When the in-memory [`memtable`](../memtable/index.html) exceeds its size
//! threshold the engine flushes it to disk as an SSTable. SSTables are
//! **write-once, read-many**: once created they are never modified, only
//! replaced and unlinked during compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ HEADER                                        │
//! │                                               │
//! │ min_key_len (varint) | min_key                │
//! │ max_key_len (varint) | max_key                │
//! │ record_count (varint)                         │
//! ├───────────────────────────────────────────────┤
//! │ RECORDS (strictly ascending by key)           │
//! │                                               │
//! │ key_len (varint) | key | val_len (varint) | val│
//! │                                               │
//! │ ... repeated record_count times ...           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All lengths are LEB128 varints. The header alone is enough to decide
//! whether a point lookup can hit this table at all, which is why it leads
//! the file and why [`SSTable::open`] reads nothing else.

mod format;
mod reader;
mod writer;

use std::path::PathBuf;

use encoding::{Key, Value};
use std::io;
use thiserror::Error;

pub use format::Header;

#[derive(Debug, Error)]
pub enum SSTableError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt sstable: {0}")]
    Corruption(String),
}

/// Handle to one immutable sorted run on disk.
///
/// The handle caches the header fields (`min_key`, `max_key`, record count)
/// so the key-range filter on the read path never touches the file. Created
/// either by [`SSTable::create`] (flush, compaction) or [`SSTable::open`]
/// (engine startup).
pub struct SSTable {
    pub(crate) path: PathBuf,
    pub(crate) seq: u64,
    pub(crate) min_key: Key,
    pub(crate) max_key: Key,
    pub(crate) count: u64,
}

impl SSTable {
    /// Sequence number parsed from the `<seq>.sst` filename.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Smallest key in the table.
    pub fn min_key(&self) -> &[u8] {
        &self.min_key
    }

    /// Largest key in the table.
    pub fn max_key(&self) -> &[u8] {
        &self.max_key
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// Returns `true` if the table holds zero records.
    ///
    /// Never true for tables built by this crate; [`SSTable::create`]
    /// rejects an empty record set.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` when `key` falls inside `[min_key, max_key]`.
    pub fn covers(&self, key: &[u8]) -> bool {
        key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("seq", &self.seq)
            .field("count", &self.count)
            .finish()
    }
}

/// A decoded record pair.
pub type Record = (Key, Value);

//! # StrataKV: an embedded single-level LSM key-value store
//!
//! The central orchestrator tying the [`memtable`], [`wal`], and [`sstable`]
//! crates into a durable, ordered key-value store under one directory.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → WAL append+fsync → Memtable insert │
//! │              |                                │
//! │              |  (entry count > threshold?)    │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → new SSTable               │
//! │              |                                │
//! │              |  (table count > interval?)     │
//! │              |            yes                 │
//! │              v                                │
//! │        compaction.rs → single merged SSTable  │
//! │                                               │
//! │ read.rs → Memtable → SSTables newest-first    │
//! │            (first match wins, tombstones      │
//! │             read as "not found")              │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module          | Purpose                                             |
//! |-----------------|-----------------------------------------------------|
//! | `lib.rs`        | `Engine` struct, `open`/`close`, accessors, `Drop`  |
//! | [`config`]      | `Config` and its validation                         |
//! | [`error`]       | unified public `Error`                              |
//! | `write.rs`      | `put`, `delete`, `flush`                            |
//! | `read.rs`       | `get` and the scan family                           |
//! | `compaction.rs` | full-merge compaction with tombstone collection     |
//! | [`txn`]         | atomic batched transactions                         |
//!
//! ## Crash safety
//!
//! Every write is appended and fsynced to the WAL **before** the memtable
//! update. SSTables are written via temp file + rename + directory fsync.
//! The WAL is truncated only after a flush has made its contents durable in
//! an SSTable. Recovery after a crash is caller-driven: open the engine,
//! read the pending operations back with [`Wal::recover`] through
//! [`Engine::wal`], and replay them.
//!
//! ## Concurrency
//!
//! All public methods take `&self`. Readers (gets, scans) share the
//! memtable and SSTable-list locks; writers, flush, and compaction take
//! them exclusively. Locks nest in the fixed order
//! memtable → sstables → wal.

pub mod config;
pub mod error;
pub mod txn;

mod compaction;
mod read;
mod write;

use std::fs::{self, File};
use std::io;
use std::sync::atomic::AtomicU64;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use memtable::Memtable;
use sstable::SSTable;

pub use config::Config;
pub use encoding::{Key, Value};
pub use error::{Error, Result};
pub use read::ScanResult;
pub use txn::Transaction;
pub use wal::{Operation, Wal};

/// Name of the write-ahead log file inside the engine directory.
pub const WAL_FILE: &str = "wal.log";

/// The storage engine: one memtable, an ordered list of SSTables, one WAL.
///
/// The SSTable list is kept oldest-first; reads walk it from the back so the
/// newest table wins. See the crate docs for the full read/write paths.
pub struct Engine {
    memtable: RwLock<Memtable>,
    /// Oldest first; flush pushes to the back, compaction replaces the lot.
    sstables: RwLock<Vec<SSTable>>,
    wal: Mutex<Wal>,
    /// Next SSTable sequence number (filenames are `<seq>.sst`).
    next_seq: AtomicU64,
    config: Config,
}

impl Engine {
    /// Opens an engine over `config.directory`, creating the directory if it
    /// does not exist.
    ///
    /// Existing `*.sst` files are registered with their headers decoded (so
    /// every table knows its key range up front) and ordered by the sequence
    /// number in their filename. Stale `*.sst.tmp` leftovers from an
    /// interrupted flush are deleted. The WAL is opened or created but **not**
    /// replayed; see the crate docs on recovery.
    pub fn open(config: Config) -> Result<Engine> {
        config.validate()?;
        let dir = &config.directory;

        match fs::metadata(dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(Error::InvalidState(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_dir_with_perm(dir, config.directory_perm)?
            }
            Err(e) => return Err(Error::Io(e)),
        }

        let mut tables = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".sst.tmp") {
                warn!("removing stale temp file {}", path.display());
                fs::remove_file(&path)?;
                continue;
            }
            let Some(stem) = name.strip_suffix(".sst") else {
                continue;
            };
            let Ok(seq) = stem.parse::<u64>() else {
                continue;
            };
            tables.push(SSTable::open(&path, seq)?);
        }
        tables.sort_by_key(SSTable::seq);
        let next_seq = tables.last().map(|t| t.seq() + 1).unwrap_or(0);

        let wal = Wal::open(dir.join(WAL_FILE), config.wal_sync)?;
        info!("opened {} with {} sstables", dir.display(), tables.len());

        Ok(Engine {
            memtable: RwLock::new(Memtable::new()),
            sstables: RwLock::new(tables),
            wal: Mutex::new(wal),
            next_seq: AtomicU64::new(next_seq),
            config,
        })
    }

    /// Flushes any buffered writes to an SSTable and fsyncs the directory.
    ///
    /// The WAL is deliberately left in place so that
    /// [`Wal::recover`] still returns the operations of the finished
    /// session; it is truncated by the next threshold-triggered flush.
    pub fn close(&self) -> Result<()> {
        self.flush_with(false)?;
        File::open(&self.config.directory)?.sync_all()?;
        Ok(())
    }

    /// Accessor for the WAL, for recovery scenarios:
    /// `engine.wal().lock().recover()`.
    pub fn wal(&self) -> &Mutex<Wal> {
        &self.wal
    }

    /// The configuration this engine was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of on-disk SSTables currently registered.
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Number of entries buffered in the memtable, tombstones included.
    pub fn memtable_len(&self) -> usize {
        self.memtable.read().len()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("directory", &self.config.directory)
            .field("memtable_entries", &self.memtable.read().len())
            .field("sstable_count", &self.sstables.read().len())
            .field("memtable_flush_size", &self.config.memtable_flush_size)
            .field("compaction_interval", &self.config.compaction_interval)
            .finish()
    }
}

/// Best-effort flush on drop.
///
/// Errors are swallowed because `Drop` cannot propagate them; the data is
/// still safe in the WAL and can be replayed on the next startup.
impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.flush_with(false);
    }
}

#[cfg(unix)]
fn create_dir_with_perm(dir: &std::path::Path, perm: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().mode(perm).create(dir)
}

#[cfg(not(unix))]
fn create_dir_with_perm(dir: &std::path::Path, _perm: u32) -> io::Result<()> {
    fs::create_dir(dir)
}

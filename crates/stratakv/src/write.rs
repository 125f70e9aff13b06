//! Write path: `put`, `delete`, and the memtable flush.
//!
//! All mutations flow through this module. Each write lands in the WAL
//! (fsynced) before it touches the memtable, and both happen under the
//! memtable write lock so the two can never diverge mid-operation. When the
//! memtable's entry count exceeds the configured threshold it is persisted
//! to a new SSTable.

use std::sync::atomic::Ordering;

use tracing::info;

use sstable::{Record, SSTable};
use wal::Operation;

use crate::error::{Error, Result};
use crate::Engine;

impl Engine {
    /// Inserts a key-value pair.
    ///
    /// The empty value is reserved as the tombstone marker and is rejected;
    /// use [`delete`](Engine::delete) to remove a key. The operation is
    /// durable in the WAL once this returns.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if value.is_empty() {
            return Err(Error::InvalidArgument(
                "value cannot be empty; use delete to remove a key".into(),
            ));
        }

        let should_flush;
        {
            let mut mem = self.memtable.write();
            self.wal.lock().append(&Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            })?;
            mem.put(key.to_vec(), value.to_vec());
            should_flush = mem.len() > self.config.memtable_flush_size;
        }
        if should_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Deletes a key by writing a tombstone.
    ///
    /// The tombstone shadows any older value in SSTables until compaction
    /// drops the key for good. Deleting a key that was never written is
    /// valid and simply records the tombstone.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let should_flush;
        {
            let mut mem = self.memtable.write();
            self.wal
                .lock()
                .append(&Operation::Delete { key: key.to_vec() })?;
            mem.delete(key.to_vec());
            should_flush = mem.len() > self.config.memtable_flush_size;
        }
        if should_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// Seals the current memtable into a new SSTable.
    ///
    /// A no-op when the memtable is empty. On success the new table is
    /// durable, the WAL has been truncated, and the memtable is empty; if
    /// the table count now exceeds the compaction interval, compaction runs
    /// before returning. On failure the memtable and WAL are left untouched
    /// so nothing is lost.
    pub fn flush(&self) -> Result<()> {
        self.flush_with(true)
    }

    /// Flush guts, shared with [`close`](Engine::close) which skips the WAL
    /// truncation to keep the log available for caller-driven recovery.
    pub(crate) fn flush_with(&self, truncate_wal: bool) -> Result<()> {
        let mut mem = self.memtable.write();
        if mem.is_empty() {
            return Ok(());
        }

        let records: Vec<Record> = mem.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let seq = self.alloc_seq()?;
        let table = SSTable::create(&self.config.directory, seq, &records)?;
        info!("flushed {} entries to {}.sst", records.len(), seq);

        let mut tables = self.sstables.write();
        tables.push(table);
        if truncate_wal {
            self.wal.lock().truncate()?;
        }
        mem.clear();

        if tables.len() > self.config.compaction_interval {
            self.compact_tables(&mut tables)?;
        }
        Ok(())
    }

    /// Hands out the next SSTable sequence number.
    pub(crate) fn alloc_seq(&self) -> Result<u64> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        if seq == u64::MAX {
            return Err(Error::Internal("sstable sequence numbers exhausted".into()));
        }
        Ok(seq)
    }
}

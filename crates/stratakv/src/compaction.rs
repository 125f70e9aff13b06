//! Compaction: merge every SSTable into one, dropping tombstoned keys.

use std::collections::BTreeMap;

use tracing::info;

use encoding::{Key, Value};
use sstable::{Record, SSTable};

use crate::error::Result;
use crate::Engine;

impl Engine {
    /// Merges all SSTables into a single new table.
    ///
    /// For every key the newest table's record wins; keys whose winning
    /// record is a tombstone are dropped for good. The replacement is
    /// written with the atomic create protocol (so it is durable before any
    /// old file is touched), then the old tables are unlinked. A failure
    /// while merging or writing leaves the original set fully intact.
    ///
    /// Holds the SSTable-list lock exclusively for the duration: readers see
    /// either the old set or the new one, never a mix.
    pub fn compact(&self) -> Result<()> {
        let mut tables = self.sstables.write();
        self.compact_tables(&mut tables)
    }

    /// Compaction guts, shared with the auto-compaction check in
    /// [`flush`](Engine::flush) which already holds the list lock.
    pub(crate) fn compact_tables(&self, tables: &mut Vec<SSTable>) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }

        let mut merged: BTreeMap<Key, Value> = BTreeMap::new();
        for table in tables.iter().rev() {
            for (key, value) in table.scan()? {
                merged.entry(key).or_insert(value);
            }
        }
        merged.retain(|_, value| !value.is_empty());

        // Everything tombstoned leaves nothing to write; the old tables are
        // still retired below.
        let replacement = if merged.is_empty() {
            None
        } else {
            let records: Vec<Record> = merged.into_iter().collect();
            let seq = self.alloc_seq()?;
            Some(SSTable::create(&self.config.directory, seq, &records)?)
        };

        let old = std::mem::replace(tables, replacement.into_iter().collect());
        let retired = old.len();
        for table in old {
            table.remove()?;
        }
        info!("compacted {} sstables into {}", retired, tables.len());
        Ok(())
    }
}

//! Read path: point lookups and the scan family.
//!
//! Every scan runs the same merge: seed an ordered map from the matching
//! memtable entries, then visit SSTables newest to oldest, keeping a record
//! only when no higher-priority source already supplied its key. Tombstones
//! survive the merge (they must shadow older values) and are dropped at the
//! end. Both locks are held in shared mode for the whole merge, so a scan
//! sees one consistent snapshot.

use std::collections::BTreeMap;

use encoding::{Key, Value};
use memtable::Memtable;

use crate::error::{Error, Result};
use crate::Engine;

/// Scan output: ascending keys with their values, index-aligned.
pub type ScanResult = (Vec<Key>, Vec<Value>);

impl Engine {
    /// Returns the live value for `key`.
    ///
    /// The memtable answers first; otherwise SSTables are consulted newest
    /// to oldest, skipping tables whose key range cannot contain `key`.
    /// A tombstone anywhere resolves to [`Error::NotFound`].
    pub fn get(&self, key: &[u8]) -> Result<Value> {
        let mem = self.memtable.read();
        let tables = self.sstables.read();

        if let Some(value) = mem.get(key) {
            return live(value.to_vec());
        }
        for table in tables.iter().rev() {
            if let Some(value) = table.lookup(key)? {
                return live(value);
            }
        }
        Err(Error::NotFound)
    }

    /// Keys with `lo <= key <= hi`, ascending.
    pub fn range(&self, lo: &[u8], hi: &[u8]) -> Result<ScanResult> {
        check_bounds(lo, hi)?;
        self.scan_merged(|mem| owned(mem.range(lo, hi)), |k| lo <= k && k <= hi)
    }

    /// Keys outside `[lo, hi]`, the complement of [`range`](Engine::range).
    pub fn n_range(&self, lo: &[u8], hi: &[u8]) -> Result<ScanResult> {
        check_bounds(lo, hi)?;
        self.scan_merged(
            |mem| {
                let mut entries = owned(mem.less_than(lo));
                entries.extend(owned(mem.greater_than(hi)));
                entries
            },
            |k| k < lo || k > hi,
        )
    }

    /// Keys strictly greater than `key`, ascending.
    pub fn greater_than(&self, key: &[u8]) -> Result<ScanResult> {
        self.scan_merged(|mem| owned(mem.greater_than(key)), |k| k > key)
    }

    /// Keys greater than or equal to `key`, ascending.
    pub fn greater_than_equal(&self, key: &[u8]) -> Result<ScanResult> {
        self.scan_merged(|mem| owned(mem.greater_than_equal(key)), |k| k >= key)
    }

    /// Keys strictly less than `key`, ascending.
    pub fn less_than(&self, key: &[u8]) -> Result<ScanResult> {
        self.scan_merged(|mem| owned(mem.less_than(key)), |k| k < key)
    }

    /// Keys less than or equal to `key`, ascending.
    pub fn less_than_equal(&self, key: &[u8]) -> Result<ScanResult> {
        self.scan_merged(|mem| owned(mem.less_than_equal(key)), |k| k <= key)
    }

    /// Every key except `key`, ascending.
    pub fn n_get(&self, key: &[u8]) -> Result<ScanResult> {
        self.scan_merged(|mem| owned(mem.not_equal(key)), |k| k != key)
    }

    /// The merge behind the whole scan family.
    ///
    /// `select` picks the matching entries out of the memtable (using its
    /// typed iterators); `pred` is the same predicate on raw keys, applied
    /// to SSTable records. Memtable entries win over tables, newer tables
    /// over older ones.
    fn scan_merged<F, P>(&self, select: F, pred: P) -> Result<ScanResult>
    where
        F: FnOnce(&Memtable) -> Vec<(Key, Value)>,
        P: Fn(&[u8]) -> bool,
    {
        let mem = self.memtable.read();
        let tables = self.sstables.read();

        let mut merged: BTreeMap<Key, Value> = select(&mem).into_iter().collect();
        for table in tables.iter().rev() {
            for (key, value) in table.scan()? {
                if !pred(key.as_slice()) {
                    continue;
                }
                merged.entry(key).or_insert(value);
            }
        }

        let mut keys = Vec::with_capacity(merged.len());
        let mut values = Vec::with_capacity(merged.len());
        for (key, value) in merged {
            if value.is_empty() {
                continue; // tombstone
            }
            keys.push(key);
            values.push(value);
        }
        Ok((keys, values))
    }
}

fn live(value: Value) -> Result<Value> {
    if value.is_empty() {
        Err(Error::NotFound)
    } else {
        Ok(value)
    }
}

fn check_bounds(lo: &[u8], hi: &[u8]) -> Result<()> {
    if lo > hi {
        return Err(Error::InvalidArgument(
            "range start greater than range end".into(),
        ));
    }
    Ok(())
}

fn owned<'a>(entries: impl Iterator<Item = (&'a Key, &'a Value)>) -> Vec<(Key, Value)> {
    entries.map(|(k, v)| (k.clone(), v.clone())).collect()
}

//! SSTable read path: open, full scan, and streaming point lookup.

use std::cmp::Ordering;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use encoding::Value;

use crate::format::{read_record, Header};
use crate::{Record, SSTable, SSTableError};

impl SSTable {
    /// Opens an existing table file, reading only its header.
    ///
    /// The header populates the cached `min_key`/`max_key` so the read path
    /// can skip this table without touching the file again. `seq` is the
    /// sequence number the engine parsed from the filename.
    pub fn open<P: AsRef<Path>>(path: P, seq: u64) -> Result<SSTable, SSTableError> {
        let path = path.as_ref().to_path_buf();
        let mut r = BufReader::new(File::open(&path)?);
        let header = Header::read(&mut r)?;

        Ok(SSTable {
            path,
            seq,
            min_key: header.min_key,
            max_key: header.max_key,
            count: header.count,
        })
    }

    /// Decodes and returns all records in ascending key order.
    pub fn scan(&self) -> Result<Vec<Record>, SSTableError> {
        let mut r = BufReader::new(File::open(&self.path)?);
        Header::read(&mut r)?;

        let mut records = Vec::with_capacity(self.count as usize);
        for _ in 0..self.count {
            records.push(read_record(&mut r)?);
        }
        Ok(records)
    }

    /// Point lookup for a single key.
    ///
    /// Returns `Ok(None)` without any I/O when `key` is outside the cached
    /// `[min_key, max_key]` range. Otherwise streams records in order and
    /// stops as soon as the stored keys pass the target; records are
    /// ascending, so seeing a greater key proves absence.
    ///
    /// A hit may be a tombstone (empty value); the engine interprets that.
    pub fn lookup(&self, key: &[u8]) -> Result<Option<Value>, SSTableError> {
        if !self.covers(key) {
            return Ok(None);
        }

        let mut r = BufReader::new(File::open(&self.path)?);
        Header::read(&mut r)?;

        for _ in 0..self.count {
            let (k, v) = read_record(&mut r)?;
            match k.as_slice().cmp(key) {
                Ordering::Less => continue,
                Ordering::Equal => return Ok(Some(v)),
                Ordering::Greater => return Ok(None),
            }
        }
        Ok(None)
    }
}

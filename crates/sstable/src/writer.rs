//! Atomic SSTable creation.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::format::{write_record, Header};
use crate::{Record, SSTable, SSTableError};

impl SSTable {
    /// Writes `records` as the new table `<seq>.sst` inside `dir` and
    /// returns its handle.
    ///
    /// `records` must be non-empty and strictly ascending by key; the
    /// engine flushes from an ordered memtable, so both hold by
    /// construction.
    ///
    /// # Crash safety
    ///
    /// Data goes to `<seq>.sst.tmp` first, which is fsynced and then
    /// atomically renamed into place, followed by an fsync of the directory.
    /// A crash at any point leaves either no visible table or a complete
    /// one; a leftover `.sst.tmp` is swept by the engine on the next open.
    pub fn create(dir: &Path, seq: u64, records: &[Record]) -> Result<SSTable, SSTableError> {
        if records.is_empty() {
            return Err(SSTableError::Corruption(
                "refusing to write an sstable with zero records".into(),
            ));
        }

        let path = dir.join(format!("{seq}.sst"));
        let tmp_path = dir.join(format!("{seq}.sst.tmp"));

        let header = Header {
            min_key: records[0].0.clone(),
            max_key: records[records.len() - 1].0.clone(),
            count: records.len() as u64,
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut w = BufWriter::new(file);

        header.write(&mut w)?;
        for (key, value) in records {
            write_record(&mut w, key, value)?;
        }

        w.flush()?;
        let file = w.into_inner().map_err(|e| SSTableError::Io(e.into_error()))?;
        file.sync_all()?;

        fs::rename(&tmp_path, &path)?;
        File::open(dir)?.sync_all()?;

        Ok(SSTable {
            path,
            seq,
            min_key: header.min_key,
            max_key: header.max_key,
            count: header.count,
        })
    }

    /// Unlinks the table file. Only compaction calls this, and only after
    /// the replacement table is durable.
    pub fn remove(self) -> Result<(), SSTableError> {
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

//! Atomic batched transactions.
//!
//! A [`Transaction`] is a staging buffer: nothing touches the engine until
//! [`Engine::commit_transaction`], which appends the whole batch to the WAL
//! with a single fsync and then applies it to the memtable under one write
//! lock. Readers therefore observe either all of a transaction's effects or
//! none of them. A transaction dropped without commit has no effect.

use wal::Operation;

use crate::error::{Error, Result};
use crate::Engine;

/// An ordered batch of staged `put`/`delete` operations.
#[derive(Debug, Default)]
pub struct Transaction {
    ops: Vec<Operation>,
}

impl Transaction {
    /// Stages an insert.
    pub fn add_put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        });
    }

    /// Stages a deletion.
    pub fn add_delete(&mut self, key: &[u8]) {
        self.ops.push(Operation::Delete { key: key.to_vec() });
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Engine {
    /// Starts an empty transaction.
    pub fn begin_transaction(&self) -> Transaction {
        Transaction::default()
    }

    /// Applies the staged operations atomically.
    ///
    /// The batch is durably appended to the WAL (one fsync) before anything
    /// becomes visible; if that append fails, no operation is applied and
    /// the transaction is gone. Operations are then applied in staging
    /// order, so a later staged operation on the same key overwrites an
    /// earlier one, which is the outcome serial execution would have produced.
    pub fn commit_transaction(&self, tx: Transaction) -> Result<()> {
        if tx.ops.is_empty() {
            return Ok(());
        }
        for op in &tx.ops {
            if let Operation::Put { value, .. } = op {
                if value.is_empty() {
                    return Err(Error::InvalidArgument(
                        "transaction stages an empty value; use add_delete".into(),
                    ));
                }
            }
        }

        let should_flush;
        {
            let mut mem = self.memtable.write();
            self.wal.lock().append_batch(&tx.ops)?;
            for op in tx.ops {
                match op {
                    Operation::Put { key, value } => mem.put(key, value),
                    Operation::Delete { key } => mem.delete(key),
                }
            }
            should_flush = mem.len() > self.config.memtable_flush_size;
        }
        if should_flush {
            self.flush()?;
        }
        Ok(())
    }
}

//! # Write-ahead log
//!
//! Append-only durability log for the StrataKV storage engine.
//!
//! Every committed operation is framed and fsynced here before it becomes
//! visible in the memtable, so a crash can lose at most operations whose
//! append never returned. Recovery reads the frames back and hands the
//! caller the operation list to replay.
//!
//! ## Frame layout
//!
//! ```text
//! frame: total_len (u32 LE, crc + body) | crc32 (u32 LE, over body) | body
//! body:  op_type (u8, 0 = put, 1 = delete)
//!        | key_len (varint) | key | value_len (varint) | value
//! ```
//!
//! Deletes carry `value_len = 0`. A torn trailing frame (one the process was
//! still writing when it died) is silently dropped by [`Wal::recover`]; a
//! frame that is structurally complete but fails its CRC or does not decode
//! is reported as [`WalError::Corruption`].

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use encoding::{read_bytes, write_bytes, write_uvarint, Key, Value, MAX_BYTES_LEN};
use thiserror::Error;

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;

/// Upper bound on a single frame's declared length: key + value + framing.
const MAX_FRAME_LEN: u32 = (2 * MAX_BYTES_LEN) as u32 + 64;

/// A single logged operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Put { key: Key, value: Value },
    Delete { key: Key },
}

impl Operation {
    /// The key this operation applies to.
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } => key,
            Operation::Delete { key } => key,
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Operation::Put { key, value } => {
                buf.write_u8(OP_PUT)?;
                write_bytes(buf, key)?;
                write_bytes(buf, value)?;
            }
            Operation::Delete { key } => {
                buf.write_u8(OP_DELETE)?;
                write_bytes(buf, key)?;
                write_uvarint(buf, 0)?;
            }
        }
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self, WalError> {
        let mut cur = Cursor::new(body);
        let op_type = cur
            .read_u8()
            .map_err(|_| WalError::Corruption("empty record body".into()))?;
        let key =
            read_bytes(&mut cur).map_err(|e| WalError::Corruption(format!("bad key: {e}")))?;
        let value =
            read_bytes(&mut cur).map_err(|e| WalError::Corruption(format!("bad value: {e}")))?;
        if cur.position() != body.len() as u64 {
            return Err(WalError::Corruption("trailing bytes in record body".into()));
        }
        match op_type {
            OP_PUT => Ok(Operation::Put { key, value }),
            OP_DELETE => Ok(Operation::Delete { key }),
            other => Err(WalError::Corruption(format!("unknown op type {other}"))),
        }
    }
}

#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt record: {0}")]
    Corruption(String),
}

/// The write-ahead log: an append-mode file plus its path.
///
/// Appends are written through [`Wal::append`] / [`Wal::append_batch`] and
/// fsynced before returning (unless `sync` was disabled at open, which is
/// only appropriate for bulk loads and benchmarks). [`Wal::recover`] reads
/// from a fresh handle so it can run at any time.
pub struct Wal {
    file: File,
    path: PathBuf,
    sync: bool,
}

impl Wal {
    /// Opens the log at `path`, creating it if absent.
    ///
    /// With `sync` set, every append fsyncs before returning; this is the
    /// durability contract the engine relies on.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = File::options().create(true).append(true).open(&path)?;
        Ok(Self { file, path, sync })
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durably appends one operation.
    pub fn append(&mut self, op: &Operation) -> Result<(), WalError> {
        let mut frame = Vec::new();
        Self::encode_frame(op, &mut frame)?;
        self.file.write_all(&frame)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Durably appends a batch of operations as a single fsynced unit.
    ///
    /// All frames are written with one `write_all` and one fsync, so after a
    /// crash either the whole batch replays or it reads as a torn tail and
    /// none of it does. This is the transaction commit primitive.
    pub fn append_batch(&mut self, ops: &[Operation]) -> Result<(), WalError> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut frames = Vec::new();
        for op in ops {
            Self::encode_frame(op, &mut frames)?;
        }
        self.file.write_all(&frames)?;
        self.file.flush()?;
        if self.sync {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Drops the log contents after a successful flush.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Reads back all well-framed operations in append order.
    ///
    /// Recovery stops silently at a torn trailing frame (unexpected EOF
    /// while reading it): a write the process never finished is treated as
    /// never committed. A structurally complete frame with a CRC mismatch or
    /// an undecodable body is reported as corruption.
    pub fn recover(&self) -> Result<Vec<Operation>, WalError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(WalError::Io(e)),
        };
        let mut rdr = BufReader::new(file);
        let mut ops = Vec::new();

        loop {
            let frame_len = match rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                // Clean end of log, or a torn length prefix.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(WalError::Io(e)),
            };
            if frame_len < 4 || frame_len > MAX_FRAME_LEN {
                return Err(WalError::Corruption(format!(
                    "implausible frame length {frame_len}"
                )));
            }

            let expected_crc = match rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(WalError::Io(e)),
            };
            let mut body = vec![0u8; (frame_len - 4) as usize];
            match rdr.read_exact(&mut body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&body);
            if hasher.finalize() != expected_crc {
                return Err(WalError::Corruption("crc mismatch".into()));
            }

            ops.push(Operation::decode(&body)?);
        }

        Ok(ops)
    }

    fn encode_frame(op: &Operation, out: &mut Vec<u8>) -> io::Result<()> {
        let mut body = Vec::new();
        op.encode_into(&mut body)?;

        let mut hasher = Crc32::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        out.write_u32::<LittleEndian>(body.len() as u32 + 4)?;
        out.write_u32::<LittleEndian>(crc)?;
        out.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::tempdir;

    fn put(key: &[u8], value: &[u8]) -> Operation {
        Operation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    fn del(key: &[u8]) -> Operation {
        Operation::Delete { key: key.to_vec() }
    }

    // -------------------- Roundtrip --------------------

    #[test]
    fn append_and_recover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut w = Wal::open(&path, true).unwrap();
            w.append(&put(b"k", b"v1")).unwrap();
            w.append(&put(b"k2", b"v2")).unwrap();
            w.append(&del(b"k")).unwrap();
        }

        let w = Wal::open(&path, true).unwrap();
        let ops = w.recover().unwrap();
        assert_eq!(ops, vec![put(b"k", b"v1"), put(b"k2", b"v2"), del(b"k")]);
    }

    #[test]
    fn append_batch_recovers_as_individual_ops() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, true).unwrap();
        w.append_batch(&[put(b"a", b"1"), put(b"b", b"2"), del(b"a")])
            .unwrap();

        let ops = w.recover().unwrap();
        assert_eq!(ops, vec![put(b"a", b"1"), put(b"b", b"2"), del(b"a")]);
    }

    #[test]
    fn append_batch_empty_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, true).unwrap();
        w.append_batch(&[]).unwrap();
        assert!(w.recover().unwrap().is_empty());
    }

    #[test]
    fn recover_empty_log() {
        let dir = tempdir().unwrap();
        let w = Wal::open(dir.path().join("wal.log"), true).unwrap();
        assert!(w.recover().unwrap().is_empty());
    }

    #[test]
    fn binary_keys_and_values_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let op = put(&[0x00, 0xff, 0x80], &[0xde, 0xad]);
        let mut w = Wal::open(&path, true).unwrap();
        w.append(&op).unwrap();
        assert_eq!(w.recover().unwrap(), vec![op]);
    }

    #[test]
    fn reopen_appends_after_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        {
            let mut w = Wal::open(&path, true).unwrap();
            w.append(&put(b"a", b"1")).unwrap();
        }
        {
            let mut w = Wal::open(&path, true).unwrap();
            w.append(&put(b"b", b"2")).unwrap();
        }

        let w = Wal::open(&path, true).unwrap();
        assert_eq!(w.recover().unwrap(), vec![put(b"a", b"1"), put(b"b", b"2")]);
    }

    // -------------------- Truncate --------------------

    #[test]
    fn truncate_drops_all_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, true).unwrap();
        w.append(&put(b"a", b"1")).unwrap();
        w.truncate().unwrap();
        assert!(w.recover().unwrap().is_empty());

        // The log is still usable afterwards.
        w.append(&put(b"b", b"2")).unwrap();
        assert_eq!(w.recover().unwrap(), vec![put(b"b", b"2")]);
    }

    // -------------------- Torn tails and corruption --------------------

    #[test]
    fn torn_trailing_frame_is_silently_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, true).unwrap();
        w.append(&put(b"a", b"1")).unwrap();
        w.append(&put(b"b", b"2")).unwrap();

        // Simulate a crash mid-append: a frame header promising more bytes
        // than were ever written.
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&100u32.to_le_bytes()).unwrap();
        f.write_all(&[0xaa, 0xbb, 0xcc]).unwrap();

        let ops = w.recover().unwrap();
        assert_eq!(ops, vec![put(b"a", b"1"), put(b"b", b"2")]);
    }

    #[test]
    fn torn_length_prefix_is_silently_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, true).unwrap();
        w.append(&put(b"a", b"1")).unwrap();

        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0x07, 0x00]).unwrap(); // two of the four length bytes

        assert_eq!(w.recover().unwrap(), vec![put(b"a", b"1")]);
    }

    #[test]
    fn crc_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, true).unwrap();
        w.append(&put(b"a", b"1")).unwrap();
        w.append(&put(b"b", b"2")).unwrap();

        // Flip a byte inside the first record's body (offset 8 is the op
        // type, right after the length and crc words).
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[8] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(w.recover(), Err(WalError::Corruption(_))));
    }

    #[test]
    fn implausible_frame_length_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let w = Wal::open(&path, true).unwrap();
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&2u32.to_le_bytes()).unwrap(); // < 4, cannot hold a crc
        f.write_all(&[0u8; 16]).unwrap();

        assert!(matches!(w.recover(), Err(WalError::Corruption(_))));
    }

    #[test]
    fn unknown_op_type_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        // Hand-build a frame with op type 9.
        let mut body = Vec::new();
        body.push(9u8);
        write_bytes(&mut body, b"k").unwrap();
        write_uvarint(&mut body, 0).unwrap();
        let mut hasher = Crc32::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&body);
        std::fs::write(&path, &bytes).unwrap();

        let w = Wal::open(&path, true).unwrap();
        assert!(matches!(w.recover(), Err(WalError::Corruption(_))));
    }

    #[test]
    fn recover_after_unsynced_appends() {
        // sync = false skips the fsync but the write itself still lands.
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");

        let mut w = Wal::open(&path, false).unwrap();
        w.append(&put(b"a", b"1")).unwrap();
        assert_eq!(w.recover().unwrap(), vec![put(b"a", b"1")]);
    }

    #[test]
    fn op_key_accessor() {
        assert_eq!(put(b"k", b"v").key(), b"k");
        assert_eq!(del(b"k2").key(), b"k2");
    }
}

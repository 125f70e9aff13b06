//! SSTable header and record codec.
//!
//! The header leads the file so it can be decoded without reading any
//! record:
//!
//! ```text
//! min_key_len (varint) | min_key | max_key_len (varint) | max_key | record_count (varint)
//! ```

use std::io::{self, Read, Write};

use encoding::{read_bytes, read_uvarint, write_bytes, write_uvarint, Key, Value};

use crate::SSTableError;

/// Decoded SSTable header: the cached key range plus the record count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub min_key: Key,
    pub max_key: Key,
    pub count: u64,
}

impl Header {
    pub(crate) fn write<W: Write>(&self, w: &mut W) -> Result<(), SSTableError> {
        write_bytes(w, &self.min_key)?;
        write_bytes(w, &self.max_key)?;
        write_uvarint(w, self.count)?;
        Ok(())
    }

    pub(crate) fn read<R: Read>(r: &mut R) -> Result<Self, SSTableError> {
        let min_key = read_bytes(r).map_err(|e| corrupt("bad min key", e))?;
        let max_key = read_bytes(r).map_err(|e| corrupt("bad max key", e))?;
        let count = read_uvarint(r).map_err(|e| corrupt("bad record count", e))?;
        Ok(Self {
            min_key,
            max_key,
            count,
        })
    }
}

pub(crate) fn write_record<W: Write>(
    w: &mut W,
    key: &[u8],
    value: &[u8],
) -> Result<(), SSTableError> {
    write_bytes(w, key)?;
    write_bytes(w, value)?;
    Ok(())
}

pub(crate) fn read_record<R: Read>(r: &mut R) -> Result<(Key, Value), SSTableError> {
    let key = read_bytes(r).map_err(|e| corrupt("bad record key", e))?;
    let value = read_bytes(r).map_err(|e| corrupt("bad record value", e))?;
    Ok((key, value))
}

/// A short read or bad length is corruption; anything else is an honest I/O
/// failure and keeps its own error kind.
fn corrupt(context: &str, e: io::Error) -> SSTableError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => {
            SSTableError::Corruption(format!("{context}: {e}"))
        }
        _ => SSTableError::Io(e),
    }
}

//! # Encoding
//!
//! Shared byte-level primitives for the StrataKV storage engine: the `Key`
//! and `Value` aliases used across every crate, LEB128 unsigned varints, and
//! length-prefixed byte strings built on top of them.
//!
//! Both the WAL record body and the SSTable header/record format frame their
//! keys and values the same way (`len varint | bytes`), so the codec lives
//! here rather than in either crate.

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// An opaque byte-sequence key, ordered by lexicographic byte comparison.
pub type Key = Vec<u8>;

/// An opaque byte-sequence value. The empty value is reserved as the
/// tombstone marker and is never handed out to clients.
pub type Value = Vec<u8>;

/// Largest length a length-prefixed byte string may declare (256 MiB).
///
/// A corrupted length prefix must not be able to drive a multi-gigabyte
/// allocation before the following `read_exact` fails.
pub const MAX_BYTES_LEN: u64 = 256 * 1024 * 1024;

/// Writes `v` as a LEB128 unsigned varint (7 bits per byte, high bit set on
/// continuation bytes).
pub fn write_uvarint<W: Write>(w: &mut W, mut v: u64) -> io::Result<()> {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            w.write_u8(byte | 0x80)?;
        } else {
            w.write_u8(byte)?;
            return Ok(());
        }
    }
}

/// Reads a LEB128 unsigned varint.
///
/// Fails with `InvalidData` if the encoding runs past the 10 bytes a `u64`
/// can occupy.
pub fn read_uvarint<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = r.read_u8()?;
        if shift == 63 && byte > 1 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint overflows u64",
            ));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "varint longer than 10 bytes",
            ));
        }
    }
}

/// Writes a length-prefixed byte string: `len varint | bytes`.
pub fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    write_uvarint(w, bytes.len() as u64)?;
    w.write_all(bytes)
}

/// Reads a length-prefixed byte string written by [`write_bytes`].
pub fn read_bytes<R: Read>(r: &mut R) -> io::Result<Vec<u8>> {
    let len = read_uvarint(r)?;
    if len > MAX_BYTES_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("byte string length {len} exceeds maximum"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn uvarint_roundtrip() {
        for v in [
            0u64,
            1,
            127,
            128,
            300,
            16_383,
            16_384,
            u32::MAX as u64,
            u64::MAX,
        ] {
            let mut buf = Vec::new();
            write_uvarint(&mut buf, v).unwrap();
            let got = read_uvarint(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(got, v);
        }
    }

    #[test]
    fn uvarint_single_byte_boundary() {
        let mut buf = Vec::new();
        write_uvarint(&mut buf, 127).unwrap();
        assert_eq!(buf.len(), 1);

        buf.clear();
        write_uvarint(&mut buf, 128).unwrap();
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn uvarint_rejects_overlong_encoding() {
        // Eleven continuation bytes can never encode a u64.
        let bytes = [0xff; 11];
        assert!(read_uvarint(&mut Cursor::new(&bytes[..])).is_err());
    }

    #[test]
    fn uvarint_truncated_input() {
        // Continuation bit set but no following byte.
        let bytes = [0x80];
        assert!(read_uvarint(&mut Cursor::new(&bytes[..])).is_err());
    }

    #[test]
    fn bytes_roundtrip() {
        for payload in [b"".as_slice(), b"k", b"hello world", &[0x00, 0xff, 0x80]] {
            let mut buf = Vec::new();
            write_bytes(&mut buf, payload).unwrap();
            let got = read_bytes(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(got, payload);
        }
    }

    #[test]
    fn bytes_rejects_oversized_length() {
        let mut buf = Vec::new();
        write_uvarint(&mut buf, MAX_BYTES_LEN + 1).unwrap();
        assert!(read_bytes(&mut Cursor::new(&buf)).is_err());
    }

    #[test]
    fn bytes_truncated_payload() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, b"full payload").unwrap();
        buf.truncate(buf.len() - 3);
        assert!(read_bytes(&mut Cursor::new(&buf)).is_err());
    }
}

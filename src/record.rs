// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The on-disk framing of a single append to a value-log segment.
//!
//! ```text
//! offset 0    : u32 key_size (ks)
//! offset 4    : u32 value_size (vs)
//! offset 8    : ks bytes of key
//! offset 8+ks : vs bytes of value
//! ```
//!
//! There is no per-record CRC in this format; integrity is a property of
//! the index pointer and the stored length. [`RecordFormat::CrcFramed`]
//! is the legacy format that additionally prepends a CRC32 to the value.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

/// Maximum permitted key length in bytes.
pub const MAX_KEY_SIZE: usize = 128;

/// Fixed header size: two little-endian `u32` length prefixes.
pub const HEADER_SIZE: usize = 8;

/// Size, in bytes, of the legacy CRC32 value prefix.
const CRC_SIZE: usize = 4;

/// Selects which on-disk value framing a segment uses.
///
/// `Plain` is the current default. `CrcFramed` is kept for interop with
/// the legacy format: it prepends a CRC32-IEEE to the value and verifies
/// it on read, surfacing [`Error::DataRotted`] on mismatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum RecordFormat {
    /// `[u32 ks][u32 vs][key][value]`, no checksum.
    #[default]
    Plain,
    /// `[u32 ks][u32 vs][key][u32 crc32][value]`.
    CrcFramed,
}

/// Encodes `key`/`value` into a single append-ready buffer.
///
/// Returns the buffer along with `ks` and `vs` so the caller can compute
/// locator offsets without re-deriving them.
///
/// # Errors
///
/// Returns [`Error::KeyTooLong`] if `key.len() > `[`MAX_KEY_SIZE`].
pub fn encode(format: RecordFormat, key: &[u8], value: &[u8]) -> Result<(Vec<u8>, u32, u32)> {
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::KeyTooLong);
    }

    let ks = key.len() as u32;

    match format {
        RecordFormat::Plain => {
            let vs = value.len() as u32;
            let mut buf = Vec::with_capacity(HEADER_SIZE + key.len() + value.len());
            buf.write_u32::<LittleEndian>(ks)?;
            buf.write_u32::<LittleEndian>(vs)?;
            buf.write_all(key)?;
            buf.write_all(value)?;
            Ok((buf, ks, vs))
        }
        RecordFormat::CrcFramed => {
            let vs = (value.len() + CRC_SIZE) as u32;
            let mut buf = Vec::with_capacity(HEADER_SIZE + key.len() + value.len() + CRC_SIZE);
            buf.write_u32::<LittleEndian>(ks)?;
            buf.write_u32::<LittleEndian>(vs)?;
            buf.write_all(key)?;

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(value);
            buf.write_u32::<LittleEndian>(hasher.finalize())?;
            buf.write_all(value)?;

            Ok((buf, ks, vs))
        }
    }
}

/// Decodes a complete record buffer back into owned `(key, value)` copies.
///
/// Neither the returned key nor value aliases `buf`.
///
/// # Errors
///
/// Returns [`Error::BufferSize`] if `buf`'s length does not match the
/// header's declared `ks + vs`, and [`Error::DataRotted`] for a
/// [`RecordFormat::CrcFramed`] record whose stored checksum does not match
/// its value bytes.
pub fn decode(format: RecordFormat, buf: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::BufferSize);
    }

    let mut header = buf;
    let ks = header.read_u32::<LittleEndian>()? as usize;
    let vs = header.read_u32::<LittleEndian>()? as usize;

    if buf.len() != HEADER_SIZE + ks + vs {
        return Err(Error::BufferSize);
    }

    let key = buf
        .get(HEADER_SIZE..HEADER_SIZE + ks)
        .ok_or(Error::BufferSize)?
        .to_vec();

    let value_region = buf
        .get(HEADER_SIZE + ks..HEADER_SIZE + ks + vs)
        .ok_or(Error::BufferSize)?;

    let value = match format {
        RecordFormat::Plain => value_region.to_vec(),
        RecordFormat::CrcFramed => {
            if value_region.len() < CRC_SIZE {
                return Err(Error::BufferSize);
            }
            let (mut crc_bytes, value_bytes) = value_region.split_at(CRC_SIZE);
            let stored_crc = crc_bytes.read_u32::<LittleEndian>()?;

            let mut hasher = crc32fast::Hasher::new();
            hasher.update(value_bytes);
            if hasher.finalize() != stored_crc {
                return Err(Error::DataRotted);
            }

            value_bytes.to_vec()
        }
    };

    Ok((key, value))
}

/// User-visible length of a value for the given wire-format length.
///
/// For [`RecordFormat::CrcFramed`] this subtracts the CRC prefix so
/// `Size(key)` reports the length the caller originally wrote, not the
/// on-disk framed length.
#[must_use]
pub fn visible_len(format: RecordFormat, wire_len: u32) -> u32 {
    match format {
        RecordFormat::Plain => wire_len,
        RecordFormat::CrcFramed => wire_len.saturating_sub(CRC_SIZE as u32),
    }
}

/// Offset, within the `vs`-sized value region of a record, at which the
/// user-visible value bytes actually begin.
///
/// `Plain` records have no prefix, so this is `0`. `CrcFramed` records
/// prepend a 4-byte CRC32 ahead of the value, so a locator's `offset` must
/// add this on top of `HEADER_SIZE + ks` — callers building a
/// [`crate::locator::ValueLocator`] from an encoded record should use this
/// rather than re-deriving the format's layout themselves.
#[must_use]
pub fn value_start_offset(format: RecordFormat) -> u32 {
    match format {
        RecordFormat::Plain => 0,
        RecordFormat::CrcFramed => CRC_SIZE as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_plain() -> Result<()> {
        let (buf, ks, vs) = encode(RecordFormat::Plain, b"hello", b"world")?;
        assert_eq!(ks, 5);
        assert_eq!(vs, 5);
        assert_eq!(buf.len(), HEADER_SIZE + 5 + 5);

        let (key, value) = decode(RecordFormat::Plain, &buf)?;
        assert_eq!(key, b"hello");
        assert_eq!(value, b"world");
        Ok(())
    }

    #[test]
    fn round_trip_empty_value() -> Result<()> {
        let (buf, _, vs) = encode(RecordFormat::Plain, b"k", b"")?;
        assert_eq!(vs, 0);

        let (key, value) = decode(RecordFormat::Plain, &buf)?;
        assert_eq!(key, b"k");
        assert!(value.is_empty());
        Ok(())
    }

    #[test]
    fn rejects_oversized_key() {
        let key = vec![0u8; MAX_KEY_SIZE + 1];
        let err = encode(RecordFormat::Plain, &key, b"v").unwrap_err();
        assert!(matches!(err, Error::KeyTooLong));
    }

    #[test]
    fn rejects_mismatched_buffer_size() -> Result<()> {
        let (mut buf, _, _) = encode(RecordFormat::Plain, b"k", b"v")?;
        buf.push(0xFF);
        let err = decode(RecordFormat::Plain, &buf).unwrap_err();
        assert!(matches!(err, Error::BufferSize));
        Ok(())
    }

    #[test]
    fn value_start_offset_accounts_for_crc_prefix() {
        assert_eq!(value_start_offset(RecordFormat::Plain), 0);
        assert_eq!(value_start_offset(RecordFormat::CrcFramed), 4);
    }

    #[test]
    fn crc_framed_round_trip_and_detects_corruption() -> Result<()> {
        let (mut buf, _, vs) = encode(RecordFormat::CrcFramed, b"k", b"world")?;
        assert_eq!(visible_len(RecordFormat::CrcFramed, vs), 5);

        let (key, value) = decode(RecordFormat::CrcFramed, &buf)?;
        assert_eq!(key, b"k");
        assert_eq!(value, b"world");

        // Flip a bit in the value region to corrupt it.
        if let Some(last) = buf.last_mut() {
            *last ^= 0xFF;
        }
        let err = decode(RecordFormat::CrcFramed, &buf).unwrap_err();
        assert!(matches!(err, Error::DataRotted));
        Ok(())
    }
}

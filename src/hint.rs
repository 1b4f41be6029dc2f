// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! One-shot migration from the legacy per-shard hint-file format.
//!
//! The predecessor design reconstructed its key→location map at startup by
//! replaying a `.hint` file of fixed-size records. This crate's core
//! eliminates that recovery path by persisting locators directly in the
//! index, but a hint file can still be migrated once, up front, via
//! [`migrate_hint_file`] — this is optional startup tooling, not part of
//! [`crate::Store::open`]'s steady-state path.

use crate::{
    aux_keys::namespaced_user_key,
    coding::Encode,
    error::Error,
    id::SegmentId,
    index::{Index, WriteOp},
    locator::ValueLocator,
    Result,
};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

const KEY_FIELD_SIZE: usize = 128;

/// Fixed size of one legacy hint record: flag (1) + key length (1) + key
/// (128, zero-padded) + offset (8) + size (4).
pub const HINT_RECORD_SIZE: usize = 1 + 1 + KEY_FIELD_SIZE + 8 + 4;

/// Hint records are replayed in blocks of this many entries at a time.
pub const HINT_BOOT_READ_NUM: usize = 1024;

/// Flag byte marking a hint entry as deleted/superseded. The zero value
/// (unset) means live — matching the legacy format, where the flag byte
/// is only ever written when an entry is tombstoned.
const FLAG_DELETED: u8 = 1;

struct HintRecord {
    live: bool,
    key: Vec<u8>,
    offset: u64,
    size: u32,
}

fn decode_hint_record(buf: &[u8]) -> Result<HintRecord> {
    if buf.len() != HINT_RECORD_SIZE {
        return Err(Error::BufferSize);
    }

    let mut reader = buf;
    let flag = reader.read_u8()?;
    let key_len = reader.read_u8()? as usize;

    let mut key_field = [0u8; KEY_FIELD_SIZE];
    reader.read_exact(&mut key_field)?;
    if key_len > KEY_FIELD_SIZE {
        return Err(Error::BufferSize);
    }
    let key = key_field.get(..key_len).ok_or(Error::BufferSize)?.to_vec();

    let offset = reader.read_u64::<LittleEndian>()?;
    let size = reader.read_u32::<LittleEndian>()?;

    Ok(HintRecord {
        live: flag != FLAG_DELETED,
        key,
        offset,
        size,
    })
}

/// Reads `hint_path` sequentially in blocks of [`HINT_BOOT_READ_NUM`]
/// records, decodes each fixed-size entry, and writes a [`ValueLocator`]
/// for every live entry into `index` as belonging to `segment_id` (the
/// segment the legacy per-shard hint file corresponded to).
///
/// Returns the number of locators migrated.
pub fn migrate_hint_file(
    hint_path: &std::path::Path,
    segment_id: SegmentId,
    index: &dyn Index,
) -> Result<usize> {
    let bytes = std::fs::read(hint_path)?;
    if bytes.len() % HINT_RECORD_SIZE != 0 {
        return Err(Error::BufferSize);
    }

    let mut migrated = 0;
    let mut ops = Vec::with_capacity(HINT_BOOT_READ_NUM);

    for chunk in bytes.chunks(HINT_RECORD_SIZE) {
        let record = decode_hint_record(chunk)?;
        if record.live {
            let locator = ValueLocator {
                segment_id,
                offset: record.offset,
                length: record.size,
                occupied: crate::record::HEADER_SIZE as u32
                    + record.key.len() as u32
                    + record.size,
            };
            ops.push(WriteOp::Put(
                namespaced_user_key(&record.key),
                locator.encode_into_vec()?,
            ));
            migrated += 1;
        }

        if ops.len() >= HINT_BOOT_READ_NUM {
            index.write_batch(std::mem::take(&mut ops))?;
        }
    }

    if !ops.is_empty() {
        index.write_batch(ops)?;
    }

    Ok(migrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BTreeIndex;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    fn write_hint_record(
        out: &mut Vec<u8>,
        deleted: bool,
        key: &[u8],
        offset: u64,
        size: u32,
    ) -> Result<()> {
        out.write_u8(if deleted { FLAG_DELETED } else { 0 })?;
        out.write_u8(key.len() as u8)?;
        let mut field = [0u8; KEY_FIELD_SIZE];
        field
            .get_mut(..key.len())
            .ok_or(Error::BufferSize)?
            .copy_from_slice(key);
        out.write_all(&field)?;
        out.write_u64::<LittleEndian>(offset)?;
        out.write_u32::<LittleEndian>(size)?;
        Ok(())
    }

    #[test]
    fn migrates_only_live_entries() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let hint_path = dir.path().join("0.hint");

        let mut buf = Vec::new();
        write_hint_record(&mut buf, false, b"a", 10, 5)?;
        write_hint_record(&mut buf, true, b"b", 20, 6)?;
        write_hint_record(&mut buf, false, b"c", 30, 7)?;
        std::fs::write(&hint_path, &buf)?;

        let index = BTreeIndex::open(dir.path())?;
        let migrated = migrate_hint_file(&hint_path, 3, &index)?;
        assert_eq!(migrated, 2);

        assert!(index.get(&namespaced_user_key(b"a"))?.is_some());
        assert!(index.get(&namespaced_user_key(b"b"))?.is_none());
        assert!(index.get(&namespaced_user_key(b"c"))?.is_some());
        Ok(())
    }

    /// A zero flag byte is the format's unset default and means live, not
    /// deleted; the deleted flag is only ever set explicitly.
    #[test]
    fn zero_flag_byte_is_live_not_deleted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let hint_path = dir.path().join("0.hint");

        let mut buf = Vec::new();
        write_hint_record(&mut buf, false, b"only", 0, 3)?;
        std::fs::write(&hint_path, &buf)?;

        let index = BTreeIndex::open(dir.path())?;
        let migrated = migrate_hint_file(&hint_path, 0, &index)?;
        assert_eq!(migrated, 1);
        assert!(index.get(&namespaced_user_key(b"only"))?.is_some());
        Ok(())
    }
}

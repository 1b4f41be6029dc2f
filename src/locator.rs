// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! [`ValueLocator`]: the index value that points a key at its bytes in the
//! value log.

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    id::SegmentId,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Format tag written ahead of every encoded [`ValueLocator`].
///
/// Bumping this lets a future revision (e.g. one adding a field) decode
/// locators written by an older version of this crate, without needing a
/// separate on-disk version marker.
const LOCATOR_TAG: u8 = 1;

/// Points a key at the bytes that hold its value.
///
/// `offset` is the position of the value bytes themselves (past the
/// record header and key). `length` is the value's visible length.
/// `occupied` is the full size the record consumed on disk
/// (`HEADER_SIZE + key.len() + value.len()`, see [`crate::record`]) and
/// is used for `Used`/`Trash` garbage accounting.
#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValueLocator {
    /// Segment the value lives in.
    pub segment_id: SegmentId,
    /// Byte offset of the value within the segment.
    pub offset: u64,
    /// Visible length of the value.
    pub length: u32,
    /// Total bytes the owning record consumed on disk.
    pub occupied: u32,
}

impl Encode for ValueLocator {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(LOCATOR_TAG)?;
        writer.write_u64::<LittleEndian>(self.segment_id)?;
        writer.write_u64::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        writer.write_u32::<LittleEndian>(self.occupied)?;
        Ok(())
    }
}

impl Decode for ValueLocator {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        if tag != LOCATOR_TAG {
            return Err(DecodeError::InvalidTag(("ValueLocator", tag)));
        }

        let segment_id = reader.read_u64::<LittleEndian>()?;
        let offset = reader.read_u64::<LittleEndian>()?;
        let length = reader.read_u32::<LittleEndian>()?;
        let occupied = reader.read_u32::<LittleEndian>()?;

        Ok(Self {
            segment_id,
            offset,
            length,
            occupied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() -> crate::Result<()> {
        let locator = ValueLocator {
            segment_id: 7,
            offset: 128,
            length: 6,
            occupied: 20,
        };

        let bytes = locator.encode_into_vec()?;
        let decoded = ValueLocator::decode_from(&mut bytes.as_slice())?;
        assert_eq!(locator, decoded);
        Ok(())
    }

    #[test]
    fn rejects_unknown_tag() {
        let bytes = [0xFF, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = ValueLocator::decode_from(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidTag(("ValueLocator", 0xFF))));
    }
}

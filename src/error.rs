// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};

/// Represents errors that can occur in mutcask
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// `Store::open` was called without a path configured
    PathUndefined,

    /// The repo path exists but is not a directory
    PathNotDirectory,

    /// The repo is already locked by another process
    RepoLocked,

    /// A put used a key longer than [`crate::record::MAX_KEY_SIZE`]
    KeyTooLong,

    /// A codec input's declared sizes did not match its actual length
    BufferSize,

    /// A segment append wrote fewer bytes than requested
    ShortWrite,

    /// A value failed its stored checksum (legacy CRC-framed format only)
    DataRotted,

    /// The requested key does not exist
    NotFound,

    /// The operation is not implemented for this backend
    NotImplemented,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mutcask error: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// mutcask result
pub type Result<T> = std::result::Result<T, Error>;

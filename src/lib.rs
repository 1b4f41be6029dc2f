// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Embedded, persistent, Bitcask-style log-structured key-value store.
//!
//! Values are appended to segmented, append-only log files on disk; a
//! secondary ordered index records, for every live key, the segment id and
//! byte range the value lives at. A read is a single index lookup followed
//! by a positional file read.
//!
//! A repository directory looks like:
//!
//! ```text
//! repo/
//!   repo.lock   advisory lock guarding exclusive use
//!   sys.json    persisted SystemState counters
//!   keys/       the ordered index
//!   vlog/       numbered append-only value-log segments
//! ```
//!
//! Writes go through a single append worker thread per open repository
//! (see [`Store::open`]), so every `put` to a given repo is serialized the
//! same way regardless of how many client threads call it concurrently.
//!
//! # Example usage
//!
//! ```
//! use mutcask::{Config, Store};
//!
//! # fn main() -> mutcask::Result<()> {
//! # let folder = tempfile::tempdir()?;
//! let store = Store::open(Config::new().path(folder.path()))?;
//!
//! store.put(b"hello", b"world")?;
//! assert_eq!(store.get(b"hello")?, b"world");
//! assert_eq!(store.size(b"hello")?, 5);
//! assert!(store.has(b"hello")?);
//!
//! store.delete(b"hello")?;
//! assert!(!store.has(b"hello")?);
//!
//! store.close()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]

pub mod aux_keys;
mod coding;
mod config;
mod error;
pub mod hint;
mod id;
mod index;
mod locator;
mod lock;
mod record;
mod repo;
mod segment;
mod state;
mod store;
mod worker;

pub use {
    config::Config,
    error::{Error, Result},
    id::SegmentId,
    index::{BTreeIndex, Index, WriteOp},
    locator::ValueLocator,
    record::RecordFormat,
    state::{SysStateDoc, SystemState},
    store::{Store, DEFAULT_SCAN_MAX},
};

// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Persisted repository counters.

use crate::{error::Error, id::SegmentId, Result};
use serde::{Deserialize, Serialize};
use std::{
    io::Write,
    path::Path,
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
};

/// Filename, relative to the repo root, of the persisted system state.
pub const SYS_STATE_FILE: &str = "sys.json";

/// On-disk (JSON) projection of [`SystemState`].
///
/// The `dirty` flag is in-memory only and is not part of this shape.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SysStateDoc {
    /// Configured capacity, in bytes (informational).
    #[serde(rename = "Cap")]
    pub cap: u64,
    /// Total bytes written across all segments.
    #[serde(rename = "Used")]
    pub used: u64,
    /// Bytes made obsolete by overwrites/deletes.
    #[serde(rename = "Trash")]
    pub trash: u64,
    /// Count of put operations.
    #[serde(rename = "KTotal")]
    pub k_total: u64,
    /// Segment currently receiving appends.
    #[serde(rename = "ActiveID")]
    pub active_id: SegmentId,
    /// Next segment id to allocate on rollover.
    #[serde(rename = "NextID")]
    pub next_id: SegmentId,
}

/// Lock-free, atomically-mutated repository counters.
///
/// Counter mutations are fetch-add/CAS; the `dirty` flag gates the
/// periodic flusher via compare-and-swap from 1 to 0 around a flush.
#[derive(Debug, Default)]
pub struct SystemState {
    /// Configured capacity, in bytes (informational).
    pub cap: AtomicU64,
    /// Total bytes written across all segments (monotonic).
    pub used: AtomicU64,
    /// Bytes made obsolete by overwrites/deletes (compaction candidates).
    pub trash: AtomicU64,
    /// Count of put operations (monotonic; not a live-key count).
    pub k_total: AtomicU64,
    /// Segment currently receiving appends.
    pub active_id: AtomicU64,
    /// Next segment id to allocate on rollover.
    pub next_id: AtomicU64,
    /// `1` if state has changed since the last flush.
    pub dirty: AtomicU32,
}

impl SystemState {
    fn from_doc(doc: SysStateDoc) -> Self {
        Self {
            cap: AtomicU64::new(doc.cap),
            used: AtomicU64::new(doc.used),
            trash: AtomicU64::new(doc.trash),
            k_total: AtomicU64::new(doc.k_total),
            active_id: AtomicU64::new(doc.active_id),
            next_id: AtomicU64::new(doc.next_id),
            dirty: AtomicU32::new(0),
        }
    }

    fn to_doc(&self) -> SysStateDoc {
        SysStateDoc {
            cap: self.cap.load(Ordering::SeqCst),
            used: self.used.load(Ordering::SeqCst),
            trash: self.trash.load(Ordering::SeqCst),
            k_total: self.k_total.load(Ordering::SeqCst),
            active_id: self.active_id.load(Ordering::SeqCst),
            next_id: self.next_id.load(Ordering::SeqCst),
        }
    }

    /// Marks the state as changed since the last flush.
    pub fn mark_dirty(&self) {
        self.dirty.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst).ok();
    }

    /// Reads `sys.json` from `repo_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] (wrapping a `NotFound` [`std::io::Error`]) if
    /// the file does not exist.
    pub fn load(repo_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(repo_path.join(SYS_STATE_FILE))?;
        let doc: SysStateDoc = serde_json::from_slice(&bytes).map_err(|e| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        Ok(Self::from_doc(doc))
    }

    /// Creates `sys.json` with `initial`, failing if it already exists.
    pub fn init(repo_path: &Path, initial: SysStateDoc) -> Result<Self> {
        let path = repo_path.join(SYS_STATE_FILE);
        if path.try_exists()? {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "sys state already exists",
            )));
        }

        let state = Self::from_doc(initial);
        state.flush(repo_path)?;
        Ok(state)
    }

    /// Unconditionally writes the current counters to `sys.json`.
    ///
    /// Uses a temp-file-then-rename so a crash mid-write never leaves a
    /// truncated `sys.json` behind.
    pub fn flush(&self, repo_path: &Path) -> Result<()> {
        let doc = self.to_doc();
        let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| {
            Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        let mut temp = tempfile::NamedTempFile::new_in(repo_path)?;
        temp.write_all(&bytes)?;
        temp.persist(repo_path.join(SYS_STATE_FILE))
            .map_err(|e| e.error)?;

        self.dirty.store(0, Ordering::SeqCst);
        Ok(())
    }

    /// Flushes only if [`SystemState::dirty`] is set, clearing it on
    /// success.
    pub fn flush_if_dirty(&self, repo_path: &Path) -> Result<()> {
        if self
            .dirty
            .compare_exchange(1, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let doc = self.to_doc();
            let bytes = serde_json::to_vec_pretty(&doc).map_err(|e| {
                Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            })?;

            let mut temp = tempfile::NamedTempFile::new_in(repo_path)?;
            temp.write_all(&bytes)?;
            temp.persist(repo_path.join(SYS_STATE_FILE))
                .map_err(|e| e.error)?;
        }
        Ok(())
    }
}

// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Owns the active append file handle and opens past segments for reads.

use crate::{error::Error, id::SegmentId, Result};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Subdirectory, relative to the repo root, holding numbered segment files.
pub const VLOG_DIR: &str = "vlog";

/// Returns `<repo>/vlog/<id:08>.vlog`.
#[must_use]
pub fn segment_path(repo_path: &Path, id: SegmentId) -> PathBuf {
    repo_path.join(VLOG_DIR).join(format!("{id:08}.vlog"))
}

/// Manages the single append-only file currently receiving writes.
///
/// Only the append worker (see [`crate::worker`]) ever holds a
/// `SegmentManager`; reads open their own independent handles via
/// [`SegmentManager::open_for_read`].
pub struct SegmentManager {
    repo_path: PathBuf,
    active_id: SegmentId,
    active_file: File,
}

impl SegmentManager {
    /// Opens (creating if missing) the active segment `<id:08>.vlog` in
    /// append-only, write-only mode.
    pub fn open_active(repo_path: &Path, id: SegmentId) -> Result<Self> {
        let path = segment_path(repo_path, id);
        let active_file = OpenOptions::new()
            .create(true)
            .append(true)
            .write(true)
            .open(&path)?;

        Ok(Self {
            repo_path: repo_path.to_path_buf(),
            active_id: id,
            active_file,
        })
    }

    /// The segment id currently receiving appends.
    #[must_use]
    pub fn active_id(&self) -> SegmentId {
        self.active_id
    }

    /// Current size, in bytes, of the active segment.
    pub fn size(&self) -> Result<u64> {
        Ok(self.active_file.metadata()?.len())
    }

    /// Appends `bytes` to the active segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShortWrite`] if fewer bytes were written than
    /// requested.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize> {
        let written = self.active_file.write(bytes)?;
        if written != bytes.len() {
            return Err(Error::ShortWrite);
        }
        // Durability is a property of the whole append pipeline: the index
        // batch (see crate::worker) must not become visible before the
        // segment bytes it points at are on disk.
        self.active_file.sync_data()?;
        Ok(written)
    }

    /// Closes the current active handle (without deleting it) and opens
    /// `next_id` as the new active segment, using create-new-exclusive
    /// semantics so two rollovers can never target the same file.
    pub fn rollover(&mut self, next_id: SegmentId) -> Result<()> {
        let path = segment_path(&self.repo_path, next_id);
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .write(true)
            .open(&path)?;

        self.active_file = file;
        self.active_id = next_id;
        Ok(())
    }

    /// Opens any segment (including the active one, or a past one) for a
    /// single positional read, returning `length` bytes starting at
    /// `offset`.
    ///
    /// Every call opens and closes a fresh handle; there is no shared read
    /// handle pool (the OS page cache absorbs repeated opens).
    pub fn read_at(repo_path: &Path, id: SegmentId, offset: u64, length: u32) -> Result<Vec<u8>> {
        let path = segment_path(repo_path, id);
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; length as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_size_and_rollover_starts_fresh() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(VLOG_DIR))?;

        let mut mgr = SegmentManager::open_active(dir.path(), 0)?;
        assert_eq!(mgr.size()?, 0);

        mgr.append(b"hello")?;
        assert_eq!(mgr.size()?, 5);

        mgr.rollover(1)?;
        assert_eq!(mgr.active_id(), 1);
        assert_eq!(mgr.size()?, 0);

        let bytes = SegmentManager::read_at(dir.path(), 0, 0, 5)?;
        assert_eq!(bytes, b"hello");
        Ok(())
    }

    #[test]
    fn rollover_fails_if_segment_already_exists() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(VLOG_DIR))?;

        // Pre-create segment 1 out from under the manager.
        std::fs::File::create(segment_path(dir.path(), 1))?;

        let mut mgr = SegmentManager::open_active(dir.path(), 0)?;
        assert!(mgr.rollover(1).is_err());
        Ok(())
    }
}

// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The advisory filesystem lock guarding exclusive use of a repo.
//!
//! Kept as thin a wrapper around `fs4`'s OS-level file locking as possible.

use crate::error::{Error, Result};
use fs4::FileExt;
use std::{
    fs::{File, OpenOptions},
    path::Path,
};

/// Filename, relative to the repo root, of the lock file.
pub const LOCK_FILE_NAME: &str = "repo.lock";

/// An exclusive hold on a repo directory, released on drop.
pub struct RepoLock {
    file: File,
}

impl RepoLock {
    /// Attempts to acquire the exclusive lock at `repo_path/repo.lock`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RepoLocked`] if another process already holds it.
    pub fn acquire(repo_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(repo_path.join(LOCK_FILE_NAME))?;

        file.try_lock_exclusive().map_err(|_| Error::RepoLocked)?;

        Ok(Self { file })
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

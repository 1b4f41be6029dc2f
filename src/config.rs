// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::PathBuf;

/// Default cap on a value-log segment before rollover (4 GiB).
pub const DEFAULT_MAX_LOG_FILE_SIZE: u64 = 4 << 30;

/// Repository configuration.
///
/// This is the thin option/config builder surface mutcask's core consumes;
/// it performs no validation beyond what [`crate::Store::open`] itself needs.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) path: Option<PathBuf>,
    pub(crate) max_log_file_size: u64,
    pub(crate) capacity: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: None,
            max_log_file_size: DEFAULT_MAX_LOG_FILE_SIZE,
            capacity: 0,
        }
    }
}

impl Config {
    /// Creates a new builder with no path set.
    ///
    /// Call [`Config::path`] before [`crate::Store::open`], or opening will
    /// fail with [`crate::Error::PathUndefined`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the repository directory.
    #[must_use]
    pub fn path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the maximum size of a value-log segment before rollover.
    ///
    /// Default = 4 GiB.
    #[must_use]
    pub fn max_log_file_size(mut self, bytes: u64) -> Self {
        self.max_log_file_size = bytes;
        self
    }

    /// Sets the informational capacity recorded in the persisted system state.
    ///
    /// This value is not enforced by the core.
    #[must_use]
    pub fn capacity(mut self, bytes: u64) -> Self {
        self.capacity = bytes;
        self
    }
}

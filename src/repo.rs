// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Repository lifecycle: directory creation, lock acquisition, and
//! open-time recovery.

use crate::{
    error::Error,
    index::BTreeIndex,
    lock::RepoLock,
    segment::{SegmentManager, VLOG_DIR},
    state::{SysStateDoc, SystemState},
    Config, Result,
};
use std::path::{Path, PathBuf};

/// Result of walking through the repository's numbered open-time steps.
pub(crate) struct OpenedRepo {
    pub path: PathBuf,
    pub lock: RepoLock,
    pub state: SystemState,
    pub segments: SegmentManager,
    pub index: BTreeIndex,
}

/// Runs the repository lifecycle's open-time steps.
///
/// # Errors
///
/// Returns [`Error::PathUndefined`] if `config` has no path,
/// [`Error::PathNotDirectory`] if the path exists but is not a directory,
/// and [`Error::RepoLocked`] if another process holds the lock.
pub(crate) fn open(config: &Config) -> Result<OpenedRepo> {
    let path = config.path.clone().ok_or(Error::PathUndefined)?;
    let path = path_absolutize::Absolutize::absolutize(path.as_path())
        .map(|p| p.into_owned())
        .unwrap_or(path);

    // 1. Ensure the repo directory exists.
    match std::fs::metadata(&path) {
        Ok(meta) if !meta.is_dir() => return Err(Error::PathNotDirectory),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(&path)?;
        }
        Err(e) => return Err(e.into()),
    }

    // 2. Acquire the exclusive repo lock.
    let lock = RepoLock::acquire(&path)?;

    // 3. Load sys.json, or initialize it.
    let state = match SystemState::load(&path) {
        Ok(state) => {
            log::info!("recovering mutcask repo at {}", path.display());
            state
        }
        Err(_) => {
            log::info!("initializing new mutcask repo at {}", path.display());
            SystemState::init(
                &path,
                SysStateDoc {
                    cap: config.capacity,
                    active_id: 0,
                    next_id: 1,
                    ..Default::default()
                },
            )?
        }
    };

    // 4. Ensure vlog/ exists.
    std::fs::create_dir_all(path.join(VLOG_DIR))?;

    // 5. Open the active segment.
    let active_id = state.active_id.load(std::sync::atomic::Ordering::SeqCst);
    let segments = SegmentManager::open_active(&path, active_id)?;

    // 6. Open the ordered-index store.
    let index = BTreeIndex::open(&path)?;

    Ok(OpenedRepo {
        path,
        lock,
        state,
        segments,
        index,
    })
}

/// Flushes `sys.json` one last time, best-effort.
pub(crate) fn close(path: &Path, state: &SystemState) -> Result<()> {
    state.flush_if_dirty(path)
}

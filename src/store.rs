// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The public facade tying the append pipeline, index adapter, segment
//! manager, and system state together.

use crate::{
    aux_keys::{namespaced_user_key, strip_user_key_sentinel},
    coding::Decode,
    error::Error,
    index::{BTreeIndex, Index},
    locator::ValueLocator,
    record::{RecordFormat, MAX_KEY_SIZE},
    repo,
    segment::SegmentManager,
    state::SystemState,
    worker::{self, AppendWorkerHandle},
    Config, Result,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    time::Duration,
};

/// Returned by [`Store::scan_keys`] when the caller passes `max <= 0`.
pub const DEFAULT_SCAN_MAX: usize = 1000;

/// Cadence at which the background flusher checks the dirty flag.
const FLUSH_INTERVAL: Duration = Duration::from_secs(3);

struct StoreInner {
    path: PathBuf,
    state: Arc<SystemState>,
    index: Arc<BTreeIndex>,
    worker: Mutex<Option<AppendWorkerHandle>>,
    worker_join: Mutex<Option<std::thread::JoinHandle<()>>>,
    flusher_stop: Mutex<Option<mpsc::Sender<()>>>,
    flusher_join: Mutex<Option<std::thread::JoinHandle<()>>>,
    lock: Mutex<Option<crate::lock::RepoLock>>,
    closed: AtomicBool,
}

/// An open mutcask repository.
///
/// Cheaply [`Clone`]able; clones share the same append worker, index, and
/// state, so multiple client tasks may call `put`/`get`/`delete`/`size`
/// concurrently against one open repository.
#[derive(Clone)]
pub struct Store(Arc<StoreInner>);

impl Store {
    /// Opens or recovers a repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathUndefined`], [`Error::PathNotDirectory`], or
    /// [`Error::RepoLocked`] as described in [`crate::repo::open`].
    pub fn open(config: Config) -> Result<Self> {
        let opened = repo::open(&config)?;

        let path = opened.path;
        let state = Arc::new(opened.state);
        let index = Arc::new(opened.index);

        let index_for_worker: Arc<dyn Index> = index.clone();
        let (worker_handle, worker_join) = worker::spawn(
            path.clone(),
            RecordFormat::Plain,
            config.max_log_file_size,
            opened.segments,
            index_for_worker,
            state.clone(),
        );

        let (flusher_stop_tx, flusher_stop_rx) = mpsc::channel();
        let flusher_join = spawn_flusher(path.clone(), state.clone(), flusher_stop_rx);

        Ok(Self(Arc::new(StoreInner {
            path,
            state,
            index,
            worker: Mutex::new(Some(worker_handle)),
            worker_join: Mutex::new(Some(worker_join)),
            flusher_stop: Mutex::new(Some(flusher_stop_tx)),
            flusher_join: Mutex::new(Some(flusher_join)),
            lock: Mutex::new(Some(opened.lock)),
            closed: AtomicBool::new(false),
        })))
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyTooLong`] if `key.len() > 128`.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLong);
        }

        let worker = self.0.worker.lock().expect("lock is poisoned");
        let Some(worker) = worker.as_ref() else {
            return Err(closed_error());
        };
        worker.put(key.to_vec(), value.to_vec())
    }

    /// Retrieves the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let locator = self.locator_for(key)?;
        self.read_locator(&locator)
    }

    /// Removes `key`, if present. Idempotent: deleting an absent key
    /// returns `Ok(())`.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let namespaced_key = namespaced_user_key(key);

        let Some(bytes) = self.0.index.get(&namespaced_key)? else {
            return Ok(());
        };
        let locator = decode_locator(&bytes)?;

        let pre = crate::aux_keys::vld_key(locator.segment_id);
        self.0.index.write_batch(vec![
            crate::index::WriteOp::Delete(namespaced_key),
            crate::index::WriteOp::Put(pre.into_bytes(), key.to_vec()),
        ])?;

        self.0
            .state
            .trash
            .fetch_add(u64::from(locator.occupied), Ordering::SeqCst);
        self.0.state.mark_dirty();

        Ok(())
    }

    /// Returns the length of the value stored for `key`, without touching
    /// segment files.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key is absent.
    pub fn size(&self, key: &[u8]) -> Result<u32> {
        Ok(self.locator_for(key)?.length)
    }

    /// Returns `true` if `key` is present.
    pub fn has(&self, key: &[u8]) -> Result<bool> {
        self.0.index.has(&namespaced_user_key(key))
    }

    /// Returns the total bytes written across all segments so far.
    #[must_use]
    pub fn used(&self) -> u64 {
        self.0.state.used.load(Ordering::SeqCst)
    }

    /// Returns the id of the segment currently receiving appends.
    #[must_use]
    pub fn active_segment_id(&self) -> crate::SegmentId {
        self.0.state.active_id.load(Ordering::SeqCst)
    }

    /// Returns the CRC32-IEEE checksum of the value stored for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the key is absent.
    pub fn checksum(&self, key: &[u8]) -> Result<u32> {
        let value = self.get(key)?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&value);
        Ok(hasher.finalize())
    }

    /// Returns up to `max` keys starting with `prefix`, in index key
    /// order. `max <= 0` is treated as [`DEFAULT_SCAN_MAX`].
    pub fn scan_keys(&self, prefix: &[u8], max: i64) -> Result<Vec<Vec<u8>>> {
        let max = if max <= 0 {
            DEFAULT_SCAN_MAX
        } else {
            max as usize
        };

        let namespaced_prefix = namespaced_user_key(prefix);
        Ok(self
            .0
            .index
            .iter_prefix(&namespaced_prefix)?
            .into_iter()
            .filter_map(|(k, _)| strip_user_key_sentinel(&k).map(<[u8]>::to_vec))
            .take(max)
            .collect())
    }

    /// Streams every user key in index order on the returned channel,
    /// stopping early if `cancel` is set to `true`.
    ///
    /// `$vl`/`$vld` auxiliary bookkeeping keys are filtered out.
    #[must_use]
    pub fn all_keys_chan(&self, cancel: Arc<AtomicBool>) -> mpsc::Receiver<Vec<u8>> {
        let index = self.0.index.clone();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            let Ok(keys) = index.iter_all() else {
                return;
            };

            for key in keys {
                if cancel.load(Ordering::SeqCst) {
                    break;
                }
                let Some(user_key) = strip_user_key_sentinel(&key) else {
                    continue;
                };
                if tx.send(user_key.to_vec()).is_err() {
                    break;
                }
            }
        });

        rx
    }

    /// Flushes state if dirty, stops the worker and flusher threads, and
    /// releases the repo lock. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self
            .0
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        repo::close(&self.0.path, &self.0.state)?;

        if let Some(stop) = self.0.flusher_stop.lock().expect("lock is poisoned").take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.0.flusher_join.lock().expect("lock is poisoned").take() {
            let _ = join.join();
        }

        // Dropping the worker handle closes the channel's sending side,
        // which ends the worker thread's recv() loop.
        self.0.worker.lock().expect("lock is poisoned").take();
        if let Some(join) = self.0.worker_join.lock().expect("lock is poisoned").take() {
            let _ = join.join();
        }

        self.0.lock.lock().expect("lock is poisoned").take();

        Ok(())
    }

    fn locator_for(&self, key: &[u8]) -> Result<ValueLocator> {
        let bytes = self
            .0
            .index
            .get(&namespaced_user_key(key))?
            .ok_or(Error::NotFound)?;
        decode_locator(&bytes)
    }

    fn read_locator(&self, locator: &ValueLocator) -> Result<Vec<u8>> {
        SegmentManager::read_at(
            &self.0.path,
            locator.segment_id,
            locator.offset,
            locator.length,
        )
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            let _ = repo::close(&self.path, &self.state);
        }
    }
}

fn closed_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        "store is closed",
    ))
}

fn decode_locator(bytes: &[u8]) -> Result<ValueLocator> {
    let mut reader = bytes;
    Ok(ValueLocator::decode_from(&mut reader)?)
}

fn spawn_flusher(
    path: PathBuf,
    state: Arc<SystemState>,
    stop: mpsc::Receiver<()>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        match stop.recv_timeout(FLUSH_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if let Err(e) = state.flush_if_dirty(&path) {
                    log::warn!("periodic sys state flush failed: {e}");
                }
            }
        }
    })
}

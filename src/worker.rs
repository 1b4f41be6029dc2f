// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The single-writer pipeline from client `put` calls to disk.
//!
//! Exactly one worker thread (see [`spawn`]) runs per open repo. It is the
//! only component that writes to the active segment and the only one that
//! advances `ActiveID`/`NextID`. Clients submit requests over a rendezvous
//! channel and block on a one-shot reply.

use crate::{
    aux_keys::{self, namespaced_user_key},
    coding::Encode,
    index::{Index, WriteOp},
    locator::ValueLocator,
    record::{self, RecordFormat},
    segment::SegmentManager,
    state::SystemState,
    Result,
};
use std::sync::{
    atomic::Ordering,
    mpsc::{self, Receiver, Sender},
    Arc,
};

/// A put request plus the channel the worker replies on.
struct PutRequest {
    key: Vec<u8>,
    value: Vec<u8>,
    reply: mpsc::Sender<Result<()>>,
}

/// Handle held by [`crate::store::Store`] to submit puts to the worker
/// thread.
#[derive(Clone)]
pub struct AppendWorkerHandle {
    sender: Sender<PutRequest>,
}

impl AppendWorkerHandle {
    /// Submits a put and blocks until the worker has committed (or
    /// failed) it.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        // A send error means the worker thread has shut down; surface it
        // as an ordinary I/O-shaped error rather than panicking.
        self.sender
            .send(PutRequest {
                key,
                value,
                reply: reply_tx,
            })
            .map_err(|_| {
                crate::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "append worker has shut down",
                ))
            })?;

        reply_rx.recv().map_err(|_| {
            crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "append worker dropped the reply channel",
            ))
        })?
    }
}

/// Spawns the append worker thread, returning a handle clients use to
/// submit puts and a join handle for shutdown.
pub fn spawn(
    repo_path: std::path::PathBuf,
    format: RecordFormat,
    max_log_file_size: u64,
    mut segments: SegmentManager,
    index: Arc<dyn Index>,
    state: Arc<SystemState>,
) -> (AppendWorkerHandle, std::thread::JoinHandle<()>) {
    let (tx, rx): (Sender<PutRequest>, Receiver<PutRequest>) = mpsc::channel();

    let join = std::thread::spawn(move || {
        while let Ok(req) = rx.recv() {
            let result = append(
                &repo_path,
                format,
                max_log_file_size,
                &mut segments,
                index.as_ref(),
                &state,
                &req.key,
                &req.value,
            );
            // The caller may have stopped listening (e.g. timed out); a
            // failed send here is not this worker's problem.
            let _ = req.reply.send(result);
        }
        log::info!("append worker for {} shutting down", repo_path.display());
    });

    (AppendWorkerHandle { sender: tx }, join)
}

#[allow(clippy::too_many_arguments)]
fn append(
    repo_path: &std::path::Path,
    format: RecordFormat,
    max_log_file_size: u64,
    segments: &mut SegmentManager,
    index: &dyn Index,
    state: &SystemState,
    key: &[u8],
    value: &[u8],
) -> Result<()> {
    let namespaced_key = namespaced_user_key(key);

    // 1. Read any prior locator, for trash accounting. Not found is normal.
    let prior = index
        .get(&namespaced_key)?
        .map(|bytes| decode_locator(&bytes))
        .transpose()?;

    // 2. Snapshot the active segment id and its current size.
    let active_id = segments.active_id();
    let wsize = segments.size()?;

    // 3. Encode the record and append it.
    let (bytes, ks, vs) = record::encode(format, key, value)?;
    let written = segments.append(&bytes)? as u64;

    // 4. Build the locator. The value's user-visible bytes start past the
    // header, the key, and (for CrcFramed) the CRC prefix.
    let locator = ValueLocator {
        segment_id: active_id,
        offset: wsize
            + crate::record::HEADER_SIZE as u64
            + u64::from(ks)
            + u64::from(record::value_start_offset(format)),
        length: record::visible_len(format, vs),
        occupied: written as u32,
    };

    // 5. Build the index batch.
    let mut ops = vec![
        WriteOp::Put(namespaced_key, locator.encode_into_vec()?),
        WriteOp::Put(
            aux_keys::vl_key(active_id).into_bytes(),
            key.to_vec(),
        ),
    ];
    if let Some(prior) = prior {
        ops.push(WriteOp::Put(
            aux_keys::vld_key(prior.segment_id).into_bytes(),
            key.to_vec(),
        ));
    }

    // 6. Commit the batch atomically.
    index.write_batch(ops)?;

    // 7. Update counters.
    state.k_total.fetch_add(1, Ordering::SeqCst);
    state.used.fetch_add(written, Ordering::SeqCst);
    if let Some(prior) = prior {
        state
            .trash
            .fetch_add(u64::from(prior.occupied), Ordering::SeqCst);
    }
    state.mark_dirty();

    // 8. Roll over if the active segment has met its size limit.
    if wsize + written >= max_log_file_size {
        let next_id = state.next_id.load(Ordering::SeqCst);
        segments.rollover(next_id)?;

        state
            .active_id
            .compare_exchange(active_id, next_id, Ordering::SeqCst, Ordering::SeqCst)
            .ok();
        state.next_id.fetch_add(1, Ordering::SeqCst);
        state.mark_dirty();

        log::info!(
            "{} rolled over to segment {next_id:08}",
            repo_path.display()
        );
    }

    Ok(())
}

fn decode_locator(bytes: &[u8]) -> Result<ValueLocator> {
    use crate::coding::Decode;
    let mut reader = bytes;
    Ok(ValueLocator::decode_from(&mut reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BTreeIndex;

    #[test]
    fn crc_framed_append_locates_the_value_bytes_exactly() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join(crate::segment::VLOG_DIR))?;

        let mut segments = SegmentManager::open_active(dir.path(), 0)?;
        let index = BTreeIndex::open(dir.path())?;
        let state = SystemState::default();

        append(
            dir.path(),
            RecordFormat::CrcFramed,
            u64::MAX,
            &mut segments,
            &index,
            &state,
            b"k",
            b"hello world",
        )?;

        let bytes = index
            .get(&namespaced_user_key(b"k"))?
            .expect("key was just appended");
        let locator = decode_locator(&bytes)?;

        // The locator must point past the CRC prefix: length 11 (the
        // visible value), not 15 (value + crc), and offset must skip the
        // 4 crc bytes that sit between the key and the value.
        assert_eq!(locator.length, 11);

        let read = SegmentManager::read_at(dir.path(), locator.segment_id, locator.offset, locator.length)?;
        assert_eq!(read, b"hello world");

        Ok(())
    }
}

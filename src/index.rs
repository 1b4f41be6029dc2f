// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The ordered byte-keyed store mutcask's core consumes.
//!
//! The real ordered-index engine backing a production deployment is treated
//! as an external, out-of-scope collaborator — the core only needs the
//! contract in [`Index`]. [`BTreeIndex`] is a thin, in-process reference
//! implementation (an in-memory [`BTreeMap`] behind a durable append log)
//! rather than a production LSM engine.

use crate::error::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    io::{BufReader, Read, Write},
    path::{Path, PathBuf},
    sync::RwLock,
};

/// Subdirectory, relative to the repo root, holding the index's files.
pub const KEYS_DIR: &str = "keys";

const LOG_FILE: &str = "index.log";

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;

/// A single mutation in an atomic [`Index::write_batch`].
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Insert or overwrite `key` with `value`.
    Put(Vec<u8>, Vec<u8>),
    /// Remove `key`, if present.
    Delete(Vec<u8>),
}

/// The ordered byte-keyed store contract mutcask's core depends on.
///
/// Implementations must support point get/put/delete, an atomic batch, a
/// prefix iterator yielding entries in key order, and a full ordered scan.
pub trait Index: Send + Sync {
    /// Looks up `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Returns `true` if `key` is present.
    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Inserts or overwrites a single key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write_batch(vec![WriteOp::Put(key.to_vec(), value.to_vec())])
    }

    /// Removes a single key, if present.
    fn delete(&self, key: &[u8]) -> Result<()> {
        self.write_batch(vec![WriteOp::Delete(key.to_vec())])
    }

    /// Applies a batch of operations atomically.
    fn write_batch(&self, ops: Vec<WriteOp>) -> Result<()>;

    /// Iterates over all entries whose key starts with `prefix`, in key
    /// order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Iterates over every key in the index, in key order.
    fn iter_all(&self) -> Result<Vec<Vec<u8>>>;
}

/// In-memory, durably-logged reference implementation of [`Index`].
///
/// Every mutation is appended to `keys/index.log` before the in-memory
/// `BTreeMap` is updated, and the log is replayed in full at open time —
/// this is the ordered-index storage living under `keys/`.
pub struct BTreeIndex {
    log: RwLock<File>,
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl BTreeIndex {
    /// Opens (creating if missing) the index log under `repo_path/keys/`
    /// and replays it into memory.
    pub fn open(repo_path: &Path) -> Result<Self> {
        let dir = repo_path.join(KEYS_DIR);
        std::fs::create_dir_all(&dir)?;

        let log_path = dir.join(LOG_FILE);
        let map = Self::replay(&log_path)?;

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            log: RwLock::new(log),
            map: RwLock::new(map),
        })
    }

    fn replay(log_path: &PathBuf) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut map = BTreeMap::new();

        let Ok(file) = File::open(log_path) else {
            return Ok(map);
        };
        let mut reader = BufReader::new(file);

        loop {
            let Ok(tag) = reader.read_u8() else {
                break;
            };

            match tag {
                OP_PUT => {
                    let klen = reader.read_u32::<LittleEndian>()? as usize;
                    let mut key = vec![0u8; klen];
                    reader.read_exact(&mut key)?;

                    let vlen = reader.read_u32::<LittleEndian>()? as usize;
                    let mut value = vec![0u8; vlen];
                    reader.read_exact(&mut value)?;

                    map.insert(key, value);
                }
                OP_DELETE => {
                    let klen = reader.read_u32::<LittleEndian>()? as usize;
                    let mut key = vec![0u8; klen];
                    reader.read_exact(&mut key)?;
                    map.remove(&key);
                }
                _ => break,
            }
        }

        Ok(map)
    }

    fn append_op(writer: &mut File, op: &WriteOp) -> Result<()> {
        match op {
            WriteOp::Put(key, value) => {
                writer.write_u8(OP_PUT)?;
                writer.write_u32::<LittleEndian>(key.len() as u32)?;
                writer.write_all(key)?;
                writer.write_u32::<LittleEndian>(value.len() as u32)?;
                writer.write_all(value)?;
            }
            WriteOp::Delete(key) => {
                writer.write_u8(OP_DELETE)?;
                writer.write_u32::<LittleEndian>(key.len() as u32)?;
                writer.write_all(key)?;
            }
        }
        Ok(())
    }
}

impl Index for BTreeIndex {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.read().expect("lock is poisoned").get(key).cloned())
    }

    fn write_batch(&self, ops: Vec<WriteOp>) -> Result<()> {
        // Hold both locks for the whole batch: the log write and the
        // in-memory apply must be indivisible from a reader's perspective.
        let mut log = self.log.write().expect("lock is poisoned");
        let mut map = self.map.write().expect("lock is poisoned");

        for op in &ops {
            Self::append_op(&mut log, op)?;
        }
        log.sync_data()?;

        for op in ops {
            match op {
                WriteOp::Put(key, value) => {
                    map.insert(key, value);
                }
                WriteOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .map
            .read()
            .expect("lock is poisoned")
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn iter_all(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .map
            .read()
            .expect("lock is poisoned")
            .keys()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let index = BTreeIndex::open(dir.path())?;

        index.put(b"a", b"1")?;
        assert_eq!(index.get(b"a")?, Some(b"1".to_vec()));
        assert!(index.has(b"a")?);

        index.delete(b"a")?;
        assert_eq!(index.get(b"a")?, None);
        assert!(!index.has(b"a")?);
        Ok(())
    }

    #[test]
    fn survives_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;

        {
            let index = BTreeIndex::open(dir.path())?;
            index.put(b"a", b"1")?;
            index.put(b"b", b"2")?;
            index.delete(b"a")?;
        }

        let index = BTreeIndex::open(dir.path())?;
        assert_eq!(index.get(b"a")?, None);
        assert_eq!(index.get(b"b")?, Some(b"2".to_vec()));
        Ok(())
    }

    #[test]
    fn prefix_and_full_scan_are_ordered() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let index = BTreeIndex::open(dir.path())?;

        for k in ["a1", "a2", "b1"] {
            index.put(k.as_bytes(), b"v")?;
        }

        let prefixed = index.iter_prefix(b"a")?;
        assert_eq!(
            prefixed.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
            vec![b"a1".to_vec(), b"a2".to_vec()]
        );

        let all = index.iter_all()?;
        assert_eq!(all, vec![b"a1".to_vec(), b"a2".to_vec(), b"b1".to_vec()]);
        Ok(())
    }
}

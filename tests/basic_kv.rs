use mutcask::{Config, Store};
use test_log::test;

/// Putting the reference CID then reading it back returns the same bytes;
/// size is the value length.
#[test]
fn open_put_get_size_the_reference_cid_pair() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    let key = b"Qmc35RPEYrW3Mj1mki6thkAjx6a1ZFkU3UYxAyFhMmngr2";
    store.put(key, b"124567")?;

    assert_eq!(store.get(key)?, b"124567");
    assert_eq!(store.size(key)?, 6);

    store.close()?;
    Ok(())
}

/// An empty value is a legitimate value, not an absence — `Get` must
/// return empty bytes, not `NotFound`.
#[test]
fn put_with_empty_value_is_gettable_and_has_zero_size() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    store.put(b"k", b"")?;

    assert_eq!(store.get(b"k")?, b"");
    assert_eq!(store.size(b"k")?, 0);
    assert!(store.has(b"k")?);

    store.close()?;
    Ok(())
}

#[test]
fn basic_kv() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    let items = ["a", "b", "c", "d", "e"];

    for key in &items {
        let value = key.repeat(10_000);
        store.put(key.as_bytes(), value.as_bytes())?;
    }

    for key in &items {
        let value = store.get(key.as_bytes())?;
        assert_eq!(value, key.repeat(10_000).into_bytes());
        assert_eq!(store.size(key.as_bytes())?, 10_000);
        assert!(store.has(key.as_bytes())?);
    }

    store.close()?;
    Ok(())
}

#[test]
fn overwrite_replaces_value_and_marks_prior_as_trash() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    store.put(b"k", b"first")?;
    store.put(b"k", b"second-and-longer")?;

    assert_eq!(store.get(b"k")?, b"second-and-longer");

    store.close()?;
    Ok(())
}

#[test]
fn delete_is_idempotent_and_removes_the_key() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    store.put(b"k", b"v")?;
    assert!(store.has(b"k")?);

    store.delete(b"k")?;
    assert!(!store.has(b"k")?);
    assert!(store.get(b"k").is_err());

    // Deleting an absent key is not an error.
    store.delete(b"k")?;

    store.close()?;
    Ok(())
}

#[test]
fn checksum_matches_crc32_of_the_value() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    store.put(b"k", b"hello world")?;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(b"hello world");
    assert_eq!(store.checksum(b"k")?, hasher.finalize());

    store.close()?;
    Ok(())
}

#[test]
fn scan_keys_respects_prefix_and_order() -> mutcask::Result<()> {
    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    for key in ["user:1", "user:2", "user:3", "order:1"] {
        store.put(key.as_bytes(), b"v")?;
    }

    let users = store.scan_keys(b"user:", 0)?;
    assert_eq!(
        users,
        vec![
            b"user:1".to_vec(),
            b"user:2".to_vec(),
            b"user:3".to_vec()
        ]
    );

    store.close()?;
    Ok(())
}

#[test]
fn all_keys_chan_streams_every_user_key_and_hides_aux_keys() -> mutcask::Result<()> {
    use std::sync::{atomic::AtomicBool, Arc};

    let folder = tempfile::tempdir()?;
    let store = Store::open(Config::new().path(folder.path()))?;

    for key in ["a", "b", "c"] {
        store.put(key.as_bytes(), b"v")?;
    }

    let rx = store.all_keys_chan(Arc::new(AtomicBool::new(false)));
    let mut keys: Vec<_> = rx.iter().collect();
    keys.sort();

    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    store.close()?;
    Ok(())
}

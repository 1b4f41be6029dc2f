use criterion::{criterion_group, criterion_main, Criterion};
use mutcask::{Config, Store};
use rand::RngCore;

fn get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    let sizes = [
        128,               // 128 B
        1_024,             // 1 KiB
        16_000,            // 16 KiB
        64_000,            // 64 KiB
        256_000,           // 256 KiB
        1_024 * 1_024,     // 1 MiB
        4 * 1_024 * 1_024, // 4 MiB
    ];

    let folder = tempfile::tempdir().unwrap();
    let store = Store::open(Config::new().path(folder.path())).unwrap();

    let mut rng = rand::thread_rng();

    for size in sizes {
        let key = size.to_string();
        let mut data = vec![0u8; size];
        rng.fill_bytes(&mut data);
        store.put(key.as_bytes(), &data).unwrap();
    }

    for size in sizes {
        let key = size.to_string();
        group.bench_function(format!("{size} bytes"), |b| {
            b.iter(|| {
                store.get(key.as_bytes()).unwrap();
            })
        });
    }

    store.close().unwrap();
}

fn put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");

    let sizes = [128, 1_024, 16_000, 64_000];

    for size in sizes {
        let folder = tempfile::tempdir().unwrap();
        let store = Store::open(Config::new().path(folder.path())).unwrap();

        let mut rng = rand::thread_rng();
        let mut data = vec![0u8; size];
        rng.fill_bytes(&mut data);

        let mut i: u64 = 0;

        group.bench_function(format!("{size} bytes"), |b| {
            b.iter(|| {
                let key = i.to_le_bytes();
                store.put(&key, &data).unwrap();
                i += 1;
            })
        });

        store.close().unwrap();
    }
}

criterion_group!(benches, get, put);
criterion_main!(benches);

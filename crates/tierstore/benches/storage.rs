use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::TempDir;
use tierstore::BlobStore;

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");
    group.sample_size(50);
    group.throughput(Throughput::Bytes(64 * 1024));

    group.bench_function("write_64kb", |b| {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let data = vec![b'x'; 64 * 1024];

        let mut counter = 0u64;
        b.iter(|| {
            let key = format!("key{}", counter % 100);
            black_box(store.write("bench", &key, &data).unwrap());
            counter += 1;
        });
    });
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    group.sample_size(50);
    group.throughput(Throughput::Bytes(64 * 1024));

    group.bench_function("read_64kb", |b| {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        let data = vec![b'x'; 64 * 1024];

        // Pre-populate with 100 blobs
        for i in 0..100 {
            store.write("bench", &format!("key{}", i), &data).unwrap();
        }

        b.iter(|| {
            black_box(store.read("bench", "key50").unwrap());
        });
    });
    group.finish();
}

fn bench_exists(c: &mut Criterion) {
    let mut group = c.benchmark_group("exists");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("exists_hit_and_miss", |b| {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        store.write("bench", "present", b"x").unwrap();

        let mut counter = 0u64;
        b.iter(|| {
            let key = if counter % 2 == 0 { "present" } else { "absent" };
            black_box(store.exists("bench", key).unwrap());
            counter += 1;
        });
    });
    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_exists);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use bigarray::{AccessMode, ByteOrder, MappedMemoryModel, NoContext, PoolMemoryModel};

fn bench_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");
    group.throughput(Throughput::Elements(100_000));
    group.bench_function("pool_i64_100k", |b| {
        let model = PoolMemoryModel::native();
        b.iter(|| {
            let mut a = model.new_array::<i64>(0).unwrap();
            for i in 0..100_000 {
                a.push(black_box(i)).unwrap();
            }
            a
        });
    });
    group.finish();
}

fn bench_bulk_copy(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_copy");
    const N: u64 = 1_000_000;
    group.throughput(Throughput::Bytes(N * 8));

    let model = PoolMemoryModel::native();
    let src = model.new_array::<i64>(N).unwrap();
    group.bench_function("pool_to_pool_i64_1m", |b| {
        let mut dst = model.new_array::<i64>(N).unwrap();
        b.iter(|| dst.copy_from(&NoContext, &src).unwrap());
    });

    let dir = tempfile::tempdir().unwrap();
    let mapped = MappedMemoryModel::new(dir.path(), ByteOrder::NATIVE).unwrap();
    group.bench_function("pool_to_mapped_i64_1m", |b| {
        let mut dst = mapped.new_unresizable::<i64>(N).unwrap();
        b.iter(|| dst.copy_from(&NoContext, &src).unwrap());
    });
    group.finish();
}

fn bench_buffer_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_scan");
    const N: u64 = 1_000_000;
    group.throughput(Throughput::Elements(N));

    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i32>(N).unwrap();
    for i in 0..N {
        a.set(i, i as i32).unwrap();
    }
    group.bench_function("i32_1m_window_64k", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            let mut buf = a.buffer(AccessMode::Read, 65_536).unwrap();
            buf.map(0).unwrap();
            while buf.has_data() {
                for &v in buf.data() {
                    sum += v as i64;
                }
                buf.map_next().unwrap();
            }
            sum
        });
    });
    group.finish();
}

fn bench_bit_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("bit_fill");
    const N: u64 = 10_000_000;
    group.throughput(Throughput::Elements(N));

    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(N).unwrap();
    group.bench_function("10m_bits", |b| {
        b.iter(|| a.fill(black_box(1), N - 2, true).unwrap());
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_push,
    bench_bulk_copy,
    bench_buffer_scan,
    bench_bit_fill
);
criterion_main!(benches);

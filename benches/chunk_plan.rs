//! Benchmarks for range parsing, chunk planning and chunk trimming.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use reelstream::streaming::{parse_range_header, ChunkPlan, DEFAULT_CHUNK_SIZE_CAP};

const GIB: u64 = 1024 * 1024 * 1024;

fn bench_parse_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_range");
    for header in ["bytes=0-", "bytes=1048576-2097151", "bytes=-500"] {
        group.bench_function(header, |b| {
            b.iter(|| black_box(parse_range_header(black_box(header), 4 * GIB)))
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_plan");
    // Typical seek positions into a 4 GiB file
    for (name, from, until) in [
        ("head", 0, 65_535),
        ("middle", 2 * GIB + 12_345, 3 * GIB),
        ("tail", 4 * GIB - 10, 4 * GIB - 1),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let plan = ChunkPlan::plan(from, until, 4 * GIB, DEFAULT_CHUNK_SIZE_CAP).unwrap();
                black_box(plan.parts().count())
            })
        });
    }
    group.finish();
}

/// Trimming every planned chunk of a 64 MiB range.
fn bench_trim(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk_trim");
    let chunk = Bytes::from(vec![0u8; DEFAULT_CHUNK_SIZE_CAP as usize]);
    let plan = ChunkPlan::plan(1_000, 64 * 1024 * 1024 + 999, GIB, DEFAULT_CHUNK_SIZE_CAP).unwrap();

    group.throughput(Throughput::Bytes(plan.requested_length));
    group.bench_function("slice", |b| {
        b.iter(|| {
            let mut total = 0usize;
            for part in plan.parts() {
                total += black_box(chunk.slice(part.keep.clone())).len();
            }
            black_box(total)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_parse_range, bench_plan, bench_trim);
criterion_main!(benches);

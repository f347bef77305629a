//! Benchmark chunked content comparison across chunk sizes and content sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediashift::conversion::ContentEqualityChecker;
use std::io::Cursor;

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn bench_identical_streams(c: &mut Criterion) {
    let mut group = c.benchmark_group("identical_streams");

    for len in [64 * 1024, 1024 * 1024, 8 * 1024 * 1024] {
        let data = content(len);
        group.throughput(Throughput::Bytes(len as u64));

        for chunk in [1024, 8192, 65536] {
            let checker = ContentEqualityChecker::new(chunk);
            group.bench_with_input(
                BenchmarkId::new(format!("chunk_{chunk}"), len),
                &data,
                |b, data| {
                    b.iter(|| {
                        let mut left = Cursor::new(data.as_slice());
                        let mut right = Cursor::new(data.as_slice());
                        checker
                            .streams_equal(black_box(&mut left), black_box(&mut right))
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_mismatch_position(c: &mut Criterion) {
    let mut group = c.benchmark_group("mismatch_position");
    let len = 1024 * 1024;
    let data = content(len);
    let checker = ContentEqualityChecker::default();

    for (label, position) in [("first_byte", 0), ("middle", len / 2), ("last_byte", len - 1)] {
        let mut other = data.clone();
        other[position] ^= 0xff;

        group.bench_function(label, |b| {
            b.iter(|| {
                let mut left = Cursor::new(data.as_slice());
                let mut right = Cursor::new(other.as_slice());
                checker.streams_equal(&mut left, &mut right).unwrap()
            });
        });
    }

    // Length mismatch is rejected before any content is read.
    let shorter = data[..len - 1].to_vec();
    group.bench_function("length_mismatch", |b| {
        b.iter(|| {
            let mut left = Cursor::new(data.as_slice());
            let mut right = Cursor::new(shorter.as_slice());
            checker.streams_equal(&mut left, &mut right).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_identical_streams, bench_mismatch_position);
criterion_main!(benches);

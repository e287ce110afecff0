//! Upload benchmarks

use chunkr::upload::{split_ranges, Blob, UploadSource};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn benchmark_split_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_ranges");

    for total in [6 * 1024 * 1024u64, 1024 * 1024 * 1024, 64 * 1024 * 1024 * 1024].iter() {
        group.bench_with_input(format!("{}_bytes", total), total, |b, &total| {
            b.iter(|| black_box(split_ranges(black_box(total), 6 * 1024 * 1024)));
        });
    }

    group.finish();
}

fn benchmark_blob_slicing(c: &mut Criterion) {
    let mut group = c.benchmark_group("blob_slicing");

    for size in [1024 * 1024usize, 16 * 1024 * 1024].iter() {
        let blob = Blob::new(vec![0u8; *size]);
        let ranges = split_ranges(*size as u64, 256 * 1024);

        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(format!("{}_bytes", size), &ranges, |b, ranges| {
            b.iter(|| {
                for range in ranges {
                    black_box(blob.slice(range.start..range.end));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_split_ranges, benchmark_blob_slicing);
criterion_main!(benches);

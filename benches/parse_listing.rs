//! Benchmarks for directory-listing parsers

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ftp_rs::listing::{ListingMode, parse_listing};

fn unix_listing(entries: usize) -> String {
    let mut text = String::from("total 4096\r\n");
    for i in 0..entries {
        text.push_str(&format!(
            "-rw-r--r--   1 ftp      ftp      {:>8} Mar {:>2}  2021 file-{:05}.dat\r\n",
            i * 512,
            i % 28 + 1,
            i
        ));
    }
    text
}

fn mlsd_listing(entries: usize) -> String {
    let mut text = String::new();
    for i in 0..entries {
        text.push_str(&format!(
            "type=file;size={};modify=20210315{:02}{:02}00;unix.mode=0644; file-{:05}.dat\r\n",
            i * 512,
            i % 24,
            i % 60,
            i
        ));
    }
    text
}

fn bench_listing_parsers(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing_parser");

    for count in [100usize, 1_000, 10_000] {
        let unix = unix_listing(count);
        group.throughput(Throughput::Bytes(unix.len() as u64));
        group.bench_with_input(BenchmarkId::new("unix", count), &unix, |b, text| {
            b.iter(|| black_box(parse_listing(text, ListingMode::List)))
        });

        let mlsd = mlsd_listing(count);
        group.throughput(Throughput::Bytes(mlsd.len() as u64));
        group.bench_with_input(BenchmarkId::new("mlsx", count), &mlsd, |b, text| {
            b.iter(|| black_box(parse_listing(text, ListingMode::Mlsd)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_listing_parsers);
criterion_main!(benches);

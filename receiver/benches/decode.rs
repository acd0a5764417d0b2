//! Line decoder benchmarks
//!
//! Throughput of splitting an in-memory stream into records, for short and
//! long lines and for the boxed `Decoder` path the receiver uses.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::io::Cursor;
use virta_receiver::decode::{Decoder, LineDecoder, Lines};

fn make_stream(lines: usize, width: usize) -> Vec<u8> {
    let line = "x".repeat(width);
    (0..lines).flat_map(|_| format!("{line}\n").into_bytes()).collect()
}

fn bench_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("lines");

    for width in [16, 256, 4096] {
        let stream = make_stream(10_000, width);
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_function(format!("width_{width}"), |b| {
            b.iter(|| {
                let count = Lines::new(stream.as_slice()).filter(Result::is_ok).count();
                black_box(count)
            })
        });
    }

    group.finish();
}

fn bench_decoder_trait(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder");
    let stream = make_stream(10_000, 64);
    group.throughput(Throughput::Elements(10_000));

    let decoder = LineDecoder::new().with_max_line_length(1024);
    group.bench_function("boxed_10k", |b| {
        b.iter(|| {
            let mut source = Cursor::new(stream.as_slice());
            let count = decoder.decode(&mut source).filter(Result::is_ok).count();
            black_box(count)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_lines, bench_decoder_trait);
criterion_main!(benches);

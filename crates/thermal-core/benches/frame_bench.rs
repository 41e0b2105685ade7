//! Criterion benchmarks for the device frame codec.
//!
//! Run with:
//! ```bash
//! cargo bench --package thermal-core --bench frame_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use thermal_core::{decode_frame, encode_frame, Frame, PAYLOAD_SIZE};

fn bench_encode(c: &mut Criterion) {
    let short = 42i32.to_le_bytes();
    let full = [0xA5u8; PAYLOAD_SIZE];

    let mut group = c.benchmark_group("encode_frame");
    group.bench_function("i32_payload", |b| {
        b.iter(|| encode_frame(black_box(1), black_box(&short)))
    });
    group.bench_function("full_payload", |b| {
        b.iter(|| encode_frame(black_box(2), black_box(&full)))
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let bytes = Frame::with_i32(3, 88).to_bytes();

    c.bench_function("decode_frame", |b| {
        b.iter(|| decode_frame(black_box(&bytes)).unwrap())
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);

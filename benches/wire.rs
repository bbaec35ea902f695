use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use ledsock::network::codec::{hton64, htond, ntoh64, ntohd};
use ledsock::network::wire::{classify, encode_pixel_frame, StandardHeader};

fn bench_codec(c: &mut Criterion) {
    c.bench_function("u64_round_trip", |b| {
        b.iter(|| ntoh64(hton64(black_box(0x0102_0304_0506_0708))))
    });
    c.bench_function("f64_round_trip", |b| {
        b.iter(|| ntohd(htond(black_box(1234.5678))))
    });
}

fn bench_header(c: &mut Criterion) {
    let frame = encode_pixel_frame(0, 1_700_000_000, 250_000, &[0u8; 3 * 300]);
    c.bench_function("classify_and_parse_header", |b| {
        b.iter(|| {
            let mut prefix = [0u8; 4];
            prefix.copy_from_slice(&frame[..4]);
            (classify(black_box(prefix)), StandardHeader::parse(black_box(&frame)))
        })
    });
}

criterion_group!(benches, bench_codec, bench_header);
criterion_main!(benches);

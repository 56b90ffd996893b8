//! Criterion benchmarks for the detection result grammar.
//!
//! Run with:
//! ```bash
//! cargo bench --package framelink-core --bench grammar_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use framelink_core::{decode_detections, encode_detections, BoundingBox, Detection};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_detections(n: u32) -> Vec<Detection> {
    (0..n)
        .map(|i| {
            let x = (i as i32 * 37) % 1200;
            let y = (i as i32 * 53) % 700;
            Detection::new(i % 80, 0.25 + (i % 75) as f32 / 100.0, BoundingBox::new(x, y, x + 80, y + 60))
        })
        .collect()
}

const SET_SIZES: [u32; 4] = [0, 1, 10, 100];

// ── Benchmark groups ──────────────────────────────────────────────────────────

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_detections");
    for n in SET_SIZES {
        let detections = make_detections(n);
        group.bench_with_input(BenchmarkId::new("detections", n), &detections, |b, d| {
            b.iter(|| encode_detections(black_box(d)))
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_detections");
    for n in SET_SIZES {
        let text = encode_detections(&make_detections(n));
        group.bench_with_input(BenchmarkId::new("detections", n), &text, |b, text| {
            b.iter(|| decode_detections(black_box(text)).expect("decode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);

//! Benchmark: bit length set composition for array-heavy layouts.
//! Variable-length arrays dominate the cost of bit length analysis because
//! every capacity step contributes its own set of lengths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dsdl_frontend::BitLengthSet;

fn bit_length_sets(c: &mut Criterion) {
    c.bench_function("variable_array_256_bytes", |b| {
        b.iter(|| {
            let element = BitLengthSet::singleton(8);
            let tag = BitLengthSet::singleton(9);
            black_box(tag.concatenate(&element.repeat_range(black_box(256))))
        })
    });

    c.bench_function("nested_variable_arrays", |b| {
        b.iter(|| {
            // uint8[<=2] nested in a fixed array of 8.
            let inner = BitLengthSet::singleton(2)
                .concatenate(&BitLengthSet::singleton(8).repeat_range(2));
            let outer = inner.repeat(black_box(8));
            black_box((outer.min(), outer.max()))
        })
    });

    c.bench_function("structure_fold", |b| {
        let fields: Vec<BitLengthSet> = (1..=32).map(BitLengthSet::singleton).collect();
        b.iter(|| {
            let total = fields
                .iter()
                .fold(BitLengthSet::singleton(0), |acc, s| acc.concatenate(s));
            black_box(total.is_aligned_at_byte())
        })
    });
}

criterion_group!(benches, bit_length_sets);
criterion_main!(benches);

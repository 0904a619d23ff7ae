use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    link::bench_classify,
    link::bench_pump_text,
    link::bench_pump_binary
);
criterion_main!(benches);

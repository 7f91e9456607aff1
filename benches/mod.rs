use criterion::{criterion_group, criterion_main};

mod channel;

criterion_group!(
    benches,
    channel::frame::bench_line_framing,
    channel::frame::bench_sentinel_framing,
    channel::session::bench_parse_commands,
    channel::session::bench_feed_line
);
criterion_main!(benches);

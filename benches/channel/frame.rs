use boardlink::channel::TransportKind;
use boardlink::channel::frame::{CommandBuffer, DEFAULT_SENTINEL};
use criterion::{Criterion, Throughput};
use std::hint::black_box;

const SCRIPT: &[u8] = b"led.on()\r\nrgb(65535, 0, 1024)\r\nset_pixel(12, 0, 255, 0)\r\n\
update_oled([\"Conexao\", \"Recebida!\"])\r\nplay_tone(440, 0.1)\r\nclear_matrix()\r\n";

pub fn bench_line_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_framing");
    group.throughput(Throughput::Bytes(SCRIPT.len() as u64));

    group.bench_function("whole_chunk", |b| {
        let mut buffer = CommandBuffer::new(TransportKind::Tcp);
        b.iter(|| buffer.line_frames(black_box(SCRIPT)).count())
    });

    group.bench_function("byte_at_a_time", |b| {
        let mut buffer = CommandBuffer::new(TransportKind::Uart);
        b.iter(|| {
            SCRIPT
                .iter()
                .filter_map(|&byte| buffer.push_line_byte(black_box(byte)))
                .count()
        })
    });
    group.finish();
}

pub fn bench_sentinel_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("sentinel_framing");
    let command = "neopixel(\"0:255,0,0;1:255,0,0;2:255,0,0;3:255,0,0;4:255,0,0;\
                   5:0,255,0;6:0,255,0;7:0,255,0;8:0,255,0;9:0,255,0\")";
    group.throughput(Throughput::Bytes(command.len() as u64));

    // 20-byte chunks: the default ATT payload.
    group.bench_function("20_byte_chunks", |b| {
        let mut buffer = CommandBuffer::new(TransportKind::Ble);
        let sentinel = DEFAULT_SENTINEL.as_bytes();
        b.iter(|| {
            for chunk in command.as_bytes().chunks(20) {
                black_box(buffer.push_chunk(chunk, sentinel));
            }
            buffer.push_chunk(sentinel, sentinel)
        })
    });
    group.finish();
}

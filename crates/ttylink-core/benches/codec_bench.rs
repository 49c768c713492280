//! Criterion benchmarks for the ttylink frame codec and escape multiplexer.
//!
//! Both sit on the per-keystroke and per-output-chunk hot path, so they are
//! measured with payload sizes typical of interactive use (a few bytes) and
//! of bulk output (a 4 KiB read).
//!
//! Run with:
//! ```bash
//! cargo bench --package ttylink-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ttylink_core::protocol::messages::ResizeTerminalDto;
use ttylink_core::{
    decode_server_message, encode_client_message, ClientMessage, EscapeMultiplexer,
    ESCAPE_TRIGGER,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn bulk_output(len: usize) -> Vec<u8> {
    b"0".iter()
        .copied()
        .chain((0..len).map(|i| b'a' + (i % 26) as u8))
        .collect()
}

fn chunk_with_trigger_at(len: usize, pos: usize) -> Vec<u8> {
    let mut chunk: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
    chunk[pos] = ESCAPE_TRIGGER;
    chunk[pos + 1] = b't';
    chunk
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `encode_client_message` for the frames sent during a session.
fn bench_encode(c: &mut Criterion) {
    let messages: &[(&str, ClientMessage)] = &[
        ("Input(1)", ClientMessage::Input(b"a".to_vec())),
        ("Input(4096)", ClientMessage::Input(vec![b'x'; 4096])),
        (
            "ResizeTerminal",
            ClientMessage::ResizeTerminal(ResizeTerminalDto {
                columns: 211,
                rows: 58,
            }),
        ),
        ("DetectBaudrate", ClientMessage::DetectBaudrate),
    ];

    let mut group = c.benchmark_group("encode_client_message");
    for (name, msg) in messages {
        group.bench_with_input(BenchmarkId::new("msg", name), msg, |b, msg| {
            b.iter(|| encode_client_message(black_box(msg)).expect("encode must succeed"))
        });
    }
    group.finish();
}

/// Benchmarks `decode_server_message` for output and control frames.
fn bench_decode(c: &mut Criterion) {
    let frames: &[(&str, Vec<u8>)] = &[
        ("Output(16)", bulk_output(16)),
        ("Output(4096)", bulk_output(4096)),
        ("SetWindowTitle", b"1user@host: ~".to_vec()),
        ("DetectedBaudrate", b"B115200 114943".to_vec()),
    ];

    let mut group = c.benchmark_group("decode_server_message");
    for (name, frame) in frames {
        group.bench_with_input(BenchmarkId::new("frame", name), frame, |b, frame| {
            b.iter(|| decode_server_message(black_box(frame)).expect("decode must succeed"))
        });
    }
    group.finish();
}

/// Benchmarks `EscapeMultiplexer::process` on trigger-free and triggered chunks.
fn bench_escape(c: &mut Criterion) {
    let chunks: &[(&str, Vec<u8>)] = &[
        ("keystroke", b"a".to_vec()),
        ("paste_4096", vec![b'x'; 4096]),
        ("paste_4096_trigger_mid", chunk_with_trigger_at(4096, 2048)),
    ];

    let mut group = c.benchmark_group("escape_process");
    for (name, chunk) in chunks {
        group.bench_with_input(BenchmarkId::new("chunk", name), chunk, |b, chunk| {
            let mut mux = EscapeMultiplexer::default();
            b.iter(|| mux.process(black_box(chunk), |_| vec![ESCAPE_TRIGGER]))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_escape);
criterion_main!(benches);

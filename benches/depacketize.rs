// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use criterion::{criterion_group, criterion_main, Criterion};
use h264_depay::codec::h264::Depacketizer;
use h264_depay::{DecoderOptions, RtpVideoPacket, PACKET_SIZE};
use std::convert::TryFrom;

const FRAGMENT_LEN: usize = PACKET_SIZE - 2;

/// Builds RTP payloads for a stream of one-second GOPs at 30 fps: SPS, PPS,
/// and a 150 kB IDR slice, then 29 single-packet P slices.
fn stream() -> Vec<(Vec<u8>, bool)> {
    let mut pkts = Vec::new();
    pkts.push((b"\x67\x64\x00\x1e\xac\x2c\x6a\x82\xc0".to_vec(), false));
    pkts.push((b"\x68\xee\x31\xb2\x1b".to_vec(), false));
    let idr = vec![0xa5u8; 150_000];
    let mut fragments = idr.chunks(FRAGMENT_LEN).peekable();
    let mut start = true;
    while let Some(fragment) = fragments.next() {
        let end = fragments.peek().is_none();
        let fu_header = (u8::from(start) << 7) | (u8::from(end) << 6) | 5;
        let mut payload = vec![0x7c, fu_header];
        payload.extend_from_slice(fragment);
        pkts.push((payload, end));
        start = false;
    }
    for _ in 0..29 {
        let mut payload = vec![0x41];
        payload.resize(8_000, 0x5a);
        pkts.push((payload, true));
    }
    pkts
}

fn depacketize(pkts: &[(Vec<u8>, bool)]) {
    let mut depacketizer = Depacketizer::new(&DecoderOptions::default());
    for (i, (payload, mark)) in pkts.iter().enumerate() {
        let pkt = RtpVideoPacket {
            payload,
            sequence_number: i as u16,
            mark: *mark,
        };
        if let Some(au) = depacketizer.process(&pkt).unwrap() {
            criterion::black_box(au);
        }
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let pkts = stream();
    let bytes: usize = pkts.iter().map(|(p, _)| p.len()).sum();
    let mut g = c.benchmark_group("depacketize");
    g.throughput(criterion::Throughput::Bytes(u64::try_from(bytes).unwrap()))
        .bench_function("h264_gop", |b| b.iter(|| depacketize(&pkts)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

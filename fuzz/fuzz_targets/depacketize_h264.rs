// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]
use libfuzzer_sys::fuzz_target;
use std::num::NonZeroUsize;

fuzz_target!(|data: &[u8]| {
    let mut data = data;
    let options = h264_depay::DecoderOptions::default()
        .chunk_size(NonZeroUsize::new(64).unwrap())
        .max_access_unit_len(NonZeroUsize::new(4096));
    let mut depacketizer = h264_depay::codec::h264::Depacketizer::new(&options);
    let mut sequence_number: u16 = 0;
    loop {
        let (hdr, rest) = match data.split_first() {
            Some(r) => r,
            None => return,
        };
        let mark = (hdr & 0b010) != 0;
        let loss = (hdr & 0b100) != 0;
        let len = usize::from(hdr >> 3);
        if rest.len() < len {
            return;
        }
        let (payload, rest) = rest.split_at(len);
        data = rest;
        if loss {
            sequence_number = sequence_number.wrapping_add(1);
        }
        let pkt = h264_depay::RtpVideoPacket {
            payload,
            sequence_number,
            mark,
        };
        match depacketizer.process(&pkt) {
            Ok(Some(au)) => {
                assert!(au.data().starts_with(b"\x00\x00\x00\x01"));
                assert!(au.data().len() <= 4096);
            }
            Ok(None) => {}
            Err(e) => assert!(e.kind().is_reassembly()),
        }
        depacketizer.check_invariants();
        sequence_number = sequence_number.wrapping_add(1);
    }
});

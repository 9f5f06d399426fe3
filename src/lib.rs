// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTP H.264 depacketization for an external decode pipeline.
//!
//! Feed each received RTP payload to [`Decoder::decode`]. Single NAL unit and
//! FU-A packets are reassembled into
//! [Annex B](https://www.itu.int/rec/T-REC-H.264-201906-I/en) access units,
//! which are handed to a [`pipeline::Pipeline`] as each marked packet closes
//! one. Decoded pictures come back asynchronously; `decode` returns whichever
//! one is ready, if any.
//!
//! Lossy or garbled input degrades to waiting for the next access unit (or
//! key frame), never to a silently corrupted one.

#![forbid(clippy::print_stderr, clippy::print_stdout)]

/// Wraps the supplied `ErrorInt` and returns it as an `Err`.
macro_rules! bail {
    ($e:expr) => {
        return Err(crate::error::Error(std::sync::Arc::new($e)))
    };
}

macro_rules! wrap {
    ($e:expr) => {
        crate::error::Error(std::sync::Arc::new($e))
    };
}

mod buffer;
pub mod codec;
pub mod decoder;
mod error;
mod hex;
pub mod pipeline;

#[cfg(test)]
mod testutil;

pub use buffer::{DEFAULT_CHUNK_SIZE, PACKET_SIZE};
pub use decoder::{CodecDescriptor, Decoded, Decoder, DecoderOptions};
pub use error::{BoxError, Error, ErrorKind};

/// A depayloaded RTP packet: the payload plus the header fields reassembly
/// needs.
///
/// The transport is expected to have validated the RTP header and SSRC;
/// packets are processed in the order given.
#[derive(Copy, Clone)]
pub struct RtpVideoPacket<'a> {
    /// The RTP payload, starting with the NAL header (or FU indicator).
    pub payload: &'a [u8],

    pub sequence_number: u16,

    /// The RTP marker bit, set on the last packet of an access unit.
    pub mark: bool,
}

impl std::fmt::Debug for RtpVideoPacket<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtpVideoPacket")
            .field("sequence_number", &self.sequence_number)
            .field("mark", &self.mark)
            .field("payload", &hex::LimitedHex::new(self.payload, 64))
            .finish()
    }
}

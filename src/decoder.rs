// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-stream decoder: reassembly plus a restartable decode pipeline.

use std::num::NonZeroUsize;

use log::{debug, warn};

use crate::codec::h264::{Depacketizer, FuStartEndPolicy};
use crate::codec::Frame;
use crate::error::ErrorInt;
use crate::pipeline::{PipelineAdapter, PipelineConfig, PipelineFactory};
use crate::{Error, RtpVideoPacket, DEFAULT_CHUNK_SIZE};

const DEFAULT_CHUNK: NonZeroUsize = match NonZeroUsize::new(DEFAULT_CHUNK_SIZE) {
    Some(n) => n,
    None => panic!("DEFAULT_CHUNK_SIZE must be non-zero"),
};

/// Describes the stream to decode, as negotiated via SDP.
#[derive(Clone, Debug)]
pub struct CodecDescriptor {
    /// The SDP `rtpmap` encoding name. Only `H264` is supported.
    pub encoding_name: String,

    /// The SDP `fmtp` parameters, if any. They aren't interpreted here but
    /// are passed on to the pipeline.
    pub format_specific_params: Option<String>,
}

impl CodecDescriptor {
    pub fn h264() -> Self {
        CodecDescriptor {
            encoding_name: "H264".to_owned(),
            format_specific_params: None,
        }
    }
}

/// Options for [`Decoder::new`].
#[derive(Clone, Debug)]
pub struct DecoderOptions {
    pub(crate) chunk_size: NonZeroUsize,
    pub(crate) max_access_unit_len: Option<NonZeroUsize>,
    pub(crate) fu_start_end: FuStartEndPolicy,
    pub(crate) pipeline: PipelineConfig,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            chunk_size: DEFAULT_CHUNK,
            max_access_unit_len: None,
            fu_start_end: FuStartEndPolicy::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl DecoderOptions {
    /// Sets the size of each allocation as an access unit grows; defaults to
    /// [`DEFAULT_CHUNK_SIZE`].
    pub fn chunk_size(self, chunk_size: NonZeroUsize) -> Self {
        Self { chunk_size, ..self }
    }

    /// Limits the size of an access unit. Exceeding it discards the access
    /// unit with [`crate::ErrorKind::OutOfMemory`]. Unlimited by default.
    pub fn max_access_unit_len(self, max_access_unit_len: Option<NonZeroUsize>) -> Self {
        Self {
            max_access_unit_len,
            ..self
        }
    }

    pub fn fu_start_end(self, fu_start_end: FuStartEndPolicy) -> Self {
        Self {
            fu_start_end,
            ..self
        }
    }

    pub fn pipeline(self, pipeline: PipelineConfig) -> Self {
        Self { pipeline, ..self }
    }
}

/// Returned by [`Decoder::decode`] for each accepted packet.
#[derive(Copy, Clone, Debug)]
pub struct Decoded<'a> {
    /// A newly decoded picture, if one is ready.
    pub frame: Option<Frame<'a>>,

    /// True iff this packet carried a key-frame-class NAL (IDR slice, SPS, or
    /// PPS), or the first fragment of one.
    pub intra: bool,
}

/// Decodes one RTP H.264 stream.
///
/// The pipeline is torn down when the `Decoder` is dropped.
pub struct Decoder<F: PipelineFactory> {
    depacketizer: Depacketizer,
    adapter: PipelineAdapter<F>,
    options: DecoderOptions,
    restarts: u64,
}

impl<F: PipelineFactory> Decoder<F> {
    /// Creates a decoder, starting a pipeline from `factory`.
    pub fn new(codec: &CodecDescriptor, factory: F, options: DecoderOptions) -> Result<Self, Error> {
        if !codec.encoding_name.eq_ignore_ascii_case("h264") {
            bail!(ErrorInt::InvalidArgument(format!(
                "no decoder for encoding name {:?}",
                &codec.encoding_name
            )));
        }
        let config = options
            .pipeline
            .clone()
            .format_specific_params(codec.format_specific_params.clone());
        let adapter = PipelineAdapter::new(factory, config)?;
        debug!("created decoder with {:?}", &options);
        Ok(Decoder {
            depacketizer: Depacketizer::new(&options),
            adapter,
            options,
            restarts: 0,
        })
    }

    /// Processes one packet, returning a decoded picture if one is ready.
    ///
    /// The picture isn't necessarily from this packet: decoding is
    /// asynchronous, and no picture is normal even after an access unit
    /// completes. The picture is valid until the next call.
    ///
    /// If the pipeline has reported an error, it's restarted first, which
    /// also discards all reassembly state. If that fails, the packet isn't
    /// processed; every call retries the restart.
    pub fn decode(&mut self, pkt: RtpVideoPacket<'_>) -> Result<Decoded<'_>, Error> {
        if !self.adapter.is_healthy() {
            warn!(
                "decode pipeline is broken; restarting before seq={:04x}",
                pkt.sequence_number
            );
            self.restart()?;
        }
        match self.depacketizer.process(&pkt) {
            Ok(Some(access_unit)) => self.adapter.submit(access_unit)?,
            Ok(None) => {}
            Err(e) => {
                debug!("dropping packet: {}", e);
                return Err(e);
            }
        }
        Ok(Decoded {
            intra: self.depacketizer.last_packet_intra(),
            frame: self.adapter.try_take_decoded_frame(),
        })
    }

    fn restart(&mut self) -> Result<(), Error> {
        // The old pipeline and the access unit in progress can't be assumed
        // consistent with each other.
        self.depacketizer = Depacketizer::new(&self.options);
        self.adapter.restart()?;
        self.restarts += 1;
        Ok(())
    }

    /// Returns false if the pipeline has reported an error and not yet been
    /// restarted.
    pub fn is_healthy(&self) -> bool {
        self.adapter.is_healthy()
    }

    /// Returns the number of successful pipeline restarts.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

impl<F: PipelineFactory> std::fmt::Debug for Decoder<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("depacketizer", &self.depacketizer)
            .field("adapter", &self.adapter)
            .field("restarts", &self.restarts)
            .finish()
    }
}

// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [H.264](https://www.itu.int/rec/T-REC-H.264-201906-I/en)-encoded video.

use log::{debug, trace, warn};

use crate::buffer::ChunkedBuffer;
use crate::error::ErrorInt;
use crate::{Error, RtpVideoPacket};

use super::AccessUnit;

pub mod nal;

use nal::NalHeader;

const START_CODE: &[u8; 4] = b"\x00\x00\x00\x01";

/// Policy for FU-A packets with both the start and end bits set.
///
/// [RFC 6184 section 5.8](https://datatracker.ietf.org/doc/html/rfc6184#section-5.8)
/// says "a Start bit and an End bit MUST NOT both be set to one in the same FU
/// header", but some packetizers do exactly that for NALs which fit in one
/// packet.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FuStartEndPolicy {
    /// Treat the packet as a complete single-packet fragment.
    #[default]
    Tolerate,

    /// Reject the packet as malformed.
    Reject,
}

impl std::fmt::Display for FuStartEndPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuStartEndPolicy::Tolerate => f.pad("tolerate"),
            FuStartEndPolicy::Reject => f.pad("reject"),
        }
    }
}

impl std::str::FromStr for FuStartEndPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "tolerate" => FuStartEndPolicy::Tolerate,
            "reject" => FuStartEndPolicy::Reject,
            _ => bail!(ErrorInt::InvalidArgument(format!(
                "FU-A start/end policy {s:?} not understood"
            ))),
        })
    }
}

/// Reassembles single NAL unit and FU-A packets as specified in
/// [RFC 6184](https://tools.ietf.org/html/rfc6184) into Annex B access units.
///
/// Packets are expected in the order the transport received them; there's no
/// reordering. Any sequence number discontinuity mid-access unit discards the
/// access unit, so the decoder is never handed a silently truncated picture.
///
/// Access units are withheld until a key-frame-class NAL (IDR slice, SPS, or
/// PPS) has been seen.
///
/// This interface is unstable and for internal use; it's exposed for
/// benchmarking and fuzzing.
#[doc(hidden)]
#[derive(Debug)]
pub struct Depacketizer {
    /// Annex B bytes of the access unit in progress. Empty iff idle.
    buf: ChunkedBuffer,

    /// True iff a FU-A start has been seen and its end has not.
    fragmenting: bool,

    /// Latched on the first key-frame-class NAL; cleared only by recreating
    /// the depacketizer.
    have_keyframe: bool,

    /// Sequence number of the last packet appended to an access unit.
    prev_sequence: u16,

    fu_start_end: FuStartEndPolicy,

    /// True iff the last packet passed to `process` carried a key-frame-class NAL.
    last_packet_intra: bool,

    /// Describes `buf`; meaningful only while `buf` is non-empty.
    in_progress: InProgress,
}

#[derive(Copy, Clone, Debug, Default)]
struct InProgress {
    start_sequence_number: u16,
    nal_units: u32,
    has_keyframe_nal: bool,
}

impl Depacketizer {
    pub fn new(options: &crate::decoder::DecoderOptions) -> Self {
        Depacketizer {
            buf: ChunkedBuffer::new(options.chunk_size, options.max_access_unit_len),
            fragmenting: false,
            have_keyframe: false,
            prev_sequence: 0,
            fu_start_end: options.fu_start_end,
            last_packet_intra: false,
            in_progress: InProgress::default(),
        }
    }

    /// Processes one packet, returning a completed access unit when a marked
    /// packet closes one.
    ///
    /// On error the packet is dropped. Most errors also discard the access
    /// unit in progress; the next packet then starts a fresh one.
    pub fn process(&mut self, pkt: &RtpVideoPacket<'_>) -> Result<Option<AccessUnit>, Error> {
        let seq = pkt.sequence_number;
        self.last_packet_intra = false;
        let hdr = match nal::decode_nal_header(pkt.payload) {
            Ok(h) => h,
            Err(e) => {
                self.reset_assembly();
                bail!(ErrorInt::Malformed {
                    sequence_number: seq,
                    description: e.reason.to_owned(),
                });
            }
        };
        if hdr.forbidden {
            self.reset_assembly();
            bail!(ErrorInt::ForbiddenBitSet {
                sequence_number: seq,
                header: pkt.payload[0],
            });
        }

        if !self.buf.is_empty() {
            let expected = self.prev_sequence.wrapping_add(1);
            if seq != expected {
                self.reset_assembly();
                bail!(ErrorInt::SequenceGap {
                    sequence_number: seq,
                    expected,
                });
            }
        }

        if self.fragmenting && hdr.nal_type != nal::FU_A {
            warn!(
                "seq={:04x}: {:?} while FU-A in progress; discarding {}-byte partial access unit",
                seq,
                hdr,
                self.buf.len()
            );
            self.reset_assembly();
        }

        let is_intra = match hdr.nal_type {
            1..=23 => {
                self.start_nal(seq)?;
                self.append(seq, pkt.payload)?;
                hdr.is_keyframe_class()
            }
            nal::FU_A => self.push_fu_a(pkt, hdr)?,
            nal_type => bail!(ErrorInt::UnsupportedNalType {
                sequence_number: seq,
                nal_type,
            }),
        };
        trace!(
            "seq={:04x} mark={} {:?}: access unit now {} bytes",
            seq,
            pkt.mark,
            hdr,
            self.buf.len()
        );

        self.prev_sequence = seq;
        self.last_packet_intra = is_intra;
        if is_intra {
            if !self.have_keyframe {
                debug!("seq={:04x}: first key frame", seq);
            }
            self.have_keyframe = true;
            self.in_progress.has_keyframe_nal = true;
        }

        if !pkt.mark {
            return Ok(None);
        }
        if self.fragmenting {
            self.reset_assembly();
            bail!(ErrorInt::IncompleteFragment {
                sequence_number: seq
            });
        }
        if !self.have_keyframe {
            self.reset_assembly();
            bail!(ErrorInt::AwaitingKeyframe {
                sequence_number: seq
            });
        }
        self.finish(seq).map(Some)
    }

    /// Handles a FU-A packet, returning true iff it starts a key-frame-class NAL.
    fn push_fu_a(&mut self, pkt: &RtpVideoPacket<'_>, hdr: NalHeader) -> Result<bool, Error> {
        let seq = pkt.sequence_number;
        let fu = match nal::decode_fu_indicator(&pkt.payload[1..]) {
            Ok(fu) => fu,
            Err(e) => {
                self.reset_assembly();
                bail!(ErrorInt::Malformed {
                    sequence_number: seq,
                    description: e.reason.to_owned(),
                });
            }
        };
        if fu.start && fu.end && self.fu_start_end == FuStartEndPolicy::Reject {
            self.reset_assembly();
            bail!(ErrorInt::Malformed {
                sequence_number: seq,
                description: "FU-A with both start and end bits set".to_owned(),
            });
        }

        let mut is_intra = false;
        if fu.start {
            if self.fragmenting {
                warn!(
                    "seq={:04x}: FU-A start while FU-A in progress; discarding {}-byte partial \
                     access unit",
                    seq,
                    self.buf.len()
                );
                self.reset_assembly();
            }
            let reconstructed = NalHeader {
                nal_type: fu.fu_type,
                ..hdr
            };
            self.start_nal(seq)?;
            self.append(seq, &[u8::from(reconstructed)])?;
            is_intra = reconstructed.is_keyframe_class();
            self.fragmenting = true;
        } else if !self.fragmenting {
            self.reset_assembly();
            bail!(ErrorInt::OrphanFragment {
                sequence_number: seq,
                fu_type: fu.fu_type,
            });
        }

        self.append(seq, &pkt.payload[2..])?;
        if fu.end {
            self.fragmenting = false;
        }
        Ok(is_intra)
    }

    /// Writes a start code, beginning a new access unit if idle.
    fn start_nal(&mut self, seq: u16) -> Result<(), Error> {
        if self.buf.is_empty() {
            self.in_progress = InProgress {
                start_sequence_number: seq,
                ..InProgress::default()
            };
        }
        self.append(seq, START_CODE)?;
        self.in_progress.nal_units += 1;
        Ok(())
    }

    fn append(&mut self, seq: u16, data: &[u8]) -> Result<(), Error> {
        match self.buf.append(data) {
            Ok(_) => Ok(()),
            Err(e) => {
                // The buffer has already released itself.
                self.fragmenting = false;
                bail!(ErrorInt::OutOfMemory {
                    sequence_number: seq,
                    len: e.len,
                    additional: e.additional,
                })
            }
        }
    }

    fn finish(&mut self, seq: u16) -> Result<AccessUnit, Error> {
        let data = match self.buf.take() {
            Ok(d) => d,
            Err(e) => {
                self.reset_assembly();
                bail!(ErrorInt::OutOfMemory {
                    sequence_number: seq,
                    len: e.len,
                    additional: e.additional,
                });
            }
        };
        Ok(AccessUnit {
            data,
            has_keyframe_nal: self.in_progress.has_keyframe_nal,
            nal_units: self.in_progress.nal_units,
            start_sequence_number: self.in_progress.start_sequence_number,
            end_sequence_number: seq,
        })
    }

    /// Discards the access unit in progress, keeping `prev_sequence` and
    /// `have_keyframe`.
    fn reset_assembly(&mut self) {
        self.buf.reset();
        self.fragmenting = false;
    }

    /// Returns true iff the last packet processed carried a key-frame-class
    /// NAL (IDR slice, SPS, or PPS), including the first fragment of one.
    pub fn last_packet_intra(&self) -> bool {
        self.last_packet_intra
    }

    #[cfg(test)]
    pub(crate) fn have_keyframe(&self) -> bool {
        self.have_keyframe
    }

    #[cfg(test)]
    pub(crate) fn prev_sequence(&self) -> u16 {
        self.prev_sequence
    }

    /// Returns the length of the access unit in progress.
    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Panics if internal state is inconsistent.
    #[doc(hidden)]
    pub fn check_invariants(&self) {
        assert!(
            !self.fragmenting || !self.buf.is_empty(),
            "fragmenting with empty buffer"
        );
    }
}

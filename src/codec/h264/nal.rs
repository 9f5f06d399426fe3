// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! RTP H.264 payload headers, as described in
//! [RFC 6184 section 5.3](https://datatracker.ietf.org/doc/html/rfc6184#section-5.3)
//! and [section 5.8](https://datatracker.ietf.org/doc/html/rfc6184#section-5.8).

use h264_reader::nal::UnitType;

/// NAL type of a fragmentation unit, type A.
pub const FU_A: u8 = 28;

/// The first byte of every RTP H.264 payload.
///
/// ```text
/// +---------------+
/// |0|1|2|3|4|5|6|7|
/// +-+-+-+-+-+-+-+-+
/// |F|NRI|  Type   |
/// +---------------+
/// ```
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct NalHeader {
    pub forbidden: bool,
    pub nal_ref_idc: u8,
    pub nal_type: u8,
}

impl NalHeader {
    /// Returns the `h264_reader` unit type, if `nal_type` names one.
    pub fn unit_type(self) -> Option<UnitType> {
        UnitType::for_id(self.nal_type).ok()
    }

    /// True iff this NAL is an IDR slice or a parameter set.
    pub fn is_keyframe_class(self) -> bool {
        is_keyframe_class(self.nal_type)
    }
}

impl From<NalHeader> for u8 {
    fn from(h: NalHeader) -> u8 {
        (u8::from(h.forbidden) << 7) | ((h.nal_ref_idc & 0b11) << 5) | (h.nal_type & 0b1_1111)
    }
}

impl std::fmt::Debug for NalHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NalHeader")
            .field("forbidden", &self.forbidden)
            .field("nal_ref_idc", &self.nal_ref_idc)
            .field("nal_type", &self.nal_type)
            .field("unit_type", &self.unit_type())
            .finish()
    }
}

/// The FU header which follows the FU indicator (aka the payload's NAL header).
///
/// ```text
/// +---------------+
/// |0|1|2|3|4|5|6|7|
/// +-+-+-+-+-+-+-+-+
/// |S|E|R|  Type   |
/// +---------------+
/// ```
///
/// RFC 6184 forbids setting both `start` and `end`, but some packetizers do so
/// for NALs which fit in a single packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FuIndicator {
    pub start: bool,
    pub end: bool,
    pub fu_type: u8,
}

/// Error from [`decode_nal_header`] or [`decode_fu_indicator`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MalformedHeader {
    pub reason: &'static str,
}

pub fn decode_nal_header(payload: &[u8]) -> Result<NalHeader, MalformedHeader> {
    let b = *payload.first().ok_or(MalformedHeader {
        reason: "empty payload",
    })?;
    Ok(NalHeader {
        forbidden: (b & 0b1000_0000) != 0,
        nal_ref_idc: (b >> 5) & 0b11,
        nal_type: b & 0b1_1111,
    })
}

/// Decodes the FU header from the payload with the NAL header already stripped.
pub fn decode_fu_indicator(payload_after_header: &[u8]) -> Result<FuIndicator, MalformedHeader> {
    let b = *payload_after_header.first().ok_or(MalformedHeader {
        reason: "FU-A is missing FU header",
    })?;
    Ok(FuIndicator {
        start: (b & 0b1000_0000) != 0,
        end: (b & 0b0100_0000) != 0,
        fu_type: b & 0b1_1111,
    })
}

/// True iff `nal_type` must be seen before decoding can begin: an IDR slice,
/// SPS, or PPS.
pub fn is_keyframe_class(nal_type: u8) -> bool {
    matches!(
        UnitType::for_id(nal_type),
        Ok(UnitType::SliceLayerWithoutPartitioningIdr
            | UnitType::SeqParameterSet
            | UnitType::PicParameterSet)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nal_header() {
        let h = decode_nal_header(b"\x67\x4d\x00\x1e").unwrap();
        assert_eq!(
            h,
            NalHeader {
                forbidden: false,
                nal_ref_idc: 3,
                nal_type: 7,
            }
        );
        assert_eq!(h.unit_type(), Some(UnitType::SeqParameterSet));
        assert!(h.is_keyframe_class());
        assert_eq!(u8::from(h), 0x67);

        let h = decode_nal_header(b"\xbc").unwrap();
        assert!(h.forbidden);
        assert_eq!(h.nal_ref_idc, 1);
        assert_eq!(h.nal_type, FU_A);
        assert_eq!(u8::from(h), 0xbc);
    }

    #[test]
    fn empty() {
        assert_eq!(
            decode_nal_header(b"").unwrap_err().reason,
            "empty payload"
        );
        assert!(decode_fu_indicator(b"").is_err());
    }

    #[test]
    fn fu_indicator() {
        assert_eq!(
            decode_fu_indicator(b"\x85rest").unwrap(),
            FuIndicator {
                start: true,
                end: false,
                fu_type: 5,
            }
        );
        assert_eq!(
            decode_fu_indicator(b"\x41").unwrap(),
            FuIndicator {
                start: false,
                end: true,
                fu_type: 1,
            }
        );
        let both = decode_fu_indicator(b"\xc5").unwrap();
        assert!(both.start && both.end);
    }

    #[test]
    fn keyframe_class() {
        let classified: Vec<u8> = (0..32).filter(|&t| is_keyframe_class(t)).collect();
        assert_eq!(classified, [5, 7, 8]);
    }
}

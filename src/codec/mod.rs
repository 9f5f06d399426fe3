// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Codec-specific logic.
//!
//! Currently this consists of H.264 RTP depacketization into Annex B access
//! units, plus the types describing what the decode pipeline hands back.

use bytes::Bytes;

pub mod h264;

/// An encoded video access unit in Annex B byte stream format: each NAL is
/// preceded by a `00 00 00 01` start code.
///
/// Use [`AccessUnit::data`] to retrieve the bytes.
#[derive(Clone)]
pub struct AccessUnit {
    pub(crate) data: Bytes,

    /// True iff the access unit contains an IDR slice or parameter set.
    pub(crate) has_keyframe_nal: bool,

    pub(crate) nal_units: u32,
    pub(crate) start_sequence_number: u16,
    pub(crate) end_sequence_number: u16,
}

impl AccessUnit {
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[inline]
    pub fn into_data(self) -> Bytes {
        self.data
    }

    /// Returns true iff this access unit contains a key-frame-class NAL (IDR
    /// slice, SPS, or PPS).
    #[inline]
    pub fn has_keyframe_nal(&self) -> bool {
        self.has_keyframe_nal
    }

    /// Returns the number of NAL units, each with its own start code.
    #[inline]
    pub fn nal_units(&self) -> u32 {
        self.nal_units
    }

    /// Returns the RTP sequence number of the first packet of this access unit.
    #[inline]
    pub fn start_sequence_number(&self) -> u16 {
        self.start_sequence_number
    }

    /// Returns the RTP sequence number of the (marked) last packet.
    #[inline]
    pub fn end_sequence_number(&self) -> u16 {
        self.end_sequence_number
    }
}

impl std::fmt::Debug for AccessUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessUnit")
            .field("start_sequence_number", &self.start_sequence_number)
            .field("end_sequence_number", &self.end_sequence_number)
            .field("nal_units", &self.nal_units)
            .field("has_keyframe_nal", &self.has_keyframe_nal)
            .field("data", &crate::hex::LimitedHex::new(&self.data, 64))
            .finish()
    }
}

/// Pixel layout of decoded pictures.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar 4:2:0 YUV: a full-resolution Y plane followed by U and V
    /// planes subsampled by two in each dimension. Aka YUV420P.
    #[default]
    I420,
}

impl PixelFormat {
    /// Returns the number of rows in the given plane of a `height`-row picture.
    pub fn plane_rows(self, plane: usize, height: u32) -> usize {
        let height = height as usize;
        match (self, plane) {
            (PixelFormat::I420, 0) => height,
            (PixelFormat::I420, _) => (height + 1) / 2,
        }
    }

    /// Returns the number of bytes in one row of the given plane, not
    /// counting stride padding.
    pub fn plane_row_bytes(self, plane: usize, width: u32) -> usize {
        let width = width as usize;
        match (self, plane) {
            (PixelFormat::I420, 0) => width,
            (PixelFormat::I420, _) => (width + 1) / 2,
        }
    }

    /// Returns the caps-style name of this format.
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::I420 => "I420",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

/// One plane of a [`Frame`].
#[derive(Copy, Clone)]
pub struct Plane<'a> {
    /// Bytes between the starts of consecutive rows.
    pub stride: usize,
    pub data: &'a [u8],
}

impl std::fmt::Debug for Plane<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plane")
            .field("stride", &self.stride)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A decoded picture, borrowed from the decoder until the next call which
/// may pull another one.
#[derive(Copy, Clone, Debug)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,

    /// Y, U, and V planes, in that order.
    pub planes: [Plane<'a>; 3],
}

#[cfg(test)]
mod tests {
    use super::PixelFormat;

    #[test]
    fn i420_geometry() {
        let f = PixelFormat::I420;
        assert_eq!(f.plane_rows(0, 481), 481);
        assert_eq!(f.plane_rows(1, 481), 241);
        assert_eq!(f.plane_row_bytes(0, 705), 705);
        assert_eq!(f.plane_row_bytes(2, 705), 353);
        assert_eq!(f.to_string(), "I420");
    }
}

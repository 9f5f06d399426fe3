// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{fmt::Display, sync::Arc};

use thiserror::Error;

/// A boxed error as returned by [`crate::pipeline::Pipeline`] implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An opaque `std::error::Error + Send + Sync + 'static` implementation.
///
/// The focus is on detailed human-readable error messages which include the
/// RTP sequence number of the offending packet. Use [`Error::kind`] to count
/// or otherwise classify errors programmatically.
#[derive(Clone)]
pub struct Error(pub(crate) Arc<ErrorInt>);

impl Error {
    /// Returns the broad category of this error.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.0, f)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&*self.0)
    }
}

/// Category of an [`Error`].
///
/// All kinds but [`ErrorKind::SubmitFailed`], [`ErrorKind::InitFailed`], and
/// [`ErrorKind::InvalidArgument`] are handled by discarding the access unit in
/// progress; the stream itself continues.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Empty or truncated payload.
    Malformed,

    /// The NAL header's forbidden zero bit was set.
    ForbiddenBitSet,

    /// A packet arrived whose sequence number doesn't follow the previous one
    /// while an access unit was being assembled.
    SequenceGap,

    /// A FU-A continuation arrived without a preceding start fragment.
    OrphanFragment,

    /// The marker bit closed an access unit while a FU-A was still open.
    IncompleteFragment,

    /// A NAL type this depacketizer doesn't handle (STAP, MTAP, FU-B, ...).
    UnsupportedNalType,

    /// An access unit was complete but no key frame has been seen yet.
    AwaitingKeyframe,

    /// The access unit buffer couldn't grow.
    OutOfMemory,

    /// The decode pipeline refused an access unit.
    SubmitFailed,

    /// The decode pipeline couldn't be (re)created. Fatal to the stream until
    /// a later restart succeeds.
    InitFailed,

    /// The caller supplied an invalid argument.
    InvalidArgument,
}

impl ErrorKind {
    /// Returns true for errors raised while reassembling packets, which are
    /// recovered locally by resetting the access unit in progress.
    pub fn is_reassembly(self) -> bool {
        !matches!(
            self,
            ErrorKind::SubmitFailed | ErrorKind::InitFailed | ErrorKind::InvalidArgument
        )
    }
}

#[derive(Debug, Error)]
pub(crate) enum ErrorInt {
    /// The method's caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("[seq={sequence_number:04x}] Malformed packet: {description}")]
    Malformed {
        sequence_number: u16,
        description: String,
    },

    #[error("[seq={sequence_number:04x}] NAL header {header:#04x} has forbidden bit set")]
    ForbiddenBitSet { sequence_number: u16, header: u8 },

    #[error(
        "[seq={sequence_number:04x}] Lost packets mid-access unit: expected seq={expected:04x}"
    )]
    SequenceGap { sequence_number: u16, expected: u16 },

    #[error(
        "[seq={sequence_number:04x}] FU-A (type {fu_type}) continuation with no fragment in progress"
    )]
    OrphanFragment { sequence_number: u16, fu_type: u8 },

    #[error("[seq={sequence_number:04x}] Marked packet with FU-A still in progress")]
    IncompleteFragment { sequence_number: u16 },

    #[error("[seq={sequence_number:04x}] Unsupported NAL type {nal_type}")]
    UnsupportedNalType { sequence_number: u16, nal_type: u8 },

    #[error("[seq={sequence_number:04x}] Discarding access unit while waiting for key frame")]
    AwaitingKeyframe { sequence_number: u16 },

    #[error(
        "[seq={sequence_number:04x}] Unable to grow access unit of {len} bytes by {additional} bytes"
    )]
    OutOfMemory {
        sequence_number: u16,
        len: usize,
        additional: usize,
    },

    #[error("Decode pipeline rejected {len}-byte access unit: {source}")]
    SubmitFailed {
        len: usize,
        #[source]
        source: BoxError,
    },

    #[error("Decode pipeline rejected access unit: no running pipeline")]
    NoPipeline,

    #[error("Unable to initialize decode pipeline: {0}")]
    InitFailed(#[source] BoxError),
}

impl ErrorInt {
    fn kind(&self) -> ErrorKind {
        match self {
            ErrorInt::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ErrorInt::Malformed { .. } => ErrorKind::Malformed,
            ErrorInt::ForbiddenBitSet { .. } => ErrorKind::ForbiddenBitSet,
            ErrorInt::SequenceGap { .. } => ErrorKind::SequenceGap,
            ErrorInt::OrphanFragment { .. } => ErrorKind::OrphanFragment,
            ErrorInt::IncompleteFragment { .. } => ErrorKind::IncompleteFragment,
            ErrorInt::UnsupportedNalType { .. } => ErrorKind::UnsupportedNalType,
            ErrorInt::AwaitingKeyframe { .. } => ErrorKind::AwaitingKeyframe,
            ErrorInt::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            ErrorInt::SubmitFailed { .. } | ErrorInt::NoPipeline => ErrorKind::SubmitFailed,
            ErrorInt::InitFailed(_) => ErrorKind::InitFailed,
        }
    }
}

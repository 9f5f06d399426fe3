// Copyright (C) 2026 Scott Lamb <slamb@slamb.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Growable access unit buffer.
//!
//! RTP gives no advance notice of how large an access unit will be, so the
//! buffer grows by whole fixed-size chunks. Appends never move bytes already
//! written; only `take` may coalesce several chunks into one
//! contiguous copy when handing off the access unit.

use std::num::NonZeroUsize;

use bytes::Bytes;

/// Size of a typical RTP packet as seen on the wire.
pub const PACKET_SIZE: usize = 1300;

/// Default chunk size: enough for typical access units in one or two chunks.
pub const DEFAULT_CHUNK_SIZE: usize = PACKET_SIZE * 60;

/// Returned when the buffer couldn't grow. The buffer is empty afterward.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct AllocError {
    /// Buffer length before the failed operation.
    pub(crate) len: usize,

    /// Bytes the operation tried to add.
    pub(crate) additional: usize,
}

/// An append-only byte sequence backed by an arena of fixed-size chunks.
///
/// Every chunk but the last is full; the byte at logical offset `o` lives in
/// `chunks[o / chunk_size]`.
pub(crate) struct ChunkedBuffer {
    chunks: Vec<Vec<u8>>,
    chunk_size: usize,
    len: usize,
    max_len: Option<NonZeroUsize>,
}

impl ChunkedBuffer {
    pub(crate) fn new(chunk_size: NonZeroUsize, max_len: Option<NonZeroUsize>) -> Self {
        ChunkedBuffer {
            chunks: Vec::new(),
            chunk_size: chunk_size.get(),
            len: 0,
            max_len,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of chunks currently allocated.
    #[cfg(test)]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Appends `data`, returning the logical offset at which it starts.
    ///
    /// On failure the whole buffer is released, so a caller never sees a
    /// partially-appended access unit.
    pub(crate) fn append(&mut self, data: &[u8]) -> Result<usize, AllocError> {
        let offset = self.len;
        let err = AllocError {
            len: self.len,
            additional: data.len(),
        };
        let new_len = match self.len.checked_add(data.len()) {
            Some(l) if self.max_len.map(|m| l <= m.get()).unwrap_or(true) => l,
            _ => {
                self.reset();
                return Err(err);
            }
        };

        // Reserve everything before copying anything.
        while self.chunks.len() * self.chunk_size < new_len {
            if self.grow().is_err() {
                self.reset();
                return Err(err);
            }
        }

        let mut remaining = data;
        while !remaining.is_empty() {
            let chunk = &mut self.chunks[self.len / self.chunk_size];
            let n = std::cmp::min(self.chunk_size - chunk.len(), remaining.len());
            let (head, tail) = remaining.split_at(n);
            chunk.extend_from_slice(head);
            self.len += n;
            remaining = tail;
        }
        debug_assert_eq!(self.len, new_len);
        Ok(offset)
    }

    /// Allocates one more chunk.
    fn grow(&mut self) -> Result<(), std::collections::TryReserveError> {
        if !self.chunks.is_empty() {
            log::trace!(
                "{}-byte access unit doesn't fit in {} chunk(s); allocating another",
                self.len,
                self.chunks.len()
            );
        }
        let mut chunk = Vec::new();
        chunk.try_reserve_exact(self.chunk_size)?;
        self.chunks.try_reserve(1)?;
        self.chunks.push(chunk);
        Ok(())
    }

    /// Releases all chunks.
    pub(crate) fn reset(&mut self) {
        self.chunks = Vec::new();
        self.len = 0;
    }

    /// Moves the contents out as a single contiguous `Bytes`, leaving the
    /// buffer empty.
    ///
    /// This is zero-copy when the contents fit in one chunk.
    pub(crate) fn take(&mut self) -> Result<Bytes, AllocError> {
        let len = self.len;
        let mut chunks = std::mem::take(&mut self.chunks);
        self.len = 0;
        if chunks.len() <= 1 {
            return Ok(chunks.pop().map(Bytes::from).unwrap_or_default());
        }
        let mut out = Vec::new();
        if out.try_reserve_exact(len).is_err() {
            return Err(AllocError { len, additional: 0 });
        }
        for chunk in &chunks {
            out.extend_from_slice(chunk);
        }
        debug_assert_eq!(out.len(), len);
        Ok(Bytes::from(out))
    }

    /// Iterates over the filled portions of each chunk, in order.
    #[cfg(test)]
    pub(crate) fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().map(|c| &c[..])
    }
}

impl std::fmt::Debug for ChunkedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedBuffer")
            .field("len", &self.len)
            .field("chunks", &self.chunks.len())
            .field("chunk_size", &self.chunk_size)
            .field("max_len", &self.max_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    fn buf(chunk_size: usize, max_len: Option<usize>) -> ChunkedBuffer {
        ChunkedBuffer::new(
            NonZeroUsize::new(chunk_size).unwrap(),
            max_len.map(|m| NonZeroUsize::new(m).unwrap()),
        )
    }

    #[test]
    fn append_within_chunk() {
        let mut b = buf(16, None);
        assert!(b.is_empty());
        assert_eq!(b.append(b"\x00\x00\x00\x01").unwrap(), 0);
        assert_eq!(b.append(b"\x65abc").unwrap(), 4);
        assert_eq!(b.len(), 8);
        assert_eq!(b.chunk_count(), 1);
        assert_eq!(&b.take().unwrap()[..], b"\x00\x00\x00\x01\x65abc");
        assert!(b.is_empty());
        assert_eq!(b.chunk_count(), 0);
    }

    #[test]
    fn append_spans_chunks() {
        let mut b = buf(4, None);
        b.append(b"ab").unwrap();
        assert_eq!(b.append(b"cdefghij").unwrap(), 2);
        assert_eq!(b.len(), 10);
        assert_eq!(b.chunk_count(), 3);
        let chunks: Vec<&[u8]> = b.chunks().collect();
        assert_eq!(chunks, [&b"abcd"[..], b"efgh", b"ij"]);
        assert_eq!(&b.take().unwrap()[..], b"abcdefghij");
    }

    #[test]
    fn empty_append() {
        let mut b = buf(4, None);
        assert_eq!(b.append(b"").unwrap(), 0);
        assert_eq!(b.chunk_count(), 0);
        assert!(b.take().unwrap().is_empty());
    }

    #[test]
    fn exact_fill() {
        let mut b = buf(4, None);
        b.append(b"abcd").unwrap();
        assert_eq!(b.chunk_count(), 1);
        b.append(b"e").unwrap();
        assert_eq!(b.chunk_count(), 2);
        assert_eq!(&b.take().unwrap()[..], b"abcde");
    }

    #[test]
    fn limit_releases_everything() {
        let mut b = buf(4, Some(8));
        b.append(b"abcdef").unwrap();
        let e = b.append(b"ghi").unwrap_err();
        assert_eq!(
            e,
            AllocError {
                len: 6,
                additional: 3
            }
        );
        assert!(b.is_empty());
        assert_eq!(b.chunk_count(), 0);

        // Usable again afterward.
        b.append(b"abcdefgh").unwrap();
        assert_eq!(b.len(), 8);
    }

    #[test]
    fn reset() {
        let mut b = buf(4, None);
        b.append(b"abcdefgh").unwrap();
        b.reset();
        assert!(b.is_empty());
        assert_eq!(b.chunk_count(), 0);
        b.append(b"xy").unwrap();
        assert_eq!(&b.take().unwrap()[..], b"xy");
    }
}

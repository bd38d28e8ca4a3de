// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Reusable, growable frame buffer.
//!
//! Each connection and session owns one `FrameBuf` and reuses it for
//! every frame it reads, so the hot path allocates only when a frame is
//! larger than anything seen before on that socket. Growth is
//! power-of-two doubling starting at 1 byte; prior contents are
//! preserved across growth.

use bytes::BytesMut;
use thiserror::Error;

/// A frame announced a size beyond what the peer is allowed to send.
/// The owning connection must be closed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("frame of {need} bytes exceeds the configured limit of {limit}")]
pub struct FrameTooLarge {
    pub need: usize,
    pub limit: usize,
}

#[derive(Debug)]
pub struct FrameBuf {
    bytes: BytesMut,
    limit: usize,
}

impl FrameBuf {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: BytesMut::new(),
            limit,
        }
    }

    /// Guarantee at least `count` bytes of initialized storage,
    /// preserving prior contents. New bytes are zeroed.
    pub fn ensure(&mut self, count: usize) -> Result<(), FrameTooLarge> {
        if count > self.limit {
            return Err(FrameTooLarge {
                need: count,
                limit: self.limit,
            });
        }

        if self.bytes.capacity() < count {
            let mut cap = self.bytes.capacity().max(1);
            while cap < count {
                cap *= 2;
            }
            self.bytes.reserve(cap - self.bytes.len());
        }
        if self.bytes.len() < count {
            self.bytes.resize(count, 0);
        }
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }
}

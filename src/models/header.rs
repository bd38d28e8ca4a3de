// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The fixed 8-byte frame header that precedes every message.
//!
//! Wire layout (all integers little-endian, regardless of host):
//!
//! ```text
//! 0        4        8
//! +--------+--------+----------------+----------------+
//! | rpc_len| arg_len|  RPC preamble  | opaque payload |
//! +--------+--------+----------------+----------------+
//! ```
//!
//! * `rpc_len` – length of the RPC preamble following the header.
//! * `arg_len` – length of the opaque payload following the preamble.

use anyhow::Result;
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
};

pub const HEADER_LEN: usize = 8;

#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    pub rpc_len: U32<LittleEndian>, // 0..4
    pub arg_len: U32<LittleEndian>, // 4..8
}

impl FrameHeader {
    pub fn new(rpc_len: u32, arg_len: u32) -> Self {
        Self {
            rpc_len: U32::new(rpc_len),
            arg_len: U32::new(arg_len),
        }
    }

    /// Total number of body bytes that follow the header on the wire.
    #[inline]
    pub fn body_len(&self) -> usize {
        self.rpc_len.get() as usize + self.arg_len.get() as usize
    }

    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != HEADER_LEN {
            anyhow::bail!("header buffer must be {HEADER_LEN} bytes, got {}", buf.len());
        }
        buf.copy_from_slice(self.as_bytes());
        Ok(())
    }

    pub fn read_from(buf: &[u8]) -> Result<Self> {
        Self::read_from_bytes(buf)
            .map_err(|e| anyhow::anyhow!("failed to decode frame header: {e}"))
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Request preamble: the RPC-level fields between the frame header and
//! the opaque payload of a request frame.
//!
//! ```text
//! 0        8         16              16 + name_len
//! +--------+---------+---------------+
//! |   id   | name_len |  name bytes  |
//! +--------+---------+---------------+
//! ```
//!
//! `name` is the method identity, "ServiceName.MethodName", UTF-8.

use anyhow::{Result, bail};
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U64,
};

/// Fixed-width prefix of the request preamble.
pub const REQUEST_FIXED_LEN: usize = 16;

#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
struct RequestFixed {
    id: U64<LittleEndian>,       // 0..8
    name_len: U64<LittleEndian>, // 8..16
}

/// Decoded request preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPreamble {
    /// Per-connection call id, starting at 1 and strictly increasing.
    pub id: u64,
    /// Method identity, "ServiceName.MethodName".
    pub name: String,
}

impl RequestPreamble {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Number of preamble bytes this value occupies on the wire.
    #[inline]
    pub fn rpc_len(&self) -> usize {
        REQUEST_FIXED_LEN + self.name.len()
    }

    /// Encode into `buf`, which must be exactly `self.rpc_len()` bytes.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.rpc_len() {
            bail!(
                "request preamble needs {} bytes, got {}",
                self.rpc_len(),
                buf.len()
            );
        }

        let fixed = RequestFixed {
            id: U64::new(self.id),
            name_len: U64::new(self.name.len() as u64),
        };
        buf[..REQUEST_FIXED_LEN].copy_from_slice(fixed.as_bytes());
        buf[REQUEST_FIXED_LEN..].copy_from_slice(self.name.as_bytes());
        Ok(())
    }

    /// Decode from the `rpc_len` bytes that followed a request header.
    ///
    /// Every declared length is validated against `buf` before slicing.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < REQUEST_FIXED_LEN {
            bail!(
                "request preamble truncated: {} bytes, need at least {REQUEST_FIXED_LEN}",
                buf.len()
            );
        }

        let fixed = RequestFixed::read_from_bytes(&buf[..REQUEST_FIXED_LEN])
            .map_err(|e| anyhow::anyhow!("failed to decode request preamble: {e}"))?;

        let name_len = fixed.name_len.get() as usize;
        if REQUEST_FIXED_LEN + name_len != buf.len() {
            bail!(
                "request name length {name_len} does not match preamble of {} bytes",
                buf.len()
            );
        }

        let name = std::str::from_utf8(&buf[REQUEST_FIXED_LEN..])
            .map_err(|e| anyhow::anyhow!("method identity is not valid UTF-8: {e}"))?;

        Ok(Self {
            id: fixed.id.get(),
            name: name.to_string(),
        })
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Response preamble: echoes the request id and carries the outcome.
//!
//! ```text
//! 0        8      12          20                20 + message_len
//! +--------+------+-----------+-----------------+
//! |   id   |status| message_len | message bytes |
//! +--------+------+-----------+-----------------+
//! ```
//!
//! `message` holds a human-readable failure reason when
//! `status != SUCCEED` and is empty otherwise.

use anyhow::{Result, bail};
use zerocopy::{
    FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, LittleEndian, U32, U64,
};

use crate::models::status::Status;

/// Fixed-width prefix of the response preamble.
pub const RESPONSE_FIXED_LEN: usize = 20;

#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
struct ResponseFixed {
    id: U64<LittleEndian>,          // 0..8
    status: U32<LittleEndian>,      // 8..12
    message_len: U64<LittleEndian>, // 12..20
}

/// Decoded response preamble.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePreamble {
    /// Echo of the request id this response answers.
    pub id: u64,
    pub status: Status,
    /// Failure reason; empty on success.
    pub message: String,
}

impl ResponsePreamble {
    pub fn succeed(id: u64) -> Self {
        Self {
            id,
            status: Status::Succeed,
            message: String::new(),
        }
    }

    pub fn failure(id: u64, status: Status, message: impl Into<String>) -> Self {
        Self {
            id,
            status,
            message: message.into(),
        }
    }

    /// Number of preamble bytes this value occupies on the wire.
    #[inline]
    pub fn rpc_len(&self) -> usize {
        RESPONSE_FIXED_LEN + self.message.len()
    }

    /// Encode into `buf`, which must be exactly `self.rpc_len()` bytes.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.rpc_len() {
            bail!(
                "response preamble needs {} bytes, got {}",
                self.rpc_len(),
                buf.len()
            );
        }

        let fixed = ResponseFixed {
            id: U64::new(self.id),
            status: U32::new(self.status.to_wire()),
            message_len: U64::new(self.message.len() as u64),
        };
        buf[..RESPONSE_FIXED_LEN].copy_from_slice(fixed.as_bytes());
        buf[RESPONSE_FIXED_LEN..].copy_from_slice(self.message.as_bytes());
        Ok(())
    }

    /// Decode from the `rpc_len` bytes that followed a response header.
    ///
    /// Every declared length is validated against `buf` before slicing;
    /// an undefined status value is protocol corruption and is rejected.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < RESPONSE_FIXED_LEN {
            bail!(
                "response preamble truncated: {} bytes, need at least {RESPONSE_FIXED_LEN}",
                buf.len()
            );
        }

        let fixed = ResponseFixed::read_from_bytes(&buf[..RESPONSE_FIXED_LEN])
            .map_err(|e| anyhow::anyhow!("failed to decode response preamble: {e}"))?;

        let message_len = fixed.message_len.get() as usize;
        if RESPONSE_FIXED_LEN + message_len != buf.len() {
            bail!(
                "response message length {message_len} does not match preamble of {} bytes",
                buf.len()
            );
        }

        let message = std::str::from_utf8(&buf[RESPONSE_FIXED_LEN..])
            .map_err(|e| anyhow::anyhow!("failure reason is not valid UTF-8: {e}"))?;

        Ok(Self {
            id: fixed.id.get(),
            status: Status::try_from(fixed.status.get())?,
            message: message.to_string(),
        })
    }
}

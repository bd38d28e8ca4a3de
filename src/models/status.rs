// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire-level outcome codes carried in every response preamble.
//!
//! The numeric values are part of the protocol and must never be
//! reordered. `Oom` is reserved for local allocation failures and is
//! never transmitted; `Unfound` is always server-originated and
//! `Timedout` always client-local.

use core::fmt;
use std::convert::TryFrom;

use thiserror::Error;

/// Outcome of a single RPC, as encoded on the wire (u32, little-endian).
#[repr(u32)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Local allocation failure; never transmitted.
    Oom = 0,
    /// Payload could not be serialized or parsed.
    Error = 1,
    /// Application-level or transport-level failure.
    Failed = 2,
    #[default]
    Succeed = 3,
    /// Service or method not registered on the server.
    Unfound = 4,
    /// The per-call deadline expired before a response arrived.
    Timedout = 5,
}

impl Status {
    #[inline]
    pub fn from_wire(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Oom,
            1 => Self::Error,
            2 => Self::Failed,
            3 => Self::Succeed,
            4 => Self::Unfound,
            5 => Self::Timedout,
            _ => return None,
        })
    }

    #[inline]
    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// Returned when a response preamble carries an undefined status value.
#[derive(Debug, Error)]
#[error("invalid status code: {0}")]
pub struct UnknownStatus(pub u32);

impl TryFrom<u32> for Status {
    type Error = anyhow::Error;

    fn try_from(v: u32) -> Result<Self, anyhow::Error> {
        Status::from_wire(v).ok_or_else(|| UnknownStatus(v).into())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Oom => "OOM",
            Self::Error => "ERROR",
            Self::Failed => "FAILED",
            Self::Succeed => "SUCCEED",
            Self::Unfound => "UNFOUND",
            Self::Timedout => "TIMEDOUT",
        };
        f.write_str(s)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    any::Any,
    sync::{Arc, Mutex},
};

use anyhow::{Result, bail};
use bytes::Bytes;

/// Serialization contract for RPC payload bodies.
///
/// The engine treats every payload as an opaque byte slice; the concrete
/// encoding (protobuf, zerocopy structs, raw bytes, ...) is supplied by
/// the implementor. `as_any`/`as_any_mut` let handlers downcast the
/// `dyn Message` the engine hands them back to the concrete type.
pub trait Message: Send + Sync {
    /// Exact number of bytes `serialize_into` will produce.
    fn byte_size(&self) -> usize;

    /// Serialize into `buf`, which is exactly `byte_size()` bytes.
    fn serialize_into(&self, buf: &mut [u8]) -> Result<()>;

    /// Replace `self` with the value decoded from `data`. An empty slice
    /// must decode to the default value (failure responses carry no
    /// payload).
    fn parse_from(&mut self, data: &[u8]) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A response slot shared between the caller and the engine: the read
/// loop parses the arriving payload into it before completion runs.
pub type SharedMessage = Arc<Mutex<dyn Message>>;

/// Schema-less [`Message`]: the payload is the bytes themselves.
///
/// Useful for ping/echo-style traffic and for callers that do their own
/// framing on top of the opaque payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    pub data: Bytes,
}

impl RawMessage {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl Message for RawMessage {
    fn byte_size(&self) -> usize {
        self.data.len()
    }

    fn serialize_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.data.len() {
            bail!(
                "raw message needs {} bytes, got {}",
                self.data.len(),
                buf.len()
            );
        }
        buf.copy_from_slice(&self.data);
        Ok(())
    }

    fn parse_from(&mut self, data: &[u8]) -> Result<()> {
        self.data = Bytes::copy_from_slice(data);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

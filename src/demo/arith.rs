// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Reference arithmetic service used by the demo binaries and the
//! integration suite: "Arith.Compute" over a compact fixed-layout
//! message encoding (little-endian throughout, like the frame itself).

use std::{any::Any, sync::Arc};

use anyhow::{Result, bail};
use zerocopy::{
    FromBytes as ZFromBytes, I64, Immutable, IntoBytes, KnownLayout, LittleEndian, U32,
};

use crate::{
    client::{Channel, Done},
    service::{
        Service,
        controller::Controller,
        descriptor::{MethodDescriptor, ServiceDescriptor},
        message::{Message, SharedMessage},
    },
};

pub const COMPUTE: MethodDescriptor = MethodDescriptor {
    service: "Arith",
    name: "Compute",
};

static METHODS: [MethodDescriptor; 1] = [COMPUTE];

pub static ARITH: ServiceDescriptor = ServiceDescriptor {
    name: "Arith",
    methods: &METHODS,
};

#[repr(u32)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    #[default]
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
}

impl ArithOp {
    #[inline]
    pub fn from_wire(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            3 => Self::Div,
            _ => return None,
        })
    }
}

#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
struct ComputeRequestWire {
    op: U32<LittleEndian>,  // 0..4
    lhs: I64<LittleEndian>, // 4..12
    rhs: I64<LittleEndian>, // 12..20
}

const COMPUTE_REQUEST_LEN: usize = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeRequest {
    pub op: ArithOp,
    pub lhs: i64,
    pub rhs: i64,
}

impl Message for ComputeRequest {
    fn byte_size(&self) -> usize {
        COMPUTE_REQUEST_LEN
    }

    fn serialize_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != COMPUTE_REQUEST_LEN {
            bail!(
                "compute request needs {COMPUTE_REQUEST_LEN} bytes, got {}",
                buf.len()
            );
        }
        let wire = ComputeRequestWire {
            op: U32::new(self.op as u32),
            lhs: I64::new(self.lhs),
            rhs: I64::new(self.rhs),
        };
        buf.copy_from_slice(wire.as_bytes());
        Ok(())
    }

    fn parse_from(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            *self = Self::default();
            return Ok(());
        }
        let wire = ComputeRequestWire::read_from_bytes(data)
            .map_err(|e| anyhow::anyhow!("failed to decode compute request: {e}"))?;
        let Some(op) = ArithOp::from_wire(wire.op.get()) else {
            bail!("unknown arithmetic opcode {}", wire.op.get());
        };
        self.op = op;
        self.lhs = wire.lhs.get();
        self.rhs = wire.rhs.get();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComputeResponse {
    pub value: i64,
}

impl Message for ComputeResponse {
    fn byte_size(&self) -> usize {
        8
    }

    fn serialize_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != 8 {
            bail!("compute response needs 8 bytes, got {}", buf.len());
        }
        buf.copy_from_slice(I64::<LittleEndian>::new(self.value).as_bytes());
        Ok(())
    }

    fn parse_from(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            *self = Self::default();
            return Ok(());
        }
        let value = I64::<LittleEndian>::read_from_bytes(data)
            .map_err(|e| anyhow::anyhow!("failed to decode compute response: {e}"))?;
        self.value = value.get();
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Server-side implementation of "Arith.Compute".
#[derive(Debug, Default)]
pub struct ArithService;

impl Service for ArithService {
    fn descriptor(&self) -> &'static ServiceDescriptor {
        &ARITH
    }

    fn request_prototype(&self, _method: &MethodDescriptor) -> Box<dyn Message> {
        Box::new(ComputeRequest::default())
    }

    fn response_prototype(&self, _method: &MethodDescriptor) -> Box<dyn Message> {
        Box::new(ComputeResponse::default())
    }

    fn call_method(
        &self,
        _method: &MethodDescriptor,
        controller: &Controller,
        request: &dyn Message,
        response: &mut dyn Message,
        done: &dyn Fn(),
    ) {
        let Some(req) = request.as_any().downcast_ref::<ComputeRequest>() else {
            controller.set_failed("unexpected request message");
            done();
            return;
        };
        let Some(rsp) = response.as_any_mut().downcast_mut::<ComputeResponse>() else {
            controller.set_failed("unexpected response message");
            done();
            return;
        };

        let mut value = 0i64;
        match req.op {
            ArithOp::Add => value = req.lhs.wrapping_add(req.rhs),
            ArithOp::Sub => value = req.lhs.wrapping_sub(req.rhs),
            ArithOp::Mul => value = req.lhs.wrapping_mul(req.rhs),
            ArithOp::Div => {
                if req.rhs == 0 {
                    controller.set_failed("divisor can't be 0");
                } else {
                    value = req.lhs.wrapping_div(req.rhs);
                }
            },
        }
        rsp.value = value;

        done();
    }
}

/// Client-side stub for "Arith.Compute": the generated-stub shape,
/// written by hand for the demo.
pub struct ArithStub {
    channel: Arc<Channel>,
}

impl ArithStub {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self { channel }
    }

    pub async fn compute(
        &self,
        controller: Arc<Controller>,
        request: &ComputeRequest,
        response: SharedMessage,
        done: Done,
    ) {
        self.channel
            .call_method(&COMPUTE, controller, request, response, done)
            .await;
    }
}

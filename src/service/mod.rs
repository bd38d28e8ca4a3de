// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod controller;
pub mod descriptor;
pub mod message;

use std::sync::Arc;

use crate::service::{
    controller::Controller,
    descriptor::{MethodDescriptor, ServiceDescriptor},
    message::Message,
};

/// Hook supplied at service registration and handed to every handler
/// invocation as its `done` callback. Handlers call it exactly once,
/// typically for accounting.
pub type DispatchHook = Arc<dyn Fn() + Send + Sync>;

/// Server-side dispatch contract implemented by user services.
///
/// The engine resolves "Service.Method" identities through
/// [`Service::find_method`], builds fresh request/response messages from
/// the prototypes, and invokes [`Service::call_method`] synchronously
/// inside the session task. Payload semantics stay entirely on the user
/// side; the engine only moves opaque bytes.
pub trait Service: Send + Sync {
    fn descriptor(&self) -> &'static ServiceDescriptor;

    fn find_method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.descriptor().find_method(name)
    }

    /// A fresh, default request message for `method`, ready to be parsed
    /// from an incoming payload.
    fn request_prototype(&self, method: &MethodDescriptor) -> Box<dyn Message>;

    /// A fresh, default response message for `method`.
    fn response_prototype(&self, method: &MethodDescriptor) -> Box<dyn Message>;

    /// Handle one call. Failures are reported through `controller`;
    /// `done` must be invoked exactly once.
    fn call_method(
        &self,
        method: &MethodDescriptor,
        controller: &Controller,
        request: &dyn Message,
        response: &mut dyn Message,
        done: &dyn Fn(),
    );
}

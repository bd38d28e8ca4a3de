// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use crate::models::status::Status;

/// Per-call context: the endpoint the call targets, its deadline, and
/// the failure state the engine and the handler report through.
///
/// On the client side a `Controller` travels with one call from
/// `call_method` to its completion; on the server side a fresh one is
/// created per dispatched request. All mutators take `&self` so the
/// engine can share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Controller {
    host: String,
    port: u16,
    /// Milliseconds; 0 means no deadline.
    timeout_ms: u64,

    state: Mutex<FailureState>,
    cancelled: AtomicBool,
}

#[derive(Debug, Default)]
struct FailureState {
    failed: bool,
    error_text: String,
    error_code: Status,
}

impl Controller {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the per-call deadline in milliseconds; 0 disables it.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> u64 {
        self.timeout_ms
    }

    /// Clear failure and cancellation; status back to SUCCEED.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.failed = false;
        state.error_text.clear();
        state.error_code = Status::Succeed;
        self.cancelled.store(false, Ordering::SeqCst);
    }

    pub fn failed(&self) -> bool {
        self.lock_state().failed
    }

    pub fn error_text(&self) -> String {
        self.lock_state().error_text.clone()
    }

    pub fn error_code(&self) -> Status {
        self.lock_state().error_code
    }

    /// Mark the call failed with status FAILED.
    pub fn set_failed(&self, reason: &str) {
        let mut state = self.lock_state();
        state.failed = true;
        state.error_text = reason.to_string();
        state.error_code = Status::Failed;
    }

    /// Mark the call failed, then override the status code.
    pub fn set_failed_with(&self, reason: &str, status: Status) {
        let mut state = self.lock_state();
        state.failed = true;
        state.error_text = reason.to_string();
        state.error_code = status;
    }

    /// Advisory only: the engine records the flag but does not abort the
    /// underlying I/O.
    pub fn start_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FailureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

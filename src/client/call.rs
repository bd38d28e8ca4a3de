// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, PoisonError},
};

use tokio::task::JoinHandle;

use crate::{
    models::status::Status,
    service::{controller::Controller, message::SharedMessage},
    utils::panic_message,
};

/// Completion callback of one RPC. Runs exactly once, on the I/O task
/// that observed the outcome.
pub type Done = Box<dyn FnOnce() + Send>;

/// Client-side record of one in-flight RPC.
///
/// A `Call` is shared between the connection's in-flight table, the
/// deferred completion and the deadline timer; whichever of them
/// resolves the call first takes the one-shot `done` slot, so the
/// completion can never run twice.
pub(crate) struct Call {
    pub id: u64,
    pub controller: Arc<Controller>,
    pub response: SharedMessage,

    done: Mutex<Option<Done>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Call {
    pub fn new(
        id: u64,
        controller: Arc<Controller>,
        response: SharedMessage,
        done: Done,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            controller,
            response,
            done: Mutex::new(Some(done)),
            timer: Mutex::new(None),
        })
    }

    pub fn set_timer(&self, handle: JoinHandle<()>) {
        *self.lock_timer() = Some(handle);
    }

    /// Drop the timer handle without aborting it. Used by the timer task
    /// itself, which must not cancel its own execution mid-completion.
    pub fn clear_timer(&self) {
        drop(self.lock_timer().take());
    }

    /// Resolve the call. `failure` applies the reason and status to the
    /// controller first; `None` completes with whatever state the
    /// controller already carries. No-op when already resolved.
    pub fn complete(&self, failure: Option<(&str, Status)>) {
        if let Some(timer) = self.lock_timer().take() {
            timer.abort();
        }

        let Some(done) = self
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        if let Some((reason, status)) = failure {
            self.controller.set_failed_with(reason, status);
        }

        if let Err(panic) = catch_unwind(AssertUnwindSafe(done)) {
            self.controller
                .set_failed(&format!("Run: {}", panic_message(panic.as_ref())));
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

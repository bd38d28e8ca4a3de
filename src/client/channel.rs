// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    cfg::config::Config,
    client::{
        call::Done,
        connection::Connection,
    },
    service::{
        controller::Controller,
        descriptor::MethodDescriptor,
        message::{Message, SharedMessage},
    },
};

/// Client-side multiplexer: maps "host:port" endpoints to live
/// connections, creating them on demand. Generated stubs call through
/// a shared `Channel`; a connection removes itself from the map as part
/// of its close sequence.
pub struct Channel {
    cfg: Config,
    connections: DashMap<String, Arc<Connection>>,
}

impl Channel {
    pub fn new(cfg: Config) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            connections: DashMap::new(),
        })
    }

    /// Dispatch one call to the endpoint named by the controller. The
    /// outcome is delivered through `done`; by the time it runs, the
    /// response slot and the controller reflect the result.
    pub async fn call_method(
        self: &Arc<Self>,
        method: &MethodDescriptor,
        controller: Arc<Controller>,
        request: &dyn Message,
        response: SharedMessage,
        done: Done,
    ) {
        let endpoint = format!("{}:{}", controller.host(), controller.port());

        let conn = Arc::clone(
            self.connections
                .entry(endpoint.clone())
                .or_insert_with(|| {
                    debug!(%endpoint, "opening connection");
                    Connection::new(
                        Arc::downgrade(self),
                        endpoint.clone(),
                        self.cfg.client.clone(),
                    )
                })
                .value(),
        );

        conn.call_method(method, controller, request, response, done)
            .await;
    }

    /// Whether an endpoint currently has a live connection.
    pub fn has_connection(&self, endpoint: &str) -> bool {
        self.connections.contains_key(endpoint)
    }

    /// Called exclusively by a connection during its close sequence.
    pub(crate) fn remove(&self, endpoint: &str) {
        self.connections.remove(endpoint);
    }
}

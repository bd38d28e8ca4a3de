// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod session;

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::{Context, Result};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::{net::TcpListener, sync::Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::Config,
    server::session::Session,
    service::{DispatchHook, Service},
};

/// A registered service plus the embedder's per-dispatch hook.
#[derive(Clone)]
pub(crate) struct ServiceEntry {
    pub service: Arc<dyn Service>,
    pub on_dispatch: DispatchHook,
}

/// Accepts TCP connections, turns each into a [`Session`], and holds
/// the service registry the sessions dispatch against.
///
/// The registry is populated before [`Server::run`] and read-only
/// afterwards; sessions remove themselves from the connection set when
/// they close.
pub struct Server {
    cfg: Config,
    services: DashMap<String, ServiceEntry>,
    sessions: DashMap<u64, Arc<Session>>,
    session_seq: AtomicU64,

    listener: Mutex<Option<TcpListener>>,
    local_addr: OnceCell<SocketAddr>,
    cancel: CancellationToken,
}

impl Server {
    pub fn new(cfg: Config) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            services: DashMap::new(),
            sessions: DashMap::new(),
            session_seq: AtomicU64::new(0),
            listener: Mutex::new(None),
            local_addr: OnceCell::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Store a service under its descriptor name. Returns `false` when
    /// the name is already taken; overwriting a registration is
    /// forbidden.
    pub fn register_service(
        &self,
        service: Arc<dyn Service>,
        on_dispatch: DispatchHook,
    ) -> bool {
        let key = service.descriptor().name.to_string();
        if self.services.contains_key(&key) {
            return false;
        }
        self.services.insert(
            key,
            ServiceEntry {
                service,
                on_dispatch,
            },
        );
        true
    }

    /// Bind the acceptor to the configured listen address and return
    /// the bound address (useful with an ephemeral port).
    pub async fn bind(&self) -> Result<SocketAddr> {
        let listener = TcpListener::bind(self.cfg.server.listen.as_str())
            .await
            .with_context(|| format!("failed to bind {}", self.cfg.server.listen))?;

        let addr = listener.local_addr()?;
        let _ = self.local_addr.set(addr);
        *self.listener.lock().await = Some(listener);

        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Accept connections until [`Server::shutdown`]. Accept errors are
    /// logged and the loop continues.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .context("server is not bound")?;

        info!(addr = %listener.local_addr()?, "server listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((socket, peer)) => {
                        debug!(%peer, "accepted connection");
                        Session::spawn(self, socket);
                    },
                    Err(e) => {
                        warn!("accept failed: {e}");
                    },
                },
            }
        }
    }

    /// Stop the accept loop and every live session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.cfg
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.session_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn insert_session(&self, id: u64, session: Arc<Session>) {
        self.sessions.insert(id, session);
    }

    pub(crate) fn remove_session(&self, id: u64) {
        self.sessions.remove(&id);
    }

    pub(crate) fn lookup_service(&self, name: &str) -> Option<ServiceEntry> {
        self.services.get(name).map(|e| e.value().clone())
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::models::response::RESPONSE_FIXED_LEN;

const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Runtime parameters for both ends of the engine. Everything here
/// lives outside the protocol; the wire format never changes with it.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub server: ServerConfig,
}

/// Client-side connection knobs.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ClientConfig {
    /// Disable Nagle's algorithm on outgoing sockets.
    pub nodelay: bool,
    /// Hard cap on a single inbound frame (header + preamble + payload).
    pub max_frame_size: usize,
}

/// Server-side acceptor and session knobs.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, "host:port". Port 0 picks an ephemeral port.
    pub listen: String,
    pub nodelay: bool,
    /// Hard cap on a single inbound frame (header + preamble + payload).
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8989".to_string(),
            nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {path:?}"))?;
        let cfg: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config {path:?}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        // The smallest useful frame is a failure response with a short
        // reason; anything below that cannot carry the protocol.
        let floor = crate::models::header::HEADER_LEN + RESPONSE_FIXED_LEN;
        ensure!(
            self.client.max_frame_size > floor,
            "client.max_frame_size must exceed {floor}"
        );
        ensure!(
            self.server.max_frame_size > floor,
            "server.max_frame_size must exceed {floor}"
        );
        ensure!(!self.server.listen.is_empty(), "server.listen must be set");
        Ok(())
    }
}

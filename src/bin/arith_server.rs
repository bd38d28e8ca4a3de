// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::{Context, Result, ensure};
use tracing::info;
use urpc_rs::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    demo::arith::ArithService,
    server::Server,
    service::DispatchHook,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logger(
        resolve_config_path("config/logger.yaml")?
            .to_string_lossy()
            .as_ref(),
    )?;

    let mut cfg = resolve_config_path("config/urpc.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    // Optional override: arith_server <host> <port>
    let args: Vec<String> = std::env::args().collect();
    if args.len() == 3 {
        cfg.server.listen = format!("{}:{}", args[1], args[2]);
    }

    let server = Server::new(cfg);

    let dispatched = Arc::new(AtomicU64::new(0));
    let hook: DispatchHook = {
        let dispatched = Arc::clone(&dispatched);
        Arc::new(move || {
            let total = dispatched.fetch_add(1, Ordering::Relaxed) + 1;
            info!(total, "dispatched");
        })
    };

    ensure!(
        server.register_service(Arc::new(ArithService), hook),
        "Arith service registered twice"
    );

    let addr = server.bind().await?;
    info!(%addr, "arith server ready");

    server.run().await
}

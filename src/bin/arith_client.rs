// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rand::RngExt;
use tokio::{sync::oneshot, time::Instant};
use tracing::{info, warn};
use urpc_rs::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    client::Channel,
    demo::arith::{ArithOp, ArithStub, ComputeRequest, ComputeResponse},
    service::{controller::Controller, message::SharedMessage},
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logger(
        resolve_config_path("config/logger.yaml")?
            .to_string_lossy()
            .as_ref(),
    )?;

    let cfg = resolve_config_path("config/urpc.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    // arith_client <host> <port> [count]
    let args: Vec<String> = std::env::args().collect();
    let host = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1".into());
    let port: u16 = args
        .get(2)
        .map(|p| p.parse())
        .transpose()
        .context("port must be a number")?
        .unwrap_or(8989);
    let count: u64 = args
        .get(3)
        .map(|c| c.parse())
        .transpose()
        .context("count must be a number")?
        .unwrap_or(10);

    let channel = Channel::new(cfg);
    let stub = ArithStub::new(Arc::clone(&channel));

    for _ in 0..count {
        let request = {
            let mut rng = rand::rng();
            let op = match rng.random_range(0..4u32) {
                0 => ArithOp::Add,
                1 => ArithOp::Sub,
                2 => ArithOp::Mul,
                _ => ArithOp::Div,
            };
            ComputeRequest {
                op,
                lhs: rng.random_range(0..=100),
                rhs: rng.random_range(0..=100),
            }
        };

        let controller = Arc::new(Controller::new(host.clone(), port).with_timeout(80));
        let response: SharedMessage = Arc::new(Mutex::new(ComputeResponse::default()));

        let (tx, rx) = oneshot::channel::<()>();
        let done = Box::new(move || {
            let _ = tx.send(());
        });

        let begin = Instant::now();
        stub.compute(Arc::clone(&controller), &request, Arc::clone(&response), done)
            .await;
        let _ = rx.await;
        let micros = begin.elapsed().as_micros() as u64;

        if controller.failed() {
            warn!(
                code = %controller.error_code(),
                text = %controller.error_text(),
                micros,
                "call failed"
            );
            continue;
        }

        let value = response
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_any()
            .downcast_ref::<ComputeResponse>()
            .map(|r| r.value);
        info!(?request, ?value, micros, "response");
    }

    Ok(())
}

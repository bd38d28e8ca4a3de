// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::atomic::Ordering;

use anyhow::Result;
use urpc_rs::{
    client::Channel,
    demo::arith::{ArithOp, ComputeRequest},
    models::status::Status,
};

use crate::integration_tests::common::{
    compute, init_test_logging, load_config, start_arith_server,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_add_round_trip() -> Result<()> {
    init_test_logging();

    let cfg = load_config()?;
    let (server, addr, dispatched) = start_arith_server(cfg.clone()).await?;
    let channel = Channel::new(cfg);

    let outcome = compute(
        &channel,
        addr,
        1000,
        ComputeRequest {
            op: ArithOp::Add,
            lhs: 7,
            rhs: 5,
        },
    )
    .await;

    assert!(!outcome.controller.failed());
    assert_eq!(outcome.status(), Status::Succeed);
    assert_eq!(outcome.compute_value(), Some(12));
    assert_eq!(outcome.done_runs.load(Ordering::SeqCst), 1);
    assert_eq!(dispatched.load(Ordering::SeqCst), 1);

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_divide_by_zero_reports_failure() -> Result<()> {
    init_test_logging();

    let cfg = load_config()?;
    let (server, addr, dispatched) = start_arith_server(cfg.clone()).await?;
    let channel = Channel::new(cfg);

    let outcome = compute(
        &channel,
        addr,
        1000,
        ComputeRequest {
            op: ArithOp::Div,
            lhs: 10,
            rhs: 0,
        },
    )
    .await;

    assert!(outcome.controller.failed());
    assert_eq!(outcome.status(), Status::Failed);
    assert_eq!(outcome.controller.error_text(), "divisor can't be 0");
    // The handler still produced a (default) response body.
    assert_eq!(outcome.compute_value(), Some(0));
    assert_eq!(dispatched.load(Ordering::SeqCst), 1);

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sequential_calls_reuse_the_connection() -> Result<()> {
    init_test_logging();

    let cfg = load_config()?;
    let (server, addr, dispatched) = start_arith_server(cfg.clone()).await?;
    let channel = Channel::new(cfg);

    for (lhs, rhs, expect) in [(1i64, 2i64, 3i64), (10, 20, 30), (-4, 4, 0)] {
        let outcome = compute(
            &channel,
            addr,
            1000,
            ComputeRequest {
                op: ArithOp::Add,
                lhs,
                rhs,
            },
        )
        .await;
        assert!(!outcome.controller.failed());
        assert_eq!(outcome.compute_value(), Some(expect));
    }

    assert_eq!(dispatched.load(Ordering::SeqCst), 3);
    assert_eq!(server.session_count(), 1);

    server.shutdown();
    Ok(())
}

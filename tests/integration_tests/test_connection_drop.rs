// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex, atomic::Ordering};

use anyhow::Result;
use tokio::net::TcpListener;
use urpc_rs::{
    client::Channel,
    models::status::Status,
    service::{
        descriptor::MethodDescriptor,
        message::{RawMessage, SharedMessage},
    },
};

use crate::integration_tests::common::{
    endpoint_of, init_test_logging, load_config, read_frame, submit_call,
};

const SAY: MethodDescriptor = MethodDescriptor {
    service: "Echo",
    name: "Say",
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_peer_close_fails_all_pending_calls() -> Result<()> {
    init_test_logging();

    let cfg = load_config()?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    // A server that reads the three requests and then hangs up.
    let acceptor = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;
        for _ in 0..3 {
            read_frame(&mut socket).await?;
        }
        drop(socket);
        anyhow::Ok(())
    });

    let channel = Channel::new(cfg);

    let mut outcomes = Vec::new();
    let mut receivers = Vec::new();
    for text in ["one", "two", "three"] {
        let response: SharedMessage = Arc::new(Mutex::new(RawMessage::default()));
        let (outcome, rx) = submit_call(
            &channel,
            addr,
            0, // no deadline: failure must come from the close
            &SAY,
            &RawMessage::new(text.as_bytes().to_vec()),
            response,
        )
        .await;
        outcomes.push(outcome);
        receivers.push(rx);
    }

    acceptor.await??;
    for rx in receivers {
        let _ = rx.await;
    }

    for outcome in &outcomes {
        assert!(outcome.controller.failed());
        assert_eq!(outcome.status(), Status::Failed);
        assert!(!outcome.controller.error_text().is_empty());
        assert_eq!(outcome.done_runs.load(Ordering::SeqCst), 1);
    }

    // The close sequence removes the endpoint from the channel right
    // after the drain; give the closing task a moment to finish.
    let endpoint = endpoint_of(addr);
    for _ in 0..50 {
        if !channel.has_connection(&endpoint) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(!channel.has_connection(&endpoint));

    Ok(())
}

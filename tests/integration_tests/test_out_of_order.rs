// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{Arc, Mutex, atomic::Ordering};

use anyhow::Result;
use bytes::Bytes;
use tokio::net::TcpListener;
use urpc_rs::{
    client::Channel,
    models::{request::RequestPreamble, status::Status},
    service::{
        descriptor::MethodDescriptor,
        message::{RawMessage, SharedMessage},
    },
};

use crate::integration_tests::common::{
    build_response_frame, init_test_logging, load_config, read_frame, submit_call,
    write_all,
};

const SAY: MethodDescriptor = MethodDescriptor {
    service: "Echo",
    name: "Say",
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_responses_correlate_by_id_not_order() -> Result<()> {
    init_test_logging();

    let cfg = load_config()?;
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    // A server that answers the second request first.
    let acceptor = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await?;

        let mut requests = Vec::new();
        for _ in 0..2 {
            let (preamble_bytes, payload) = read_frame(&mut socket).await?;
            let preamble = RequestPreamble::decode(&preamble_bytes)?;
            requests.push((preamble, payload));
        }

        for (preamble, payload) in requests.iter().rev() {
            let mut reply = payload.clone();
            reply.extend_from_slice(b"-reply");
            let frame =
                build_response_frame(preamble.id, Status::Succeed, "", &reply)?;
            write_all(&mut socket, &frame).await?;
        }

        anyhow::Ok(requests)
    });

    let channel = Channel::new(cfg);

    let mut outcomes = Vec::new();
    let mut receivers = Vec::new();
    for text in ["one", "two"] {
        let response: SharedMessage = Arc::new(Mutex::new(RawMessage::default()));
        let (outcome, rx) = submit_call(
            &channel,
            addr,
            1000,
            &SAY,
            &RawMessage::new(text.as_bytes().to_vec()),
            response,
        )
        .await;
        outcomes.push(outcome);
        receivers.push(rx);
    }

    for rx in receivers {
        let _ = rx.await;
    }

    let requests = acceptor.await??;

    // Ids are allocated per connection: 1 then 2, strictly increasing.
    assert_eq!(requests[0].0.id, 1);
    assert_eq!(requests[1].0.id, 2);
    assert_eq!(requests[0].0.name, "Echo.Say");

    // Each call saw its own body despite the reversed reply order.
    assert!(!outcomes[0].controller.failed());
    assert!(!outcomes[1].controller.failed());
    assert_eq!(outcomes[0].raw_data(), Some(Bytes::from(&b"one-reply"[..])));
    assert_eq!(outcomes[1].raw_data(), Some(Bytes::from(&b"two-reply"[..])));
    assert_eq!(outcomes[0].done_runs.load(Ordering::SeqCst), 1);
    assert_eq!(outcomes[1].done_runs.load(Ordering::SeqCst), 1);

    Ok(())
}

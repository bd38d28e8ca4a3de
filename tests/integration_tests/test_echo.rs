// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{Arc, Mutex, atomic::Ordering},
    time::Duration,
};

use anyhow::Result;
use bytes::Bytes;
use tokio::time::sleep;
use urpc_rs::{
    client::Channel,
    service::{
        Service,
        controller::Controller,
        descriptor::{MethodDescriptor, ServiceDescriptor},
        message::{Message, RawMessage, SharedMessage},
    },
};

use crate::integration_tests::common::{
    call_and_wait, init_test_logging, load_config, start_server,
};

const SAY: MethodDescriptor = MethodDescriptor {
    service: "Echo",
    name: "Say",
};

static ECHO_METHODS: [MethodDescriptor; 1] = [SAY];

static ECHO: ServiceDescriptor = ServiceDescriptor {
    name: "Echo",
    methods: &ECHO_METHODS,
};

/// The ping service: opaque payload in, same payload out.
struct EchoService;

impl Service for EchoService {
    fn descriptor(&self) -> &'static ServiceDescriptor {
        &ECHO
    }

    fn request_prototype(&self, _method: &MethodDescriptor) -> Box<dyn Message> {
        Box::new(RawMessage::default())
    }

    fn response_prototype(&self, _method: &MethodDescriptor) -> Box<dyn Message> {
        Box::new(RawMessage::default())
    }

    fn call_method(
        &self,
        _method: &MethodDescriptor,
        controller: &Controller,
        request: &dyn Message,
        response: &mut dyn Message,
        done: &dyn Fn(),
    ) {
        let (Some(req), Some(rsp)) = (
            request.as_any().downcast_ref::<RawMessage>(),
            response.as_any_mut().downcast_mut::<RawMessage>(),
        ) else {
            controller.set_failed("unexpected message types");
            done();
            return;
        };

        rsp.data = req.data.clone();
        done();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_opaque_payloads_survive_the_round_trip() -> Result<()> {
    init_test_logging();

    let cfg = load_config()?;
    let (server, addr, dispatched) = start_server(cfg.clone(), vec![Arc::new(EchoService)]).await?;
    let channel = Channel::new(cfg);

    for text in ["ping", "", "a somewhat longer opaque payload \x00\x01\x02"] {
        let response: SharedMessage = Arc::new(Mutex::new(RawMessage::default()));
        let outcome = call_and_wait(
            &channel,
            addr,
            1000,
            &SAY,
            &RawMessage::new(text.as_bytes().to_vec()),
            response,
        )
        .await;

        assert!(!outcome.controller.failed());
        assert_eq!(outcome.raw_data(), Some(Bytes::copy_from_slice(text.as_bytes())));
    }

    assert_eq!(dispatched.load(Ordering::SeqCst), 3);
    assert_eq!(server.session_count(), 1);

    // Shutdown cancels the session and empties the connection set.
    server.shutdown();
    for _ in 0..50 {
        if server.session_count() == 0 {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.session_count(), 0);

    Ok(())
}

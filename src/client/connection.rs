// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    sync::{
        Arc, PoisonError, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::Result;
use bytes::BytesMut;
use dashmap::DashMap;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    cfg::config::ClientConfig,
    client::{
        call::{Call, Done},
        channel::Channel,
    },
    models::{
        buffer::FrameBuf,
        header::{FrameHeader, HEADER_LEN},
        request::RequestPreamble,
        response::ResponsePreamble,
        status::Status,
    },
    service::{
        controller::Controller,
        descriptor::MethodDescriptor,
        message::{Message, SharedMessage},
    },
};

/// Outcome of the lazy connect performed under the writer lock.
enum ConnectOutcome {
    Connected,
    /// The call was resolved without opening a socket; nothing to close.
    Aborted,
    /// The call was resolved; the caller must close once the writer
    /// lock is released.
    Failed(String),
}

/// One outgoing TCP connection: the socket, the in-flight call table
/// keyed by call id, and the per-call deadline timers.
///
/// Responses are correlated by id only and may arrive in any order.
/// Every accepted call resolves exactly once: through its response,
/// its deadline, or the connection-wide drain in [`Connection::close`].
pub struct Connection {
    endpoint: String,
    cfg: ClientConfig,
    channel: Weak<Channel>,

    next_id: AtomicU64,
    in_flight: DashMap<u64, Arc<Call>>,

    /// Write half; `None` until the lazy connect on first call. Holding
    /// the lock across the whole frame write keeps writes serialized
    /// per connection.
    writer: Mutex<Option<OwnedWriteHalf>>,
    connecting: AtomicBool,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl Connection {
    pub(crate) fn new(
        channel: Weak<Channel>,
        endpoint: String,
        cfg: ClientConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            cfg,
            channel,
            next_id: AtomicU64::new(0),
            in_flight: DashMap::new(),
            writer: Mutex::new(None),
            connecting: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        })
    }

    /// Submit one call: allocate an id, arm the deadline, connect lazily
    /// if needed, encode and write the frame. Completion is reported
    /// through the call's `done` callback, never through a return value.
    pub(crate) async fn call_method(
        self: &Arc<Self>,
        method: &MethodDescriptor,
        controller: Arc<Controller>,
        request: &dyn Message,
        response: SharedMessage,
        done: Done,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        assert!(id != 0, "call id space exhausted");

        let call = Call::new(id, controller, response, done);

        if call.controller.timeout() > 0 {
            self.arm_timer(&call);
        }

        let mut writer = self.writer.lock().await;

        if writer.is_none() {
            if self.closed.load(Ordering::SeqCst) {
                drop(writer);
                call.complete(Some(("connection is closed", Status::Failed)));
                return;
            }
            match self.do_connect(&mut writer, &call).await {
                ConnectOutcome::Connected => {},
                ConnectOutcome::Aborted => return,
                ConnectOutcome::Failed(reason) => {
                    drop(writer);
                    self.close(&reason).await;
                    return;
                },
            }
        }

        let frame = match encode_request_frame(id, &method.identity(), request) {
            Ok(frame) => frame,
            Err(e) => {
                // Per-call failure: the connection stays open.
                drop(writer);
                debug!(id, endpoint = %self.endpoint, "request encode failed: {e}");
                call.complete(Some(("Cannot SerializeToArray", Status::Error)));
                return;
            },
        };

        debug!(id, method = %method.identity(), len = frame.len(), "send request");

        // Register before the write begins so the response cannot race
        // past an unregistered call.
        self.in_flight.insert(id, Arc::clone(&call));

        if let Some(w) = writer.as_mut()
            && let Err(e) = w.write_all(&frame).await
        {
            drop(writer);
            let reason = format!("async_write: {e}");
            call.complete(Some((reason.as_str(), Status::Failed)));
            self.close(&e.to_string()).await;
        }
    }

    /// Establish the socket and spawn the read loop. Runs under the
    /// writer lock; failure paths resolve `call` themselves and leave
    /// the actual close to the caller.
    async fn do_connect(
        self: &Arc<Self>,
        writer: &mut Option<OwnedWriteHalf>,
        call: &Arc<Call>,
    ) -> ConnectOutcome {
        self.connecting.store(true, Ordering::SeqCst);

        let connected = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.connecting.store(false, Ordering::SeqCst);
                call.complete(Some(("connection is closed", Status::Failed)));
                return ConnectOutcome::Aborted;
            },
            res = TcpStream::connect(self.endpoint.as_str()) => res,
        };

        match connected {
            Ok(stream) => {
                self.connecting.store(false, Ordering::SeqCst);
                if self.cfg.nodelay {
                    let _ = stream.set_nodelay(true);
                }

                let (read_half, write_half) = stream.into_split();
                *writer = Some(write_half);

                let conn = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = Arc::clone(&conn).read_loop(read_half).await {
                        debug!(endpoint = %conn.endpoint, "read loop exited: {e}");
                        conn.close(&e.to_string()).await;
                    }
                });
                ConnectOutcome::Connected
            },
            Err(e) => {
                self.connecting.store(false, Ordering::SeqCst);
                let reason = format!("async_connect: {e}");
                call.complete(Some((reason.as_str(), Status::Failed)));
                ConnectOutcome::Failed(e.to_string())
            },
        }
    }

    fn arm_timer(self: &Arc<Self>, call: &Arc<Call>) {
        let conn = Arc::clone(self);
        let armed = Arc::clone(call);
        let delay = Duration::from_millis(call.controller.timeout());

        let handle = tokio::spawn(async move {
            sleep(delay).await;

            // Running on the timer itself: drop the handle instead of
            // aborting it, then resolve the call.
            armed.clear_timer();
            conn.in_flight.remove(&armed.id);

            let still_connecting = conn.connecting.load(Ordering::SeqCst);
            armed.complete(Some(("Connection timed out", Status::Timedout)));

            if still_connecting {
                conn.close("connection timed out").await;
            }
        });

        call.set_timer(handle);
    }

    /// Correlates arriving frames with in-flight calls until the socket
    /// fails or the connection is closed. Frames for unknown ids are
    /// stale responses arriving after a timeout and are dropped.
    async fn read_loop(self: Arc<Self>, mut reader: OwnedReadHalf) -> Result<()> {
        let mut scratch = FrameBuf::with_limit(self.cfg.max_frame_size);

        loop {
            scratch.ensure(HEADER_LEN)?;
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                res = reader.read_exact(&mut scratch.as_mut_slice()[..HEADER_LEN]) => {
                    res?;
                },
            }

            let header = FrameHeader::read_from(&scratch.as_slice()[..HEADER_LEN])?;
            let rpc_len = header.rpc_len.get() as usize;
            let total = HEADER_LEN + header.body_len();

            scratch.ensure(total)?;
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                res = reader.read_exact(&mut scratch.as_mut_slice()[HEADER_LEN..total]) => {
                    res?;
                },
            }

            let frame = scratch.as_slice();
            let preamble =
                ResponsePreamble::decode(&frame[HEADER_LEN..HEADER_LEN + rpc_len])?;
            let payload = &frame[HEADER_LEN + rpc_len..total];

            debug!(id = preamble.id, status = %preamble.status, "received response");

            let Some((_, call)) = self.in_flight.remove(&preamble.id) else {
                debug!(id = preamble.id, "stale response discarded");
                continue;
            };

            if preamble.status != Status::Succeed {
                call.controller
                    .set_failed_with(&preamble.message, preamble.status);
            }

            {
                let mut slot = call
                    .response
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = slot.parse_from(payload) {
                    debug!(id = preamble.id, "response parse failed: {e}");
                    call.controller
                        .set_failed_with("Cannot ParseFromArray", Status::Error);
                }
            }

            call.complete(None);
        }
    }

    /// Tear the connection down: stop the read loop, shut the socket,
    /// leave the channel, and fail every call still in flight with the
    /// triggering error's text.
    pub(crate) async fn close(&self, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        warn!(endpoint = %self.endpoint, "closing connection: {reason}");
        self.cancel.cancel();

        {
            let mut writer = self.writer.lock().await;
            if let Some(mut w) = writer.take() {
                let _ = w.shutdown().await;
            }
        }

        // Drain before leaving the channel: every pending call completes
        // with the triggering error's text, then the entry disappears.
        let pending: Vec<u64> = self.in_flight.iter().map(|e| *e.key()).collect();
        for id in pending {
            if let Some((_, call)) = self.in_flight.remove(&id) {
                call.complete(Some((reason, Status::Failed)));
            }
        }

        if let Some(channel) = self.channel.upgrade() {
            channel.remove(&self.endpoint);
        }
    }
}

/// Assemble a complete request frame: header, preamble, then the
/// payload serialized directly into its final position.
fn encode_request_frame(
    id: u64,
    identity: &str,
    request: &dyn Message,
) -> Result<BytesMut> {
    let preamble = RequestPreamble::new(id, identity);
    let rpc_len = preamble.rpc_len();
    let arg_len = request.byte_size();
    let total = HEADER_LEN + rpc_len + arg_len;

    let mut frame = BytesMut::new();
    frame.resize(total, 0);

    FrameHeader::new(rpc_len as u32, arg_len as u32)
        .write_to(&mut frame[..HEADER_LEN])?;
    preamble.encode_into(&mut frame[HEADER_LEN..HEADER_LEN + rpc_len])?;
    request.serialize_into(&mut frame[HEADER_LEN + rpc_len..total])?;

    Ok(frame)
}

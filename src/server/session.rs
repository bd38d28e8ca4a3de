// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Weak},
};

use anyhow::{Result, bail};
use bytes::BytesMut;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    models::{
        buffer::FrameBuf,
        header::{FrameHeader, HEADER_LEN},
        request::RequestPreamble,
        response::ResponsePreamble,
        status::Status,
    },
    server::Server,
    service::{controller::Controller, message::Message},
    utils::{panic_message, split_identity},
};

/// What one dispatched request produced: the response preamble plus an
/// optional response body (name-resolution failures carry none).
struct Reply {
    preamble: ResponsePreamble,
    body: Option<Box<dyn Message>>,
}

impl Reply {
    fn unfound(id: u64, message: &str) -> Self {
        Self {
            preamble: ResponsePreamble::failure(id, Status::Unfound, message),
            body: None,
        }
    }
}

/// Server side of one accepted TCP connection.
///
/// Each session runs a strict request→response cycle: read a header,
/// read the body, dispatch, write the reply, repeat. Any I/O error or
/// malformed frame is terminal; the session then removes itself from
/// the server's connection set.
pub(crate) struct Session {
    id: u64,
    server: Weak<Server>,
}

impl Session {
    pub(crate) fn spawn(server: &Arc<Server>, socket: TcpStream) {
        let id = server.next_session_id();
        let session = Arc::new(Session {
            id,
            server: Arc::downgrade(server),
        });

        server.insert_session(id, Arc::clone(&session));

        let cancel = server.cancel_token();
        tokio::spawn(async move {
            if let Err(e) = session.drive(socket, cancel).await {
                debug!(session = session.id, "session closed: {e}");
            }
            session.close();
        });
    }

    fn close(&self) {
        if let Some(server) = self.server.upgrade() {
            server.remove_session(self.id);
        }
    }

    async fn drive(&self, mut socket: TcpStream, cancel: CancellationToken) -> Result<()> {
        let Some(server) = self.server.upgrade() else {
            return Ok(());
        };

        let server_cfg = server.config().server.clone();
        if server_cfg.nodelay {
            let _ = socket.set_nodelay(true);
        }

        let mut scratch = FrameBuf::with_limit(server_cfg.max_frame_size);
        let mut out = BytesMut::new();

        loop {
            scratch.ensure(HEADER_LEN)?;
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                res = socket.read_exact(&mut scratch.as_mut_slice()[..HEADER_LEN]) => {
                    res?;
                },
            }

            let header = FrameHeader::read_from(&scratch.as_slice()[..HEADER_LEN])?;
            let rpc_len = header.rpc_len.get() as usize;
            let total = HEADER_LEN + header.body_len();

            scratch.ensure(total)?;
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                res = socket.read_exact(&mut scratch.as_mut_slice()[HEADER_LEN..total]) => {
                    res?;
                },
            }

            let reply = {
                let frame = scratch.as_slice();
                let preamble =
                    RequestPreamble::decode(&frame[HEADER_LEN..HEADER_LEN + rpc_len])?;
                let payload = &frame[HEADER_LEN + rpc_len..total];
                debug!(id = preamble.id, name = %preamble.name, "dispatching");

                self.dispatch(&server, &preamble, payload)?
            };

            write_reply(&mut socket, &mut out, &reply).await?;
        }
    }

    /// Resolve the method identity, run the handler, translate its
    /// outcome into a reply. `Err` means the client is malformed and
    /// the session must close without responding.
    fn dispatch(
        &self,
        server: &Server,
        request: &RequestPreamble,
        payload: &[u8],
    ) -> Result<Reply> {
        let Some((service_name, method_name)) = split_identity(&request.name) else {
            return Ok(Reply::unfound(request.id, "invalid method identity"));
        };

        let Some(entry) = server.lookup_service(service_name) else {
            return Ok(Reply::unfound(request.id, "service not found"));
        };

        let Some(method) = entry.service.find_method(method_name) else {
            return Ok(Reply::unfound(request.id, "method not found"));
        };

        let mut req_msg = entry.service.request_prototype(method);
        if let Err(e) = req_msg.parse_from(payload) {
            bail!("malformed payload for {}: {e}", request.name);
        }

        let mut rsp_msg = entry.service.response_prototype(method);
        let controller = Controller::default();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            entry.service.call_method(
                method,
                &controller,
                req_msg.as_ref(),
                rsp_msg.as_mut(),
                entry.on_dispatch.as_ref(),
            );
        }));
        if let Err(panic) = outcome {
            let detail = panic_message(panic.as_ref());
            warn!(session = self.id, "handler panicked: {detail}");
            controller.set_failed(&format!("Server Internal Error: {detail}"));
        }

        let preamble = if controller.failed() {
            ResponsePreamble::failure(request.id, Status::Failed, controller.error_text())
        } else {
            ResponsePreamble::succeed(request.id)
        };

        Ok(Reply {
            preamble,
            body: Some(rsp_msg),
        })
    }
}

/// Assemble and write one response frame. A serialization failure here
/// is terminal for the session.
async fn write_reply(
    socket: &mut TcpStream,
    out: &mut BytesMut,
    reply: &Reply,
) -> Result<()> {
    let rpc_len = reply.preamble.rpc_len();
    let arg_len = reply.body.as_ref().map_or(0, |b| b.byte_size());
    let total = HEADER_LEN + rpc_len + arg_len;

    out.clear();
    out.resize(total, 0);

    FrameHeader::new(rpc_len as u32, arg_len as u32).write_to(&mut out[..HEADER_LEN])?;
    reply
        .preamble
        .encode_into(&mut out[HEADER_LEN..HEADER_LEN + rpc_len])?;
    if let Some(body) = &reply.body {
        body.serialize_into(&mut out[HEADER_LEN + rpc_len..total])?;
    }

    socket.write_all(&out[..]).await?;
    Ok(())
}

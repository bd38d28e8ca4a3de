// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use urpc_rs::{
    models::{
        header::{FrameHeader, HEADER_LEN},
        request::{REQUEST_FIXED_LEN, RequestPreamble},
        response::{RESPONSE_FIXED_LEN, ResponsePreamble},
        status::Status,
    },
    service::message::{Message, RawMessage},
};

#[test]
fn test_header_is_little_endian() {
    let header = FrameHeader::new(20, 12);
    let mut buf = [0u8; HEADER_LEN];
    header.write_to(&mut buf).expect("encode header");

    assert_eq!(hex::encode(buf), "140000000c000000");

    let decoded = FrameHeader::read_from(&buf).expect("decode header");
    assert_eq!(decoded, header);
    assert_eq!(decoded.body_len(), 32);
}

#[test]
fn test_request_preamble_round_trip() {
    let preamble = RequestPreamble::new(7, "Arith.Compute");
    assert_eq!(preamble.rpc_len(), REQUEST_FIXED_LEN + 13);

    let mut buf = vec![0u8; preamble.rpc_len()];
    preamble.encode_into(&mut buf).expect("encode preamble");

    let decoded = RequestPreamble::decode(&buf).expect("decode preamble");
    assert_eq!(decoded, preamble);
}

#[test]
fn test_response_preamble_round_trip() {
    let preamble = ResponsePreamble::failure(42, Status::Unfound, "method not found");
    assert_eq!(preamble.rpc_len(), RESPONSE_FIXED_LEN + 16);

    let mut buf = vec![0u8; preamble.rpc_len()];
    preamble.encode_into(&mut buf).expect("encode preamble");

    let decoded = ResponsePreamble::decode(&buf).expect("decode preamble");
    assert_eq!(decoded, preamble);
}

#[test]
fn test_frame_length_is_exact() {
    let preamble = RequestPreamble::new(1, "Echo.Say");
    let payload = b"ping";

    let rpc_len = preamble.rpc_len();
    let total = HEADER_LEN + rpc_len + payload.len();

    let mut frame = vec![0u8; total];
    FrameHeader::new(rpc_len as u32, payload.len() as u32)
        .write_to(&mut frame[..HEADER_LEN])
        .expect("encode header");
    preamble
        .encode_into(&mut frame[HEADER_LEN..HEADER_LEN + rpc_len])
        .expect("encode preamble");
    frame[HEADER_LEN + rpc_len..].copy_from_slice(payload);

    let header = FrameHeader::read_from(&frame[..HEADER_LEN]).expect("decode header");
    assert_eq!(HEADER_LEN + header.body_len(), frame.len());
}

#[test]
fn test_truncated_preambles_are_rejected() {
    assert!(RequestPreamble::decode(&[0u8; REQUEST_FIXED_LEN - 1]).is_err());
    assert!(ResponsePreamble::decode(&[0u8; RESPONSE_FIXED_LEN - 1]).is_err());
}

#[test]
fn test_length_mismatch_is_rejected() {
    let preamble = RequestPreamble::new(3, "Arith.Compute");
    let mut buf = vec![0u8; preamble.rpc_len()];
    preamble.encode_into(&mut buf).expect("encode preamble");

    // One declared byte of name missing from the buffer.
    assert!(RequestPreamble::decode(&buf[..buf.len() - 1]).is_err());
}

#[test]
fn test_unknown_status_is_rejected() {
    let preamble = ResponsePreamble::succeed(9);
    let mut buf = vec![0u8; preamble.rpc_len()];
    preamble.encode_into(&mut buf).expect("encode preamble");

    // Status sits at bytes 8..12, little-endian.
    buf[8] = 0xff;
    assert!(ResponsePreamble::decode(&buf).is_err());
}

#[test]
fn test_status_wire_values_are_stable() {
    assert_eq!(Status::from_wire(0), Some(Status::Oom));
    assert_eq!(Status::from_wire(1), Some(Status::Error));
    assert_eq!(Status::from_wire(2), Some(Status::Failed));
    assert_eq!(Status::from_wire(3), Some(Status::Succeed));
    assert_eq!(Status::from_wire(4), Some(Status::Unfound));
    assert_eq!(Status::from_wire(5), Some(Status::Timedout));
    assert_eq!(Status::from_wire(6), None);
    assert_eq!(Status::Timedout.to_wire(), 5);
}

#[test]
fn test_raw_message_round_trip() {
    let msg = RawMessage::new(&b"opaque payload"[..]);
    let mut buf = vec![0u8; msg.byte_size()];
    msg.serialize_into(&mut buf).expect("serialize");

    let mut parsed = RawMessage::default();
    parsed.parse_from(&buf).expect("parse");
    assert_eq!(parsed, msg);

    parsed.parse_from(&[]).expect("parse empty");
    assert!(parsed.data.is_empty());
}

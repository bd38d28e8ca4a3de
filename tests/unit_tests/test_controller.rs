// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use urpc_rs::{models::status::Status, service::controller::Controller};

#[test]
fn test_fresh_controller_is_clean() {
    let c = Controller::new("127.0.0.1", 8989).with_timeout(80);

    assert!(!c.failed());
    assert!(!c.is_canceled());
    assert_eq!(c.error_code(), Status::Succeed);
    assert!(c.error_text().is_empty());

    assert_eq!(c.host(), "127.0.0.1");
    assert_eq!(c.port(), 8989);
    assert_eq!(c.timeout(), 80);
}

#[test]
fn test_set_failed_defaults_to_failed_code() {
    let c = Controller::default();
    c.set_failed("divisor can't be 0");

    assert!(c.failed());
    assert_eq!(c.error_code(), Status::Failed);
    assert_eq!(c.error_text(), "divisor can't be 0");
}

#[test]
fn test_set_failed_with_overrides_code() {
    let c = Controller::default();
    c.set_failed_with("Connection timed out", Status::Timedout);

    assert!(c.failed());
    assert_eq!(c.error_code(), Status::Timedout);
    assert_eq!(c.error_text(), "Connection timed out");
}

#[test]
fn test_reset_clears_everything() {
    let c = Controller::default();
    c.set_failed_with("boom", Status::Error);
    c.start_cancel();
    assert!(c.is_canceled());

    c.reset();

    assert!(!c.failed());
    assert!(!c.is_canceled());
    assert_eq!(c.error_code(), Status::Succeed);
    assert!(c.error_text().is_empty());
}

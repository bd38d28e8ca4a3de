// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::any::Any;

/// Builds the on-wire method identity, "ServiceName.MethodName".
pub fn method_identity(service: &str, method: &str) -> String {
    format!("{service}.{method}")
}

/// Splits a method identity on the first '.' into (service, method).
/// Returns `None` when the identity carries no '.' at all.
pub fn split_identity(identity: &str) -> Option<(&str, &str)> {
    identity.split_once('.')
}

/// Extracts a printable message from a captured panic payload.
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

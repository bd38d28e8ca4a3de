// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod call;
pub mod channel;
pub mod connection;

pub use call::Done;
pub use channel::Channel;

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::utils::method_identity;

/// Identity of a single RPC method within a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub service: &'static str,
    pub name: &'static str,
}

impl MethodDescriptor {
    /// The on-wire identity, "ServiceName.MethodName".
    pub fn identity(&self) -> String {
        method_identity(self.service, self.name)
    }
}

/// Static description of a service: its registry name and methods.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub name: &'static str,
    pub methods: &'static [MethodDescriptor],
}

impl ServiceDescriptor {
    pub fn find_method(&self, name: &str) -> Option<&'static MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

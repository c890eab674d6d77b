// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The request/response headers shared by every service, plus the
//! `ServiceFault` message a server sends when it cannot produce the
//! requested response type.

use crate::{
    types::{
        basic::{DateTime, DiagnosticInfo, ExtensionObject, UaString},
        node_id::NodeId,
        status::StatusCode,
    },
    ua_struct,
};

ua_struct! {
    /// Common parameters prefixed to every service request (Part 4 §7.28).
    /// `request_handle` is set by the dispatcher to the channel request id.
    pub struct RequestHeader {
        pub authentication_token: NodeId,
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub return_diagnostics: u32,
        pub audit_entry_id: UaString,
        pub timeout_hint: u32,
        pub additional_header: ExtensionObject,
    }
}

ua_struct! {
    /// Common parameters prefixed to every service response.
    pub struct ResponseHeader {
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub service_result: StatusCode,
        pub service_diagnostics: DiagnosticInfo,
        pub string_table: Option<Vec<UaString>>,
        pub additional_header: ExtensionObject,
    }
}

ua_struct! {
    /// Body-less response used by servers to report a service-level
    /// failure for any request type.
    pub struct ServiceFault {
        pub response_header: ResponseHeader,
    }
}

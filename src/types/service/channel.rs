// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! OpenSecureChannel / CloseSecureChannel service messages (Part 4 §5.5).

use crate::{
    service_pair,
    types::{
        basic::{ByteString, DateTime},
        header::{RequestHeader, ResponseHeader},
    },
    ua_enum, ua_struct,
};

ua_enum! {
    /// Whether an OPN call creates a channel or rotates its token.
    pub enum SecurityTokenRequestType {
        Issue = 0,
        Renew = 1,
    }
}

ua_enum! {
    pub enum MessageSecurityMode {
        Invalid = 0,
        None = 1,
        Sign = 2,
        SignAndEncrypt = 3,
    }
}

ua_struct! {
    /// Token handed out by the server; `revised_lifetime` drives the
    /// client-side renewal deadline.
    pub struct ChannelSecurityToken {
        pub channel_id: u32,
        pub token_id: u32,
        pub created_at: DateTime,
        pub revised_lifetime: u32,
    }
}

ua_struct! {
    pub struct OpenSecureChannelRequest {
        pub request_header: RequestHeader,
        pub client_protocol_version: u32,
        pub request_type: SecurityTokenRequestType,
        pub security_mode: MessageSecurityMode,
        pub client_nonce: ByteString,
        pub requested_lifetime: u32,
    }
}

ua_struct! {
    pub struct OpenSecureChannelResponse {
        pub response_header: ResponseHeader,
        pub server_protocol_version: u32,
        pub security_token: ChannelSecurityToken,
        pub server_nonce: ByteString,
    }
}

ua_struct! {
    /// Sent as a CLO chunk; the server never answers it.
    pub struct CloseSecureChannelRequest {
        pub request_header: RequestHeader,
    }
}

ua_struct! {
    pub struct CloseSecureChannelResponse {
        pub response_header: ResponseHeader,
    }
}

service_pair!(OpenSecureChannelRequest = 446, OpenSecureChannelResponse = 449);
service_pair!(CloseSecureChannelRequest = 452, CloseSecureChannelResponse = 455);

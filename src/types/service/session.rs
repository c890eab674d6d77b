// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Session service set (Part 4 §5.6): create/activate/close plus the
//! application and endpoint descriptions and user identity tokens the
//! handshake carries.

use crate::{
    service_pair,
    types::{
        basic::{ByteString, ExtensionObject, LocalizedText, UaString},
        encoding::EncodingResult,
        header::{RequestHeader, ResponseHeader},
        node_id::NodeId,
        service::channel::MessageSecurityMode,
    },
    ua_enum, ua_struct,
};

ua_enum! {
    pub enum ApplicationType {
        Server = 0,
        Client = 1,
        ClientAndServer = 2,
        DiscoveryServer = 3,
    }
}

ua_struct! {
    pub struct ApplicationDescription {
        pub application_uri: UaString,
        pub product_uri: UaString,
        pub application_name: LocalizedText,
        pub application_type: ApplicationType,
        pub gateway_server_uri: UaString,
        pub discovery_profile_uri: UaString,
        pub discovery_urls: Option<Vec<UaString>>,
    }
}

ua_enum! {
    pub enum UserTokenType {
        Anonymous = 0,
        UserName = 1,
        Certificate = 2,
        IssuedToken = 3,
    }
}

ua_struct! {
    pub struct UserTokenPolicy {
        pub policy_id: UaString,
        pub token_type: UserTokenType,
        pub issued_token_type: UaString,
        pub issuer_endpoint_url: UaString,
        pub security_policy_uri: UaString,
    }
}

ua_struct! {
    /// One endpoint a server exposes; `connect` picks the entry matching
    /// the configured security policy.
    pub struct EndpointDescription {
        pub endpoint_url: UaString,
        pub server: ApplicationDescription,
        pub server_certificate: ByteString,
        pub security_mode: MessageSecurityMode,
        pub security_policy_uri: UaString,
        pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
        pub transport_profile_uri: UaString,
        pub security_level: u8,
    }
}

ua_struct! {
    pub struct SignatureData {
        pub algorithm: UaString,
        pub signature: ByteString,
    }
}

ua_struct! {
    pub struct SignedSoftwareCertificate {
        pub certificate_data: ByteString,
        pub signature: ByteString,
    }
}

ua_struct! {
    pub struct CreateSessionRequest {
        pub request_header: RequestHeader,
        pub client_description: ApplicationDescription,
        pub server_uri: UaString,
        pub endpoint_url: UaString,
        pub session_name: UaString,
        pub client_nonce: ByteString,
        pub client_certificate: ByteString,
        pub requested_session_timeout: f64,
        pub max_response_message_size: u32,
    }
}

ua_struct! {
    pub struct CreateSessionResponse {
        pub response_header: ResponseHeader,
        pub session_id: NodeId,
        pub authentication_token: NodeId,
        pub revised_session_timeout: f64,
        pub server_nonce: ByteString,
        pub server_certificate: ByteString,
        pub server_endpoints: Option<Vec<EndpointDescription>>,
        pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        pub server_signature: SignatureData,
        pub max_request_message_size: u32,
    }
}

ua_struct! {
    pub struct ActivateSessionRequest {
        pub request_header: RequestHeader,
        pub client_signature: SignatureData,
        pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        pub locale_ids: Option<Vec<UaString>>,
        pub user_identity_token: ExtensionObject,
        pub user_token_signature: SignatureData,
    }
}

ua_struct! {
    pub struct ActivateSessionResponse {
        pub response_header: ResponseHeader,
        pub server_nonce: ByteString,
        pub results: Option<Vec<crate::types::status::StatusCode>>,
        pub diagnostic_infos: Option<Vec<crate::types::basic::DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct CloseSessionRequest {
        pub request_header: RequestHeader,
        pub delete_subscriptions: bool,
    }
}

ua_struct! {
    pub struct CloseSessionResponse {
        pub response_header: ResponseHeader,
    }
}

service_pair!(CreateSessionRequest = 461, CreateSessionResponse = 464);
service_pair!(ActivateSessionRequest = 467, ActivateSessionResponse = 470);
service_pair!(CloseSessionRequest = 473, CloseSessionResponse = 476);

ua_struct! {
    /// Identity token for anonymous activation.
    pub struct AnonymousIdentityToken {
        pub policy_id: UaString,
    }
}

ua_struct! {
    /// Identity token carrying a user name and password. With security
    /// policy None the password travels unencrypted and
    /// `encryption_algorithm` stays null.
    pub struct UserNameIdentityToken {
        pub policy_id: UaString,
        pub user_name: UaString,
        pub password: ByteString,
        pub encryption_algorithm: UaString,
    }
}

/// DefaultBinary encoding id of `AnonymousIdentityToken`.
const ANONYMOUS_TOKEN_TYPE_ID: u32 = 319;
/// DefaultBinary encoding id of `UserNameIdentityToken`.
const USER_NAME_TOKEN_TYPE_ID: u32 = 324;

impl AnonymousIdentityToken {
    pub fn into_extension_object(self) -> EncodingResult<ExtensionObject> {
        ExtensionObject::from_message(NodeId::numeric(0, ANONYMOUS_TOKEN_TYPE_ID), &self)
    }
}

impl UserNameIdentityToken {
    pub fn into_extension_object(self) -> EncodingResult<ExtensionObject> {
        ExtensionObject::from_message(NodeId::numeric(0, USER_NAME_TOKEN_TYPE_ID), &self)
    }
}

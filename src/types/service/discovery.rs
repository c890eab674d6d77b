// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Discovery service set: GetEndpoints, FindServers and the LDS-only
//! FindServersOnNetwork (Part 4 §5.4).

use crate::{
    service_pair,
    types::{
        basic::{DateTime, UaString},
        header::{RequestHeader, ResponseHeader},
        service::session::{ApplicationDescription, EndpointDescription},
    },
    ua_struct,
};

ua_struct! {
    pub struct GetEndpointsRequest {
        pub request_header: RequestHeader,
        pub endpoint_url: UaString,
        pub locale_ids: Option<Vec<UaString>>,
        pub profile_uris: Option<Vec<UaString>>,
    }
}

ua_struct! {
    pub struct GetEndpointsResponse {
        pub response_header: ResponseHeader,
        pub endpoints: Option<Vec<EndpointDescription>>,
    }
}

ua_struct! {
    pub struct FindServersRequest {
        pub request_header: RequestHeader,
        pub endpoint_url: UaString,
        pub locale_ids: Option<Vec<UaString>>,
        pub server_uris: Option<Vec<UaString>>,
    }
}

ua_struct! {
    pub struct FindServersResponse {
        pub response_header: ResponseHeader,
        pub servers: Option<Vec<ApplicationDescription>>,
    }
}

ua_struct! {
    /// One LDS registration record.
    pub struct ServerOnNetwork {
        pub record_id: u32,
        pub server_name: UaString,
        pub discovery_url: UaString,
        pub server_capabilities: Option<Vec<UaString>>,
    }
}

ua_struct! {
    pub struct FindServersOnNetworkRequest {
        pub request_header: RequestHeader,
        pub starting_record_id: u32,
        pub max_records_to_return: u32,
        pub server_capability_filter: Option<Vec<UaString>>,
    }
}

ua_struct! {
    pub struct FindServersOnNetworkResponse {
        pub response_header: ResponseHeader,
        pub last_counter_reset_time: DateTime,
        pub servers: Option<Vec<ServerOnNetwork>>,
    }
}

service_pair!(GetEndpointsRequest = 428, GetEndpointsResponse = 431);
service_pair!(FindServersRequest = 422, FindServersResponse = 425);
service_pair!(
    FindServersOnNetworkRequest = 12190,
    FindServersOnNetworkResponse = 12193
);

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Method service set: Call (Part 4 §5.11).

use crate::{
    service_pair,
    types::{
        basic::DiagnosticInfo,
        header::{RequestHeader, ResponseHeader},
        node_id::NodeId,
        status::StatusCode,
        variant::Variant,
    },
    ua_struct,
};

ua_struct! {
    pub struct CallMethodRequest {
        pub object_id: NodeId,
        pub method_id: NodeId,
        pub input_arguments: Option<Vec<Variant>>,
    }
}

ua_struct! {
    pub struct CallMethodResult {
        pub status_code: StatusCode,
        pub input_argument_results: Option<Vec<StatusCode>>,
        pub input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        pub output_arguments: Option<Vec<Variant>>,
    }
}

ua_struct! {
    pub struct CallRequest {
        pub request_header: RequestHeader,
        pub methods_to_call: Option<Vec<CallMethodRequest>>,
    }
}

ua_struct! {
    pub struct CallResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<CallMethodResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

service_pair!(CallRequest = 712, CallResponse = 715);

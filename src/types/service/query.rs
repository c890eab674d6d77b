// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Query service set: QueryFirst and QueryNext (Part 4 §5.9).

use crate::{
    service_pair,
    types::{
        basic::{ByteString, DiagnosticInfo, ExtensionObject, UaString},
        header::{RequestHeader, ResponseHeader},
        node_id::ExpandedNodeId,
        status::StatusCode,
        variant::Variant,
    },
    ua_struct,
};

ua_struct! {
    pub struct QueryDataDescription {
        pub relative_path: crate::types::service::view::RelativePath,
        pub attribute_id: u32,
        pub index_range: UaString,
    }
}

ua_struct! {
    pub struct NodeTypeDescription {
        pub type_definition_node: ExpandedNodeId,
        pub include_sub_types: bool,
        pub data_to_return: Option<Vec<QueryDataDescription>>,
    }
}

ua_struct! {
    pub struct QueryDataSet {
        pub node_id: ExpandedNodeId,
        pub type_definition_node: ExpandedNodeId,
        pub values: Option<Vec<Variant>>,
    }
}

ua_struct! {
    pub struct ParsingResult {
        pub status_code: StatusCode,
        pub data_status_codes: Option<Vec<StatusCode>>,
        pub data_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    /// Filter element forwarded opaquely; building filters is the
    /// caller's business.
    pub struct ContentFilterElement {
        pub filter_operator: i32,
        pub filter_operands: Option<Vec<ExtensionObject>>,
    }
}

ua_struct! {
    pub struct ContentFilter {
        pub elements: Option<Vec<ContentFilterElement>>,
    }
}

ua_struct! {
    pub struct ContentFilterResult {
        pub element_results: Option<Vec<ExtensionObject>>,
        pub element_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct QueryFirstRequest {
        pub request_header: RequestHeader,
        pub view: crate::types::service::view::ViewDescription,
        pub node_types: Option<Vec<NodeTypeDescription>>,
        pub filter: ContentFilter,
        pub max_data_sets_to_return: u32,
        pub max_references_to_return: u32,
    }
}

ua_struct! {
    pub struct QueryFirstResponse {
        pub response_header: ResponseHeader,
        pub query_data_sets: Option<Vec<QueryDataSet>>,
        pub continuation_point: ByteString,
        pub parsing_results: Option<Vec<ParsingResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        pub filter_result: ContentFilterResult,
    }
}

ua_struct! {
    pub struct QueryNextRequest {
        pub request_header: RequestHeader,
        pub release_continuation_point: bool,
        pub continuation_point: ByteString,
    }
}

ua_struct! {
    pub struct QueryNextResponse {
        pub response_header: ResponseHeader,
        pub query_data_sets: Option<Vec<QueryDataSet>>,
        pub revised_continuation_point: ByteString,
    }
}

service_pair!(QueryFirstRequest = 615, QueryFirstResponse = 618);
service_pair!(QueryNextRequest = 621, QueryNextResponse = 624);

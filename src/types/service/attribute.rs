// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Attribute service set: Read and Write (Part 4 §5.10).

use crate::{
    service_pair,
    types::{
        basic::{DiagnosticInfo, QualifiedName, UaString},
        header::{RequestHeader, ResponseHeader},
        node_id::NodeId,
        status::StatusCode,
        variant::DataValue,
    },
    ua_enum, ua_struct,
};

/// Attribute id of the Value attribute, by far the most common read
/// target.
pub const ATTRIBUTE_ID_VALUE: u32 = 13;

ua_enum! {
    pub enum TimestampsToReturn {
        Source = 0,
        Server = 1,
        Both = 2,
        Neither = 3,
    }
}

ua_struct! {
    pub struct ReadValueId {
        pub node_id: NodeId,
        pub attribute_id: u32,
        pub index_range: UaString,
        pub data_encoding: QualifiedName,
    }
}

impl ReadValueId {
    /// Read the Value attribute of `node_id`.
    pub fn value_of(node_id: NodeId) -> Self {
        ReadValueId {
            node_id,
            attribute_id: ATTRIBUTE_ID_VALUE,
            ..ReadValueId::default()
        }
    }
}

ua_struct! {
    pub struct ReadRequest {
        pub request_header: RequestHeader,
        pub max_age: f64,
        pub timestamps_to_return: TimestampsToReturn,
        pub nodes_to_read: Option<Vec<ReadValueId>>,
    }
}

ua_struct! {
    pub struct ReadResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<DataValue>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct WriteValue {
        pub node_id: NodeId,
        pub attribute_id: u32,
        pub index_range: UaString,
        pub value: DataValue,
    }
}

ua_struct! {
    pub struct WriteRequest {
        pub request_header: RequestHeader,
        pub nodes_to_write: Option<Vec<WriteValue>>,
    }
}

ua_struct! {
    pub struct WriteResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

service_pair!(ReadRequest = 631, ReadResponse = 634);
service_pair!(WriteRequest = 673, WriteResponse = 676);

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! View service set: Browse, BrowseNext, TranslateBrowsePathsToNodeIds,
//! RegisterNodes and UnregisterNodes (Part 4 §5.8).

use bitflags::bitflags;

use crate::{
    service_pair,
    types::{
        basic::{ByteString, DateTime, DiagnosticInfo, LocalizedText, QualifiedName},
        encoding::{BinaryDecodable, BinaryEncodable, DecodingLimits, EncodingResult},
        header::{RequestHeader, ResponseHeader},
        node_id::{ExpandedNodeId, NodeId},
        status::StatusCode,
    },
    ua_enum, ua_struct,
};

ua_enum! {
    pub enum BrowseDirection {
        Forward = 0,
        Inverse = 1,
        Both = 2,
    }
}

ua_enum! {
    pub enum NodeClass {
        Unspecified = 0,
        Object = 1,
        Variable = 2,
        Method = 4,
        ObjectType = 8,
        VariableType = 16,
        ReferenceType = 32,
        DataType = 64,
        View = 128,
    }
}

bitflags! {
    /// Which fields of each `ReferenceDescription` the server shall fill.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BrowseResultMask: u32 {
        const REFERENCE_TYPE = 0x01;
        const IS_FORWARD = 0x02;
        const NODE_CLASS = 0x04;
        const BROWSE_NAME = 0x08;
        const DISPLAY_NAME = 0x10;
        const TYPE_DEFINITION = 0x20;
    }
}

impl BinaryEncodable for BrowseResultMask {
    fn byte_len(&self) -> usize {
        4
    }

    fn encode<S: std::io::Write + ?Sized>(&self, stream: &mut S) -> EncodingResult<()> {
        self.bits().encode(stream)
    }
}

impl BinaryDecodable for BrowseResultMask {
    fn decode<S: std::io::Read + ?Sized>(
        stream: &mut S,
        limits: &DecodingLimits,
    ) -> EncodingResult<Self> {
        Ok(BrowseResultMask::from_bits_truncate(u32::decode(
            stream, limits,
        )?))
    }
}

ua_struct! {
    pub struct ViewDescription {
        pub view_id: NodeId,
        pub timestamp: DateTime,
        pub view_version: u32,
    }
}

ua_struct! {
    pub struct BrowseDescription {
        pub node_id: NodeId,
        pub browse_direction: BrowseDirection,
        pub reference_type_id: NodeId,
        pub include_subtypes: bool,
        pub node_class_mask: u32,
        pub result_mask: BrowseResultMask,
    }
}

ua_struct! {
    pub struct ReferenceDescription {
        pub reference_type_id: NodeId,
        pub is_forward: bool,
        pub node_id: ExpandedNodeId,
        pub browse_name: QualifiedName,
        pub display_name: LocalizedText,
        pub node_class: NodeClass,
        pub type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    pub struct BrowseResult {
        pub status_code: StatusCode,
        pub continuation_point: ByteString,
        pub references: Option<Vec<ReferenceDescription>>,
    }
}

ua_struct! {
    pub struct BrowseRequest {
        pub request_header: RequestHeader,
        pub view: ViewDescription,
        pub requested_max_references_per_node: u32,
        pub nodes_to_browse: Option<Vec<BrowseDescription>>,
    }
}

ua_struct! {
    pub struct BrowseResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<BrowseResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct BrowseNextRequest {
        pub request_header: RequestHeader,
        pub release_continuation_points: bool,
        pub continuation_points: Option<Vec<ByteString>>,
    }
}

ua_struct! {
    pub struct BrowseNextResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<BrowseResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct RelativePathElement {
        pub reference_type_id: NodeId,
        pub is_inverse: bool,
        pub include_subtypes: bool,
        pub target_name: QualifiedName,
    }
}

ua_struct! {
    pub struct RelativePath {
        pub elements: Option<Vec<RelativePathElement>>,
    }
}

ua_struct! {
    pub struct BrowsePath {
        pub starting_node: NodeId,
        pub relative_path: RelativePath,
    }
}

ua_struct! {
    pub struct BrowsePathTarget {
        pub target_id: ExpandedNodeId,
        pub remaining_path_index: u32,
    }
}

ua_struct! {
    pub struct BrowsePathResult {
        pub status_code: StatusCode,
        pub targets: Option<Vec<BrowsePathTarget>>,
    }
}

ua_struct! {
    pub struct TranslateBrowsePathsToNodeIdsRequest {
        pub request_header: RequestHeader,
        pub browse_paths: Option<Vec<BrowsePath>>,
    }
}

ua_struct! {
    pub struct TranslateBrowsePathsToNodeIdsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<BrowsePathResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct RegisterNodesRequest {
        pub request_header: RequestHeader,
        pub nodes_to_register: Option<Vec<NodeId>>,
    }
}

ua_struct! {
    pub struct RegisterNodesResponse {
        pub response_header: ResponseHeader,
        pub registered_node_ids: Option<Vec<NodeId>>,
    }
}

ua_struct! {
    pub struct UnregisterNodesRequest {
        pub request_header: RequestHeader,
        pub nodes_to_unregister: Option<Vec<NodeId>>,
    }
}

ua_struct! {
    pub struct UnregisterNodesResponse {
        pub response_header: ResponseHeader,
    }
}

service_pair!(BrowseRequest = 527, BrowseResponse = 530);
service_pair!(BrowseNextRequest = 533, BrowseNextResponse = 536);
service_pair!(
    TranslateBrowsePathsToNodeIdsRequest = 554,
    TranslateBrowsePathsToNodeIdsResponse = 557
);
service_pair!(RegisterNodesRequest = 560, RegisterNodesResponse = 563);
service_pair!(UnregisterNodesRequest = 566, UnregisterNodesResponse = 569);

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! NodeManagement service set: AddNodes, AddReferences, DeleteNodes and
//! DeleteReferences (Part 4 §5.7). Node attribute payloads stay inside
//! extension objects; this client forwards them opaquely.

use crate::{
    service_pair,
    types::{
        basic::{DiagnosticInfo, ExtensionObject, QualifiedName, UaString},
        header::{RequestHeader, ResponseHeader},
        node_id::{ExpandedNodeId, NodeId},
        service::view::NodeClass,
        status::StatusCode,
    },
    ua_struct,
};

ua_struct! {
    pub struct AddNodesItem {
        pub parent_node_id: ExpandedNodeId,
        pub reference_type_id: NodeId,
        pub requested_new_node_id: ExpandedNodeId,
        pub browse_name: QualifiedName,
        pub node_class: NodeClass,
        pub node_attributes: ExtensionObject,
        pub type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    pub struct AddNodesResult {
        pub status_code: StatusCode,
        pub added_node_id: NodeId,
    }
}

ua_struct! {
    pub struct AddNodesRequest {
        pub request_header: RequestHeader,
        pub nodes_to_add: Option<Vec<AddNodesItem>>,
    }
}

ua_struct! {
    pub struct AddNodesResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<AddNodesResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct AddReferencesItem {
        pub source_node_id: NodeId,
        pub reference_type_id: NodeId,
        pub is_forward: bool,
        pub target_server_uri: UaString,
        pub target_node_id: ExpandedNodeId,
        pub target_node_class: NodeClass,
    }
}

ua_struct! {
    pub struct AddReferencesRequest {
        pub request_header: RequestHeader,
        pub references_to_add: Option<Vec<AddReferencesItem>>,
    }
}

ua_struct! {
    pub struct AddReferencesResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct DeleteNodesItem {
        pub node_id: NodeId,
        pub delete_target_references: bool,
    }
}

ua_struct! {
    pub struct DeleteNodesRequest {
        pub request_header: RequestHeader,
        pub nodes_to_delete: Option<Vec<DeleteNodesItem>>,
    }
}

ua_struct! {
    pub struct DeleteNodesResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct DeleteReferencesItem {
        pub source_node_id: NodeId,
        pub reference_type_id: NodeId,
        pub is_forward: bool,
        pub target_node_id: ExpandedNodeId,
        pub delete_bidirectional: bool,
    }
}

ua_struct! {
    pub struct DeleteReferencesRequest {
        pub request_header: RequestHeader,
        pub references_to_delete: Option<Vec<DeleteReferencesItem>>,
    }
}

ua_struct! {
    pub struct DeleteReferencesResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

service_pair!(AddNodesRequest = 488, AddNodesResponse = 491);
service_pair!(AddReferencesRequest = 494, AddReferencesResponse = 497);
service_pair!(DeleteNodesRequest = 500, DeleteNodesResponse = 503);
service_pair!(DeleteReferencesRequest = 506, DeleteReferencesResponse = 509);

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Registry of data type descriptors: the built-in service set plus any
//! custom structures handed to the client at construction. The registry is
//! what turns an encoding node id coming off the wire back into a name,
//! and lets callers resolve extension-object payloads they know about.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::types::node_id::NodeId;

/// Description of one wire-encodable structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeDescriptor {
    /// Human-readable browse name, e.g. `ReadRequest`.
    pub name: &'static str,
    /// NodeId of the DefaultBinary encoding object.
    pub encoding_id: NodeId,
}

macro_rules! builtin_descriptors {
    ($($name:ident = $id:expr,)+) => {
        &[$(
            DataTypeDescriptor {
                name: stringify!($name),
                encoding_id: NodeId::numeric(0, $id),
            },
        )+]
    };
}

/// DefaultBinary encoding ids of every message this client can emit or
/// route (OPC UA NodeSet, ns=0).
static BUILTIN_TYPES: &[DataTypeDescriptor] = builtin_descriptors! {
    ServiceFault = 397,
    FindServersRequest = 422,
    FindServersResponse = 425,
    GetEndpointsRequest = 428,
    GetEndpointsResponse = 431,
    OpenSecureChannelRequest = 446,
    OpenSecureChannelResponse = 449,
    CloseSecureChannelRequest = 452,
    CloseSecureChannelResponse = 455,
    CreateSessionRequest = 461,
    CreateSessionResponse = 464,
    ActivateSessionRequest = 467,
    ActivateSessionResponse = 470,
    CloseSessionRequest = 473,
    CloseSessionResponse = 476,
    AddNodesRequest = 488,
    AddNodesResponse = 491,
    AddReferencesRequest = 494,
    AddReferencesResponse = 497,
    DeleteNodesRequest = 500,
    DeleteNodesResponse = 503,
    DeleteReferencesRequest = 506,
    DeleteReferencesResponse = 509,
    BrowseRequest = 527,
    BrowseResponse = 530,
    BrowseNextRequest = 533,
    BrowseNextResponse = 536,
    TranslateBrowsePathsToNodeIdsRequest = 554,
    TranslateBrowsePathsToNodeIdsResponse = 557,
    RegisterNodesRequest = 560,
    RegisterNodesResponse = 563,
    UnregisterNodesRequest = 566,
    UnregisterNodesResponse = 569,
    QueryFirstRequest = 615,
    QueryFirstResponse = 618,
    QueryNextRequest = 621,
    QueryNextResponse = 624,
    ReadRequest = 631,
    ReadResponse = 634,
    WriteRequest = 673,
    WriteResponse = 676,
    CallRequest = 712,
    CallResponse = 715,
    CreateMonitoredItemsRequest = 751,
    CreateMonitoredItemsResponse = 754,
    DeleteMonitoredItemsRequest = 781,
    DeleteMonitoredItemsResponse = 784,
    CreateSubscriptionRequest = 787,
    CreateSubscriptionResponse = 790,
    ModifySubscriptionRequest = 793,
    ModifySubscriptionResponse = 796,
    PublishRequest = 826,
    PublishResponse = 829,
    RepublishRequest = 832,
    RepublishResponse = 835,
    DeleteSubscriptionsRequest = 847,
    DeleteSubscriptionsResponse = 850,
    FindServersOnNetworkRequest = 12190,
    FindServersOnNetworkResponse = 12193,
};

static DEFAULT_REGISTRY: Lazy<TypeRegistry> = Lazy::new(|| {
    let mut registry = TypeRegistry {
        by_encoding_id: HashMap::with_capacity(BUILTIN_TYPES.len()),
    };
    for descriptor in BUILTIN_TYPES {
        registry.register(descriptor.clone());
    }
    registry
});

/// Lookup table from encoding node id to descriptor.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    by_encoding_id: HashMap<NodeId, DataTypeDescriptor>,
}

impl TypeRegistry {
    /// The built-in service set shared by every client.
    pub fn builtin() -> TypeRegistry {
        DEFAULT_REGISTRY.clone()
    }

    pub fn register(&mut self, descriptor: DataTypeDescriptor) {
        self.by_encoding_id
            .insert(descriptor.encoding_id.clone(), descriptor);
    }

    /// Merge caller-provided custom descriptors; later entries win.
    pub fn extend(&mut self, custom: impl IntoIterator<Item = DataTypeDescriptor>) {
        for descriptor in custom {
            self.register(descriptor);
        }
    }

    pub fn lookup(&self, encoding_id: &NodeId) -> Option<&DataTypeDescriptor> {
        self.by_encoding_id.get(encoding_id)
    }

    /// Name for logging; falls back to the id's display form.
    pub fn name_of(&self, encoding_id: &NodeId) -> String {
        match self.lookup(encoding_id) {
            Some(d) => d.name.to_string(),
            None => encoding_id.to_string(),
        }
    }
}

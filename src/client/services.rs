// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed one-line wrappers over the generic `service`/`async_service`
//! machinery, kept explicit as the stable call surface.

use crate::{
    client::client::UaClient,
    types::{
        encoding::UaError,
        service::{
            attribute::{ReadRequest, ReadResponse, WriteRequest, WriteResponse},
            method::{CallRequest, CallResponse},
            node_management::{
                AddNodesRequest, AddNodesResponse, AddReferencesRequest,
                AddReferencesResponse, DeleteNodesRequest, DeleteNodesResponse,
                DeleteReferencesRequest, DeleteReferencesResponse,
            },
            query::{
                QueryFirstRequest, QueryFirstResponse, QueryNextRequest,
                QueryNextResponse,
            },
            subscription::{
                CreateMonitoredItemsRequest, CreateMonitoredItemsResponse,
                CreateSubscriptionRequest, CreateSubscriptionResponse,
                DeleteMonitoredItemsRequest, DeleteMonitoredItemsResponse,
                DeleteSubscriptionsRequest, DeleteSubscriptionsResponse,
                ModifySubscriptionRequest, ModifySubscriptionResponse, PublishRequest,
                PublishResponse, RepublishRequest, RepublishResponse,
            },
            view::{
                BrowseNextRequest, BrowseNextResponse, BrowseRequest, BrowseResponse,
                RegisterNodesRequest, RegisterNodesResponse,
                TranslateBrowsePathsToNodeIdsRequest,
                TranslateBrowsePathsToNodeIdsResponse, UnregisterNodesRequest,
                UnregisterNodesResponse,
            },
        },
    },
};

macro_rules! sync_services {
    ($($(#[$meta:meta])* $name:ident: $request:ty => $response:ty;)+) => {
        impl UaClient {
            $(
                $(#[$meta])*
                pub async fn $name(
                    &mut self,
                    request: $request,
                ) -> Result<$response, UaError> {
                    self.service(request).await
                }
            )+
        }
    };
}

sync_services! {
    /// Attribute service set.
    read: ReadRequest => ReadResponse;
    write: WriteRequest => WriteResponse;

    /// Method service set.
    call: CallRequest => CallResponse;

    /// View service set.
    browse: BrowseRequest => BrowseResponse;
    browse_next: BrowseNextRequest => BrowseNextResponse;
    translate_browse_paths: TranslateBrowsePathsToNodeIdsRequest => TranslateBrowsePathsToNodeIdsResponse;
    register_nodes: RegisterNodesRequest => RegisterNodesResponse;
    unregister_nodes: UnregisterNodesRequest => UnregisterNodesResponse;

    /// NodeManagement service set.
    add_nodes: AddNodesRequest => AddNodesResponse;
    add_references: AddReferencesRequest => AddReferencesResponse;
    delete_nodes: DeleteNodesRequest => DeleteNodesResponse;
    delete_references: DeleteReferencesRequest => DeleteReferencesResponse;

    /// Query service set.
    query_first: QueryFirstRequest => QueryFirstResponse;
    query_next: QueryNextRequest => QueryNextResponse;

    /// MonitoredItem service set.
    create_monitored_items: CreateMonitoredItemsRequest => CreateMonitoredItemsResponse;
    delete_monitored_items: DeleteMonitoredItemsRequest => DeleteMonitoredItemsResponse;

    /// Subscription service set. `create_subscription` does not register
    /// a notification handler; pair it with
    /// `register_subscription_handler`.
    create_subscription: CreateSubscriptionRequest => CreateSubscriptionResponse;
    modify_subscription: ModifySubscriptionRequest => ModifySubscriptionResponse;
    delete_subscriptions: DeleteSubscriptionsRequest => DeleteSubscriptionsResponse;
    publish: PublishRequest => PublishResponse;
    republish: RepublishRequest => RepublishResponse;
}

macro_rules! async_services {
    ($($(#[$meta:meta])* $name:ident: $request:ty => $response:ty;)+) => {
        impl UaClient {
            $(
                $(#[$meta])*
                pub async fn $name<F>(
                    &mut self,
                    request: $request,
                    callback: F,
                ) -> Result<u32, UaError>
                where
                    F: FnOnce(&mut UaClient, u32, $response) + Send + 'static,
                {
                    self.async_service(request, callback).await
                }
            )+
        }
    };
}

async_services! {
    /// Dispatch a Read without blocking; the callback fires from the
    /// event loop.
    async_read: ReadRequest => ReadResponse;
    async_write: WriteRequest => WriteResponse;
    async_call: CallRequest => CallResponse;
    async_browse: BrowseRequest => BrowseResponse;
}

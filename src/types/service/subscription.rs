// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Subscription and MonitoredItem service sets (Part 4 §5.12–§5.13),
//! including the notification payloads the publish pump routes to
//! subscription handlers.

use crate::{
    service_pair,
    types::{
        basic::{DateTime, DiagnosticInfo, ExtensionObject},
        encoding::{DecodingLimits, EncodingResult},
        header::{RequestHeader, ResponseHeader},
        status::StatusCode,
        variant::DataValue,
    },
    ua_enum, ua_struct,
};

ua_struct! {
    pub struct CreateSubscriptionRequest {
        pub request_header: RequestHeader,
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub publishing_enabled: bool,
        pub priority: u8,
    }
}

ua_struct! {
    pub struct CreateSubscriptionResponse {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    pub struct ModifySubscriptionRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub priority: u8,
    }
}

ua_struct! {
    pub struct ModifySubscriptionResponse {
        pub response_header: ResponseHeader,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    pub struct DeleteSubscriptionsRequest {
        pub request_header: RequestHeader,
        pub subscription_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct DeleteSubscriptionsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    /// Acknowledges one notification so the server can drop its retransmit
    /// copy. Piggybacked on the next PublishRequest.
    pub struct SubscriptionAcknowledgement {
        pub subscription_id: u32,
        pub sequence_number: u32,
    }
}

ua_struct! {
    pub struct PublishRequest {
        pub request_header: RequestHeader,
        pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    }
}

ua_struct! {
    pub struct PublishResponse {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub available_sequence_numbers: Option<Vec<u32>>,
        pub more_notifications: bool,
        pub notification_message: NotificationMessage,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct RepublishRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub retransmit_sequence_number: u32,
    }
}

ua_struct! {
    pub struct RepublishResponse {
        pub response_header: ResponseHeader,
        pub notification_message: NotificationMessage,
    }
}

ua_struct! {
    /// One batch of notifications for a subscription. The notification
    /// data entries are extension objects resolved via
    /// [`NotificationMessage::data_changes`].
    pub struct NotificationMessage {
        pub sequence_number: u32,
        pub publish_time: DateTime,
        pub notification_data: Option<Vec<ExtensionObject>>,
    }
}

/// DefaultBinary encoding id of `DataChangeNotification`.
const DATA_CHANGE_NOTIFICATION_TYPE_ID: u32 = 811;

impl NotificationMessage {
    /// Decode every data-change entry, skipping other notification kinds
    /// (events, status changes).
    pub fn data_changes(
        &self,
        limits: &DecodingLimits,
    ) -> EncodingResult<Vec<DataChangeNotification>> {
        let Some(entries) = &self.notification_data else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for entry in entries {
            if entry.type_id.as_ns0_numeric() == Some(DATA_CHANGE_NOTIFICATION_TYPE_ID) {
                out.push(entry.decode_body::<DataChangeNotification>(limits)?);
            }
        }
        Ok(out)
    }
}

ua_struct! {
    pub struct MonitoredItemNotification {
        pub client_handle: u32,
        pub value: DataValue,
    }
}

ua_struct! {
    pub struct DataChangeNotification {
        pub monitored_items: Option<Vec<MonitoredItemNotification>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_enum! {
    pub enum MonitoringMode {
        Disabled = 0,
        Sampling = 1,
        Reporting = 2,
    }
}

ua_struct! {
    pub struct MonitoringParameters {
        pub client_handle: u32,
        pub sampling_interval: f64,
        pub filter: ExtensionObject,
        pub queue_size: u32,
        pub discard_oldest: bool,
    }
}

ua_struct! {
    pub struct MonitoredItemCreateRequest {
        pub item_to_monitor: crate::types::service::attribute::ReadValueId,
        pub monitoring_mode: MonitoringMode,
        pub requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    pub struct MonitoredItemCreateResult {
        pub status_code: StatusCode,
        pub monitored_item_id: u32,
        pub revised_sampling_interval: f64,
        pub revised_queue_size: u32,
        pub filter_result: ExtensionObject,
    }
}

ua_struct! {
    pub struct CreateMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub timestamps_to_return: crate::types::service::attribute::TimestampsToReturn,
        pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
    }
}

ua_struct! {
    pub struct CreateMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<MonitoredItemCreateResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct DeleteMonitoredItemsRequest {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct DeleteMonitoredItemsResponse {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

service_pair!(CreateSubscriptionRequest = 787, CreateSubscriptionResponse = 790);
service_pair!(ModifySubscriptionRequest = 793, ModifySubscriptionResponse = 796);
service_pair!(
    DeleteSubscriptionsRequest = 847,
    DeleteSubscriptionsResponse = 850
);
service_pair!(PublishRequest = 826, PublishResponse = 829);
service_pair!(RepublishRequest = 832, RepublishResponse = 835);
service_pair!(
    CreateMonitoredItemsRequest = 751,
    CreateMonitoredItemsResponse = 754
);
service_pair!(
    DeleteMonitoredItemsRequest = 781,
    DeleteMonitoredItemsResponse = 784
);

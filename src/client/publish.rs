// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Publish pump bookkeeping: keeps the configured number of
//! PublishRequests outstanding, collects acknowledgements to piggyback on
//! the next request, and maps subscription ids to notification handlers.

use std::collections::HashMap;

use crate::{
    client::client::UaClient,
    types::service::subscription::{NotificationMessage, SubscriptionAcknowledgement},
};

/// Handler invoked for every NotificationMessage of one subscription.
pub type SubscriptionHandler =
    Box<dyn FnMut(&mut UaClient, u32, &NotificationMessage) + Send>;

#[derive(Default)]
pub struct PublishPump {
    /// Target number of in-flight PublishRequests; 0 disables the pump.
    target: u16,
    in_flight: u16,
    /// Set after `BadTooManyPublishRequests`: no new requests until some
    /// response arrives.
    held_back: bool,
    /// Acknowledgements waiting for the next request, per subscription.
    pending_acks: HashMap<u32, Vec<u32>>,
    handlers: HashMap<u32, SubscriptionHandler>,
    /// Subscription whose handler is currently borrowed out, and whether
    /// it was unregistered while running.
    dispatching: Option<(u32, bool)>,
}

impl std::fmt::Debug for PublishPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishPump")
            .field("target", &self.target)
            .field("in_flight", &self.in_flight)
            .field("held_back", &self.held_back)
            .field("subscriptions", &self.handlers.len())
            .finish()
    }
}

impl PublishPump {
    pub fn new(target: u16) -> Self {
        PublishPump {
            target,
            ..PublishPump::default()
        }
    }

    #[inline]
    pub fn target(&self) -> u16 {
        self.target
    }

    #[inline]
    pub fn in_flight(&self) -> u16 {
        self.in_flight
    }

    pub fn register_handler(&mut self, subscription_id: u32, handler: SubscriptionHandler) {
        self.handlers.insert(subscription_id, handler);
    }

    /// Unregistering the subscription whose handler is currently running
    /// is legal; the handler is dropped once it returns.
    pub fn unregister_handler(&mut self, subscription_id: u32) {
        if let Some((dispatching_id, removed)) = &mut self.dispatching
            && *dispatching_id == subscription_id
        {
            *removed = true;
        }
        self.handlers.remove(&subscription_id);
        self.pending_acks.remove(&subscription_id);
    }

    pub fn has_subscriptions(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// How many requests are missing to reach the target.
    pub fn deficit(&self) -> u16 {
        if self.target == 0 || self.held_back || !self.has_subscriptions() {
            return 0;
        }
        self.target.saturating_sub(self.in_flight)
    }

    pub fn note_dispatched(&mut self) {
        self.in_flight = self.in_flight.saturating_add(1);
    }

    /// A response (of any outcome) arrived; the hold-back window ends.
    pub fn note_response(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.held_back = false;
    }

    /// The server refused to queue more publish requests.
    pub fn note_too_many(&mut self) {
        self.target = self.target.saturating_sub(1).max(1);
        self.held_back = true;
    }

    /// Queue an acknowledgement for `sequence_number` of a subscription.
    pub fn queue_acknowledgement(&mut self, subscription_id: u32, sequence_number: u32) {
        self.pending_acks
            .entry(subscription_id)
            .or_default()
            .push(sequence_number);
    }

    /// Drain every queued acknowledgement into the next request's shape.
    pub fn take_acknowledgements(&mut self) -> Option<Vec<SubscriptionAcknowledgement>> {
        let acks: Vec<SubscriptionAcknowledgement> = self
            .pending_acks
            .drain()
            .flat_map(|(subscription_id, seqs)| {
                seqs.into_iter()
                    .map(move |sequence_number| SubscriptionAcknowledgement {
                        subscription_id,
                        sequence_number,
                    })
            })
            .collect();
        if acks.is_empty() { None } else { Some(acks) }
    }

    /// Borrow the handler for a subscription out of the pump so it can be
    /// invoked with the client borrowed mutably.
    pub fn take_handler(&mut self, subscription_id: u32) -> Option<SubscriptionHandler> {
        let handler = self.handlers.remove(&subscription_id)?;
        self.dispatching = Some((subscription_id, false));
        Some(handler)
    }

    pub fn put_handler_back(
        &mut self,
        subscription_id: u32,
        handler: SubscriptionHandler,
    ) {
        let removed = match self.dispatching.take() {
            Some((id, removed)) if id == subscription_id => removed,
            _ => false,
        };
        if !removed {
            self.handlers.entry(subscription_id).or_insert(handler);
        }
    }

    /// Channel teardown: nothing is in flight anymore.
    pub fn reset_in_flight(&mut self) {
        self.in_flight = 0;
        self.held_back = false;
    }
}

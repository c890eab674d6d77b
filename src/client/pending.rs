// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Table of outstanding requests: one entry per dispatched request id,
//! holding the continuation that consumes the response (or the failure
//! status when no response can arrive anymore).

use std::{collections::BTreeMap, time::Instant};

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::{client::client::UaClient, types::status::StatusCode};

/// Raw outcome delivered to a continuation: the enveloped response body
/// (encoding node id + structure) or the failure status.
pub type ResponseOutcome = Result<Bytes, StatusCode>;

/// Continuation invoked exactly once per dispatched request.
pub enum Continuation {
    /// A synchronous caller parked in `service`; completed through the
    /// channel so the caller's loop can pick the outcome up.
    Sync(oneshot::Sender<ResponseOutcome>),
    /// An async caller's callback, run inline on the client.
    Async(Box<dyn FnOnce(&mut UaClient, u32, ResponseOutcome) + Send>),
}

impl Continuation {
    /// Continuation for fire-and-forget messages that never receive a
    /// response (CloseSecureChannel).
    pub fn discard() -> Self {
        let (tx, _rx) = oneshot::channel();
        Continuation::Sync(tx)
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Continuation::Sync(_) => f.write_str("Sync"),
            Continuation::Async(_) => f.write_str("Async"),
        }
    }
}

#[derive(Debug)]
pub struct PendingRequest {
    /// Request struct name, for logging only.
    pub type_name: &'static str,
    pub deadline: Instant,
    pub continuation: Continuation,
}

/// Outstanding requests ordered by request id; the ordering is what makes
/// the teardown flush deterministic.
#[derive(Debug, Default)]
pub struct RequestTable {
    entries: BTreeMap<u32, PendingRequest>,
}

impl RequestTable {
    pub fn insert(&mut self, request_id: u32, entry: PendingRequest) {
        self.entries.insert(request_id, entry);
    }

    pub fn remove(&mut self, request_id: u32) -> Option<PendingRequest> {
        self.entries.remove(&request_id)
    }

    pub fn contains(&self, request_id: u32) -> bool {
        self.entries.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deadline of the request that times out first.
    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|e| e.deadline).min()
    }

    /// Ids whose deadline has passed, in ascending order.
    pub fn expired(&self, now: Instant) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|(_, e)| e.deadline <= now)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Remove every entry, ascending by request id.
    pub fn drain_all(&mut self) -> Vec<(u32, PendingRequest)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }
}

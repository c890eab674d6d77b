// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Repeated-callback wheel: a deadline-ordered list of cyclic callbacks.
//! Structural edits against the entry that is currently firing are
//! deferred until its callback returns, so a callback may remove or
//! re-interval itself.

use std::time::{Duration, Instant};

use crate::{
    client::client::UaClient,
    types::{encoding::UaError, status::StatusCode},
};

/// Smallest legal repetition interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(5);

pub type RepeatedCallback = Box<dyn FnMut(&mut UaClient) + Send>;

struct TimerEntry {
    id: u64,
    interval: Duration,
    next_fire: Instant,
    callback: RepeatedCallback,
}

impl std::fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEntry")
            .field("id", &self.id)
            .field("interval", &self.interval)
            .field("next_fire", &self.next_fire)
            .finish()
    }
}

/// Edits requested against the firing entry while its callback runs.
#[derive(Debug, Default)]
struct FiringEdits {
    removed: bool,
    new_interval: Option<Duration>,
}

/// A timer popped from the wheel, to be re-armed after its callback
/// returns.
pub struct FiredTimer {
    pub id: u64,
    interval: Duration,
    callback: RepeatedCallback,
}

impl FiredTimer {
    pub fn run(&mut self, client: &mut UaClient) {
        (self.callback)(client);
    }
}

#[derive(Debug, Default)]
pub struct TimerWheel {
    /// Kept sorted by `next_fire`, earliest first.
    entries: Vec<TimerEntry>,
    next_id: u64,
    firing: Option<(u64, FiringEdits)>,
}

impl TimerWheel {
    /// Register a cyclic callback. The first execution is due at
    /// `now + interval`.
    pub fn add(
        &mut self,
        interval: Duration,
        callback: RepeatedCallback,
        now: Instant,
    ) -> Result<u64, UaError> {
        if interval < MIN_INTERVAL {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_ARGUMENT,
                format!("interval {interval:?} below the {MIN_INTERVAL:?} minimum"),
            ));
        }
        self.next_id += 1;
        let id = self.next_id;
        self.insert_sorted(TimerEntry {
            id,
            interval,
            next_fire: now + interval,
            callback,
        });
        Ok(id)
    }

    pub fn change_interval(
        &mut self,
        id: u64,
        interval: Duration,
        now: Instant,
    ) -> Result<(), UaError> {
        if interval < MIN_INTERVAL {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_ARGUMENT,
                format!("interval {interval:?} below the {MIN_INTERVAL:?} minimum"),
            ));
        }
        if let Some((firing_id, edits)) = &mut self.firing
            && *firing_id == id
        {
            edits.new_interval = Some(interval);
            return Ok(());
        }
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_ARGUMENT,
                format!("no repeated callback with id {id}"),
            ));
        };
        let mut entry = self.entries.remove(pos);
        entry.interval = interval;
        entry.next_fire = now + interval;
        self.insert_sorted(entry);
        Ok(())
    }

    /// Remove a callback. Removing the one currently firing is legal and
    /// takes effect once its callback returns.
    pub fn remove(&mut self, id: u64) -> Result<(), UaError> {
        if let Some((firing_id, edits)) = &mut self.firing
            && *firing_id == id
        {
            edits.removed = true;
            return Ok(());
        }
        let Some(pos) = self.entries.iter().position(|e| e.id == id) else {
            return Err(UaError::new(
                StatusCode::BAD_INVALID_ARGUMENT,
                format!("no repeated callback with id {id}"),
            ));
        };
        self.entries.remove(pos);
        Ok(())
    }

    pub fn earliest_deadline(&self) -> Option<Instant> {
        self.entries.first().map(|e| e.next_fire)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop the earliest entry due at `now` and mark it as firing.
    pub fn pop_due(&mut self, now: Instant) -> Option<FiredTimer> {
        debug_assert!(self.firing.is_none(), "pop_due while a timer is firing");
        if self.entries.first().is_none_or(|e| e.next_fire > now) {
            return None;
        }
        let entry = self.entries.remove(0);
        self.firing = Some((entry.id, FiringEdits::default()));
        Some(FiredTimer {
            id: entry.id,
            interval: entry.interval,
            callback: entry.callback,
        })
    }

    /// Re-arm a fired timer, honoring edits made during its callback.
    /// Missed periods do not pile up: the next deadline is relative to
    /// `now`, not to the old deadline.
    pub fn rearm(&mut self, fired: FiredTimer, now: Instant) {
        let edits = match self.firing.take() {
            Some((id, edits)) if id == fired.id => edits,
            _ => FiringEdits::default(),
        };
        if edits.removed {
            return;
        }
        let interval = edits.new_interval.unwrap_or(fired.interval);
        self.insert_sorted(TimerEntry {
            id: fired.id,
            interval,
            next_fire: now + interval,
            callback: fired.callback,
        });
    }

    fn insert_sorted(&mut self, entry: TimerEntry) {
        let pos = self
            .entries
            .partition_point(|e| e.next_fire <= entry.next_fire);
        self.entries.insert(pos, entry);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::{Duration, Instant};

/// Milliseconds until `deadline`, clamped to zero once it has passed.
pub fn millis_until(deadline: Instant, now: Instant) -> u64 {
    deadline.saturating_duration_since(now).as_millis() as u64
}

/// Smaller of an optional deadline and a candidate.
pub fn earlier_of(current: Option<Instant>, candidate: Option<Instant>) -> Option<Instant> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Duration until the earliest of the given deadlines, capped by `limit`.
pub fn wait_budget(deadlines: &[Option<Instant>], now: Instant, limit: Duration) -> Duration {
    let mut earliest: Option<Instant> = None;
    for d in deadlines {
        earliest = earlier_of(earliest, *d);
    }
    match earliest {
        Some(deadline) => limit.min(deadline.saturating_duration_since(now)),
        None => limit,
    }
}

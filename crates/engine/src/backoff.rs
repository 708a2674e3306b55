// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff scheduling for failed node attempts.
//!
//! Grounded in the same poll-a-deadline-map idiom as a timer scheduler:
//! instead of sleeping inline, a failed node's next attempt is given a
//! `fires_at` and the dispatcher re-checks readiness on its normal poll
//! loop, so a slow node's backoff never blocks other branches of the DAG.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const BASE_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff with a cap: `base * 2^(attempt-1)`, clamped to `MAX_DELAY`.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    BASE_DELAY.saturating_mul(factor).min(MAX_DELAY)
}

/// Tracks retry deadlines for nodes currently backing off.
#[derive(Debug, Default)]
pub struct RetryClock {
    deadlines: HashMap<String, Instant>,
}

impl RetryClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, node_id: impl Into<String>, attempt: u32, now: Instant) {
        self.deadlines.insert(node_id.into(), now + delay_for_attempt(attempt));
    }

    pub fn is_ready(&self, node_id: &str, now: Instant) -> bool {
        self.deadlines.get(node_id).is_none_or(|d| *d <= now)
    }

    pub fn clear(&mut self, node_id: &str) {
        self.deadlines.remove(node_id);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        assert_eq!(delay_for_attempt(1), BASE_DELAY);
        assert_eq!(delay_for_attempt(2), BASE_DELAY * 2);
        assert_eq!(delay_for_attempt(20), MAX_DELAY);
    }

    #[test]
    fn retry_clock_blocks_until_deadline_then_clears() {
        let mut clock = RetryClock::new();
        let now = Instant::now();
        clock.schedule("n1", 1, now);
        assert!(!clock.is_ready("n1", now));
        assert!(clock.is_ready("n1", now + BASE_DELAY));
        clock.clear("n1");
        assert!(clock.is_ready("n1", now));
    }
}

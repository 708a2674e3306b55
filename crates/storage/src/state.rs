// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay.

use relay_core::{DocumentId, DocumentRecord, Event, EventId, EventKind, EventStatus, TriggerDef};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Outcome of a single `fail()` call: whether the event goes back to
/// `Pending` for another attempt or has exhausted `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying,
    Abandoned,
}

/// Summary of one `release_stale` pass, for the caller to log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleRelease {
    pub retried: usize,
    pub abandoned: usize,
    pub abandoned_ids: Vec<EventId>,
}

/// Materialized state derived from applying every WAL entry in order.
///
/// All apply methods must be idempotent: replaying the same event twice
/// must leave the state identical to applying it once.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub events: HashMap<String, Event>,
    pub documents: HashMap<String, DocumentRecord>,
    #[serde(default)]
    pub triggers: HashMap<String, TriggerDef>,
}

impl MaterializedState {
    /// Apply a newly-appended event to the event table, keyed by its id.
    ///
    /// Coalescing (de-duplicating a burst of changes to the same path) is
    /// the watcher's responsibility; by the time an event reaches the WAL
    /// it is a distinct, already-debounced fact.
    pub fn apply_event(&mut self, event: &Event) {
        self.events.insert(event.id.as_str().to_string(), event.clone());
    }

    pub fn get_event(&self, id: &EventId) -> Option<&Event> {
        self.events.get(id.as_str())
    }

    /// Events still awaiting a claim, ordered by kind priority (deleted
    /// first) and then by detection time (oldest first).
    pub fn pending_events(&self) -> Vec<&Event> {
        let mut pending: Vec<&Event> = self
            .events
            .values()
            .filter(|e| e.status == EventStatus::Pending)
            .collect();
        pending.sort_by(|a, b| {
            b.kind
                .priority()
                .cmp(&a.kind.priority())
                .then(a.detected_at_ms.cmp(&b.detected_at_ms))
        });
        pending
    }

    /// Claim up to `max_n` pending events for `handler_id`, stamping
    /// `claimed_at_ms`.
    ///
    /// Enforces the store's per-path singleton invariant: a path with an
    /// event already `Claimed` is skipped, and at most one pending event
    /// per path is claimed within this same call.
    pub fn claim(&mut self, max_n: usize, handler_id: &str, now_ms: i64) -> Vec<EventId> {
        let mut in_flight_paths: HashSet<PathBuf> = self
            .events
            .values()
            .filter(|e| e.status == EventStatus::Claimed)
            .map(|e| e.path.clone())
            .collect();

        let mut ids: Vec<String> = Vec::new();
        for event in self.pending_events() {
            if ids.len() >= max_n {
                break;
            }
            if in_flight_paths.contains(&event.path) {
                continue;
            }
            in_flight_paths.insert(event.path.clone());
            ids.push(event.id.as_str().to_string());
        }

        for id in &ids {
            if let Some(event) = self.events.get_mut(id) {
                event.status = EventStatus::Claimed;
                event.claimed_by = Some(handler_id.to_string());
                event.claimed_at_ms = Some(now_ms);
            }
        }
        ids.into_iter().map(EventId::new).collect()
    }

    pub fn complete(&mut self, id: &EventId) {
        if let Some(event) = self.events.get_mut(id.as_str()) {
            event.status = EventStatus::Completed;
            event.claimed_by = None;
            event.claimed_at_ms = None;
        }
    }

    /// Record a failed attempt. Returns `None` if `id` is unknown, otherwise
    /// whether the event is retryable (`Pending` again) or has hit
    /// `max_attempts` and is now `Abandoned`.
    pub fn fail(&mut self, id: &EventId, error: String, max_attempts: u32) -> Option<FailOutcome> {
        let event = self.events.get_mut(id.as_str())?;
        event.attempts += 1;
        event.last_error = Some(error);
        event.claimed_by = None;
        event.claimed_at_ms = None;
        if event.attempts >= max_attempts {
            event.status = EventStatus::Abandoned;
            Some(FailOutcome::Abandoned)
        } else {
            event.status = EventStatus::Pending;
            Some(FailOutcome::Retrying)
        }
    }

    /// Release events whose claim has outlived `claim_ttl_ms`, so a crashed
    /// handler's work can be picked up again. An event that has now used up
    /// `max_attempts` is abandoned instead of released back to pending.
    pub fn release_stale(&mut self, now_ms: i64, claim_ttl_ms: i64, max_attempts: u32) -> StaleRelease {
        let mut result = StaleRelease::default();
        for event in self.events.values_mut() {
            if event.status != EventStatus::Claimed {
                continue;
            }
            let Some(claimed_at) = event.claimed_at_ms else {
                continue;
            };
            if now_ms - claimed_at < claim_ttl_ms {
                continue;
            }
            event.attempts += 1;
            event.claimed_by = None;
            event.claimed_at_ms = None;
            if event.attempts >= max_attempts {
                event.status = EventStatus::Abandoned;
                result.abandoned += 1;
                result.abandoned_ids.push(event.id.clone());
            } else {
                event.status = EventStatus::Pending;
                result.retried += 1;
            }
        }
        result
    }

    /// Ground truth B for the reconciler: the most recently completed event
    /// per path, keyed by its content hash at completion time.
    pub fn latest_done_by_path(&self) -> HashMap<PathBuf, &Event> {
        let mut latest: HashMap<PathBuf, &Event> = HashMap::new();
        for event in self.events.values() {
            if event.status != EventStatus::Completed {
                continue;
            }
            match latest.get(&event.path) {
                Some(existing) if existing.detected_at_ms >= event.detected_at_ms => {}
                _ => {
                    latest.insert(event.path.clone(), event);
                }
            }
        }
        latest
    }

    pub fn pending_queue_len(&self) -> usize {
        self.pending_events().len()
    }

    pub fn events_since(&self, since_ms: i64) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .events
            .values()
            .filter(|e| e.detected_at_ms >= since_ms)
            .collect();
        events.sort_by_key(|e| e.detected_at_ms);
        events
    }

    pub fn upsert_document(&mut self, doc: DocumentRecord) {
        self.documents.insert(doc.id.as_str().to_string(), doc);
    }

    pub fn remove_document(&mut self, id: &DocumentId) {
        self.documents.remove(id.as_str());
    }

    pub fn document_by_path(&self, path: &std::path::Path) -> Option<&DocumentRecord> {
        self.documents.values().find(|d| d.path == path)
    }

    pub fn upsert_trigger(&mut self, trigger: TriggerDef) {
        self.triggers.insert(trigger.id.as_str().to_string(), trigger);
    }

    pub fn enabled_triggers(&self) -> Vec<&TriggerDef> {
        self.triggers.values().filter(|t| t.enabled).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn event(id: &str, kind: EventKind, detected_at_ms: i64) -> Event {
        Event::new(EventId::new(id), kind, PathBuf::from("/a"), detected_at_ms)
    }

    fn event_at(id: &str, kind: EventKind, path: &str, detected_at_ms: i64) -> Event {
        Event::new(EventId::new(id), kind, PathBuf::from(path), detected_at_ms)
    }

    #[test]
    fn apply_event_is_idempotent() {
        let mut state = MaterializedState::default();
        let ev = event("e1", EventKind::Created, 0);
        state.apply_event(&ev);
        state.apply_event(&ev);
        assert_eq!(state.events.len(), 1);
    }

    #[test]
    fn claim_prioritizes_deleted_over_created() {
        let mut state = MaterializedState::default();
        state.apply_event(&event("created", EventKind::Created, 0));
        state.apply_event(&event("deleted", EventKind::Deleted, 1));
        let claimed = state.claim(1, "worker-1", 0);
        assert_eq!(claimed, vec![EventId::new("deleted")]);
    }

    #[test]
    fn claim_marks_pending_events_claimed_and_stamps_claimed_at() {
        let mut state = MaterializedState::default();
        state.apply_event(&event("e1", EventKind::Created, 0));
        let claimed = state.claim(10, "worker-1", 1_000);
        assert_eq!(claimed.len(), 1);
        let ev = state.get_event(&claimed[0]).unwrap();
        assert_eq!(ev.status, EventStatus::Claimed);
        assert_eq!(ev.claimed_at_ms, Some(1_000));
    }

    #[test]
    fn claim_never_claims_two_events_for_the_same_path() {
        let mut state = MaterializedState::default();
        state.apply_event(&event_at("e1", EventKind::Created, "/a", 0));
        state.apply_event(&event_at("e2", EventKind::Modified, "/a", 1));
        let claimed = state.claim(10, "worker-1", 0);
        assert_eq!(claimed.len(), 1);

        let in_flight = state
            .events
            .values()
            .filter(|e| e.status == EventStatus::Claimed)
            .count();
        assert_eq!(in_flight, 1);

        // The second event for the same path must stay pending, even
        // though `max_n` had room for it.
        assert_eq!(state.pending_events().len(), 1);
    }

    #[test]
    fn release_stale_returns_events_to_pending_once_ttl_elapses() {
        use relay_core::{Clock, FakeClock};

        let clock = FakeClock::new(0);
        let mut state = MaterializedState::default();
        state.apply_event(&event("e1", EventKind::Created, 0));
        state.claim(10, "worker-1", clock.now_ms());

        clock.advance_ms(100);
        let too_soon = state.release_stale(clock.now_ms(), 1_000, 5);
        assert_eq!(too_soon, StaleRelease::default());
        assert_eq!(state.pending_events().len(), 0);

        clock.advance_ms(1_900);
        let released = state.release_stale(clock.now_ms(), 1_000, 5);
        assert_eq!(released.retried, 1);
        assert_eq!(released.abandoned, 0);
        assert!(released.abandoned_ids.is_empty());
        assert_eq!(state.pending_events().len(), 1);
        assert_eq!(state.get_event(&EventId::new("e1")).unwrap().attempts, 1);
    }

    #[test]
    fn release_stale_abandons_once_max_attempts_is_reached() {
        let mut state = MaterializedState::default();
        state.apply_event(&event("e1", EventKind::Created, 0));
        state.claim(10, "worker-1", 0);

        let released = state.release_stale(2_000, 1_000, 1);
        assert_eq!(released.retried, 0);
        assert_eq!(released.abandoned, 1);
        assert_eq!(released.abandoned_ids, vec![EventId::new("e1")]);
        let ev = state.get_event(&EventId::new("e1")).unwrap();
        assert_eq!(ev.status, EventStatus::Abandoned);
        assert!(ev.is_terminal());
    }

    #[test]
    fn latest_done_by_path_picks_most_recently_completed() {
        let mut state = MaterializedState::default();
        let older = event_at("e1", EventKind::Created, "/a", 0);
        let newer = event_at("e2", EventKind::Modified, "/a", 10);
        state.apply_event(&older);
        state.apply_event(&newer);
        state.complete(&EventId::new("e1"));
        state.complete(&EventId::new("e2"));

        let done = state.latest_done_by_path();
        assert_eq!(done.get(&PathBuf::from("/a")).unwrap().id, EventId::new("e2"));
    }

    #[test]
    fn complete_sets_terminal_status() {
        let mut state = MaterializedState::default();
        state.apply_event(&event("e1", EventKind::Created, 0));
        let claimed = state.claim(10, "w1", 0);
        state.complete(&claimed[0]);
        assert_eq!(state.get_event(&claimed[0]).unwrap().status, EventStatus::Completed);
    }

    #[test]
    fn fail_retries_until_max_attempts_then_abandons() {
        let mut state = MaterializedState::default();
        state.apply_event(&event("e1", EventKind::Created, 0));
        let claimed = state.claim(10, "w1", 0);

        let outcome = state.fail(&claimed[0], "boom".into(), 2);
        assert_eq!(outcome, Some(FailOutcome::Retrying));
        assert_eq!(state.get_event(&claimed[0]).unwrap().status, EventStatus::Pending);

        state.claim(10, "w1", 1);
        let outcome = state.fail(&claimed[0], "boom again".into(), 2);
        assert_eq!(outcome, Some(FailOutcome::Abandoned));
        let ev = state.get_event(&claimed[0]).unwrap();
        assert_eq!(ev.status, EventStatus::Abandoned);
        assert_eq!(ev.attempts, 2);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger Router: matches incoming events against registered triggers'
//! predicates and decides which workflows should start a run.
//!
//! A trigger that fails to compile (a bad regex, most commonly) is disabled
//! rather than rejected outright — `relay-workflow` already validates
//! conditions at parse time, so reaching this router with an uncompilable
//! pattern would mean the trigger was disabled after the fact; route that
//! case to `disabled_reason` instead of panicking mid-dispatch.

use regex::Regex;
use relay_core::{Condition, Event, TriggerDef, WorkflowId};

/// Evaluate `trigger` against `event`, returning `true` if it should fire.
///
/// `event_kinds` is matched case-insensitively against the event's kind
/// name (`"created"`, `"modified"`, `"deleted"`, `"moved"`, `"existing"`);
/// an empty list matches every kind.
pub fn matches(trigger: &TriggerDef, event: &Event) -> bool {
    if !trigger.enabled {
        return false;
    }
    if !trigger.event_kinds.is_empty() {
        let kind_name = event_kind_name(event);
        if !trigger.event_kinds.iter().any(|k| k.eq_ignore_ascii_case(kind_name)) {
            return false;
        }
    }
    trigger.conditions.iter().all(|c| condition_matches(c, event))
}

fn event_kind_name(event: &Event) -> &'static str {
    match event.kind {
        relay_core::EventKind::Created => "created",
        relay_core::EventKind::Modified => "modified",
        relay_core::EventKind::Deleted => "deleted",
        relay_core::EventKind::Moved => "moved",
        relay_core::EventKind::Existing => "existing",
    }
}

fn event_field(event: &Event, field: &str) -> Option<String> {
    match field {
        "path" => Some(event.path.display().to_string()),
        "prev_path" => event.prev_path.as_ref().map(|p| p.display().to_string()),
        "content_hash" => event.content_hash.clone(),
        "size_bytes" => event.size_bytes.map(|n| n.to_string()),
        _ => None,
    }
}

fn condition_matches(condition: &Condition, event: &Event) -> bool {
    match condition {
        Condition::Equals { field, value } => event_field(event, field)
            .map(|v| serde_json::Value::String(v.clone()) == *value || v == value.to_string())
            .unwrap_or(false),
        Condition::NumericGt { field, value } => event_field(event, field)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v > *value)
            .unwrap_or(false),
        Condition::NumericLt { field, value } => event_field(event, field)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v < *value)
            .unwrap_or(false),
        Condition::StringPrefix { field, prefix } => {
            event_field(event, field).map(|v| v.starts_with(prefix)).unwrap_or(false)
        }
        Condition::Regex { field, pattern } => event_field(event, field)
            .and_then(|v| Regex::new(pattern).ok().map(|re| re.is_match(&v)))
            .unwrap_or(false),
    }
}

/// Workflows whose triggers match `event`, in trigger-definition order.
pub fn route(triggers: &[TriggerDef], event: &Event) -> Vec<WorkflowId> {
    triggers
        .iter()
        .filter(|t| matches(t, event))
        .map(|t| t.workflow_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{EventId, EventKind, EventStatus, TriggerId};
    use std::path::PathBuf;

    fn event(path: &str, kind: EventKind) -> Event {
        Event {
            id: EventId::new("e1"),
            kind,
            path: PathBuf::from(path),
            prev_path: None,
            size_bytes: None,
            mtime_ms: None,
            content_hash: None,
            detected_at_ms: 0,
            status: EventStatus::Pending,
            attempts: 0,
            last_error: None,
            claimed_by: None,
            claimed_at_ms: None,
        }
    }

    fn trigger(workflow_id: &str, event_kinds: &[&str], conditions: Vec<Condition>) -> TriggerDef {
        TriggerDef {
            id: TriggerId::new("t1"),
            workflow_id: WorkflowId::new(workflow_id),
            event_kinds: event_kinds.iter().map(|s| s.to_string()).collect(),
            conditions,
            enabled: true,
            disabled_reason: None,
        }
    }

    #[test]
    fn matches_filters_by_event_kind() {
        let t = trigger("wf", &["created"], vec![]);
        assert!(matches(&t, &event("/a.txt", EventKind::Created)));
        assert!(!matches(&t, &event("/a.txt", EventKind::Modified)));
    }

    #[test]
    fn matches_evaluates_string_prefix_condition() {
        let t = trigger(
            "wf",
            &[],
            vec![Condition::StringPrefix {
                field: "path".into(),
                prefix: "/docs".into(),
            }],
        );
        assert!(matches(&t, &event("/docs/a.txt", EventKind::Created)));
        assert!(!matches(&t, &event("/other/a.txt", EventKind::Created)));
    }

    #[test]
    fn disabled_trigger_never_matches() {
        let mut t = trigger("wf", &[], vec![]);
        t.enabled = false;
        assert!(!matches(&t, &event("/a.txt", EventKind::Created)));
    }

    #[test]
    fn route_collects_matching_workflow_ids() {
        let triggers = vec![trigger("wf-1", &["created"], vec![]), trigger("wf-2", &["deleted"], vec![])];
        let ids = route(&triggers, &event("/a.txt", EventKind::Created));
        assert_eq!(ids, vec![WorkflowId::new("wf-1")]);
    }
}

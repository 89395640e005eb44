//! Bounded recovery event log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events retained before the oldest is dropped.
pub const MAX_EVENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventType {
    RecoveryConfigured,
    GuardianUpdated,
    ShareAcknowledged,
    ShareDistributed,
    RecoveryInitiated,
    RecoveryCancelled,
    ShareSubmitted,
    RecoveryCompleted,
    SharesRegenerated,
    StateImported,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub id: Uuid,
    pub event_type: RecoveryEventType,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

impl RecoveryEvent {
    pub fn new(
        event_type: RecoveryEventType,
        timestamp: DateTime<Utc>,
        data: serde_json::Value,
        actor: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp,
            data,
            actor,
        }
    }
}

/// Ring buffer of the most recent [`MAX_EVENTS`] events, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<RecoveryEvent>", into = "Vec<RecoveryEvent>")]
pub struct EventLog {
    events: VecDeque<RecoveryEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: RecoveryEvent) {
        while self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Last `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<RecoveryEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl From<Vec<RecoveryEvent>> for EventLog {
    fn from(events: Vec<RecoveryEvent>) -> Self {
        let mut log = Self::new();
        for event in events {
            log.push(event);
        }
        log
    }
}

impl From<EventLog> for Vec<RecoveryEvent> {
    fn from(log: EventLog) -> Self {
        log.events.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(n: usize) -> RecoveryEvent {
        RecoveryEvent::new(
            RecoveryEventType::ShareSubmitted,
            Utc::now(),
            json!({ "n": n }),
            None,
        )
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = EventLog::new();
        for n in 0..(MAX_EVENTS + 25) {
            log.push(event(n));
        }
        assert_eq!(log.len(), MAX_EVENTS);

        let all = log.recent(usize::MAX);
        assert_eq!(all[0].data["n"], 25);
        assert_eq!(all[MAX_EVENTS - 1].data["n"], MAX_EVENTS + 24);
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut log = EventLog::new();
        for n in 0..5 {
            log.push(event(n));
        }
        let tail: Vec<_> = log.recent(2).iter().map(|e| e.data["n"].clone()).collect();
        assert_eq!(tail, vec![json!(3), json!(4)]);
        assert!(log.recent(0).is_empty());
    }

    #[test]
    fn test_event_type_serializes_snake_case() {
        let value = serde_json::to_value(RecoveryEventType::RecoveryConfigured).unwrap();
        assert_eq!(value, json!("recovery_configured"));
    }

    #[test]
    fn test_serde_truncates_oversized_input() {
        let events: Vec<RecoveryEvent> = (0..MAX_EVENTS + 3).map(event).collect();
        let json = serde_json::to_string(&events).unwrap();
        let log: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(log.len(), MAX_EVENTS);
    }
}

//! Event types for controller observability
//!
//! Events provide a unified stream of reconcile activity.

use crate::ObjectKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all controller events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Name of the controller that emitted the event
    pub controller: String,

    /// Event severity
    pub severity: EventSeverity,

    /// The actual event
    pub event: ControllerEvent,
}

impl ControllerEventEnvelope {
    pub fn new(controller: impl Into<String>, event: ControllerEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            controller: controller.into(),
            severity: event.severity(),
            event,
        }
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Controller events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControllerEvent {
    /// A watch event was mapped to reconcile requests
    ReconcileRequested { key: ObjectKey, trigger: String },

    /// A worker picked the request up
    ReconcileStarted { key: ObjectKey, attempt: u32 },

    /// Rendering finished and the output was published
    ReconcileSucceeded { key: ObjectKey, rendered_version: u64 },

    /// The reconcile failed
    ReconcileFailed {
        key: ObjectKey,
        reason: String,
        /// Whether the scheduler will retry
        retrying: bool,
    },

    /// Retry budget exhausted, the request was dropped
    ReconcileAbandoned { key: ObjectKey, attempts: u32 },
}

impl ControllerEvent {
    pub fn key(&self) -> &ObjectKey {
        match self {
            ControllerEvent::ReconcileRequested { key, .. }
            | ControllerEvent::ReconcileStarted { key, .. }
            | ControllerEvent::ReconcileSucceeded { key, .. }
            | ControllerEvent::ReconcileFailed { key, .. }
            | ControllerEvent::ReconcileAbandoned { key, .. } => key,
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            ControllerEvent::ReconcileRequested { .. } | ControllerEvent::ReconcileStarted { .. } => {
                EventSeverity::Debug
            }
            ControllerEvent::ReconcileSucceeded { .. } => EventSeverity::Info,
            ControllerEvent::ReconcileFailed { retrying: true, .. } => EventSeverity::Warning,
            ControllerEvent::ReconcileFailed { .. } | ControllerEvent::ReconcileAbandoned { .. } => {
                EventSeverity::Error
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_takes_event_severity() {
        let key = ObjectKey::new("fleet", "cf");
        let envelope = ControllerEventEnvelope::new(
            "deployment",
            ControllerEvent::ReconcileFailed {
                key: key.clone(),
                reason: "boom".into(),
                retrying: true,
            },
        );
        assert_eq!(envelope.severity, EventSeverity::Warning);
        assert_eq!(envelope.event.key(), &key);
    }

    #[test]
    fn test_abandon_is_error() {
        let event = ControllerEvent::ReconcileAbandoned {
            key: ObjectKey::new("fleet", "cf"),
            attempts: 5,
        };
        assert_eq!(event.severity(), EventSeverity::Error);
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = ControllerEventEnvelope::new(
            "deployment",
            ControllerEvent::ReconcileSucceeded {
                key: ObjectKey::new("fleet", "cf"),
                rendered_version: 3,
            },
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["controller"], "deployment");
        assert_eq!(json["severity"], "Info");
        assert_eq!(json["event"]["ReconcileSucceeded"]["rendered_version"], 3);
    }
}

//! Agent states and the events emitted on every transition.
//!
//! ## State machine
//!
//! ```text
//! initializing → retrieving → drafting → validating → finalizing → complete
//!                                 ↑          │
//!                                 │          ↓
//!                           correcting ← violation_found
//! ```
//!
//! `error` is reachable from every non-terminal state. A failed draft goes
//! straight from `drafting` to `violation_found` (implicit violation) or,
//! at the attempt ceiling, to `finalizing` when an earlier draft exists.

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use covenant_core::{CandidateOutput, ValidationResult, Violation};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Initializing,
    Retrieving,
    Drafting,
    Validating,
    ViolationFound,
    Correcting,
    Finalizing,
    Complete,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Initializing => "initializing",
            AgentState::Retrieving => "retrieving",
            AgentState::Drafting => "drafting",
            AgentState::Validating => "validating",
            AgentState::ViolationFound => "violation_found",
            AgentState::Correcting => "correcting",
            AgentState::Finalizing => "finalizing",
            AgentState::Complete => "complete",
            AgentState::Error => "error",
        }
    }

    /// `complete` and `error` end a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Complete | AgentState::Error)
    }

    /// Whether `next` may directly follow `self`.
    pub fn can_transition_to(&self, next: AgentState) -> bool {
        use AgentState::*;

        if self.is_terminal() {
            return false;
        }
        if next == Error {
            return true;
        }
        matches!(
            (self, next),
            (Initializing, Retrieving)
                | (Retrieving, Drafting)
                | (Drafting, Validating)
                | (Drafting, ViolationFound)
                | (Drafting, Finalizing)
                | (Validating, ViolationFound)
                | (Validating, Finalizing)
                | (ViolationFound, Correcting)
                | (Correcting, Drafting)
                | (Finalizing, Complete)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a state sequence is a path through the state machine.
///
/// An empty sequence is a valid (cancelled-before-start) path.
pub fn is_valid_path(states: &[AgentState]) -> bool {
    match states.first() {
        None => true,
        Some(AgentState::Initializing) => states.windows(2).all(|w| w[0].can_transition_to(w[1])),
        Some(_) => false,
    }
}

/// One emitted event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub state: AgentState,

    /// User-safe message
    pub message: String,

    /// State-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub timestamp: DateTime<Utc>,
}

impl AgentEvent {
    pub fn new(state: AgentState, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            state,
            message: message.into(),
            data: None,
            timestamp,
        }
    }

    /// Attach a serializable payload.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.data = serde_json::to_value(payload).ok();
        self
    }

    /// Decode the payload into a typed structure.
    pub fn payload<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// Violation list of a `violation_found` event.
    pub fn violations(&self) -> Option<Vec<Violation>> {
        if self.state != AgentState::ViolationFound {
            return None;
        }
        self.payload::<ViolationPayload>().map(|p| p.violations)
    }

    /// Final payload of a `complete` event.
    pub fn completion(&self) -> Option<CompletePayload> {
        if self.state != AgentState::Complete {
            return None;
        }
        self.payload()
    }
}

/// Payload of `drafting`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftingPayload {
    pub attempt: u32,
    pub max_attempts: u32,
    pub context_snippets: usize,
}

/// Payload of `validating`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatingPayload {
    pub clauses_count: usize,
    pub confidence: f64,
}

/// Payload of `violation_found`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationPayload {
    pub violations: Vec<Violation>,
}

/// Payload of `correcting`: the addendum injected into the next attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionPayload {
    pub addendum: String,
    pub next_attempt: u32,
}

/// Payload of `finalizing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizingPayload {
    pub is_valid: bool,
    pub attempt: u32,
}

/// Payload of `complete`; the authoritative end-of-stream marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletePayload {
    pub output: CandidateOutput,
    pub validation: ValidationResult,
    pub total_attempts: u32,
}

/// Per-session clock with strictly increasing readings.
#[derive(Debug, Default)]
pub(crate) struct EventClock {
    last: Option<DateTime<Utc>>,
}

impl EventClock {
    pub(crate) fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last {
            if now <= last {
                now = last + TimeDelta::nanoseconds(1);
            }
        }
        self.last = Some(now);
        now
    }
}

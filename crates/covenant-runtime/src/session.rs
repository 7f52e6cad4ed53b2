//! Generation requests, per-request sessions, and final results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use covenant_core::{CandidateOutput, ValidationResult};

use crate::events::{AgentEvent, AgentState, DraftingPayload, EventClock};

/// A caller's generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Free-text drafting instruction (non-empty)
    pub prompt: String,

    /// Contract type, e.g. "Data Processing Agreement"
    #[serde(default)]
    pub contract_type: String,

    /// Governing jurisdiction, e.g. "European Union"
    #[serde(default)]
    pub jurisdiction: String,

    /// Constraint preset name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        contract_type: impl Into<String>,
        jurisdiction: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            contract_type: contract_type.into(),
            jurisdiction: jurisdiction.into(),
            preset: None,
        }
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        output: CandidateOutput,
        validation: ValidationResult,
    },
    Failed {
        message: String,
    },
}

/// One request's lifetime.
///
/// Owned by the task driving it and never shared. The attempt counter only
/// moves up, one step per `drafting` state, and the outcome is set exactly
/// when a terminal state is entered.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    request: GenerationRequest,
    max_attempts: u32,
    attempts: u32,
    state: Option<AgentState>,
    events: Vec<AgentEvent>,
    outcome: Option<Outcome>,
    clock: EventClock,
}

impl Session {
    pub fn new(request: GenerationRequest, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            max_attempts,
            attempts: 0,
            state: None,
            events: Vec::new(),
            outcome: None,
            clock: EventClock::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Current state; `None` before the first transition.
    pub fn state(&self) -> Option<AgentState> {
        self.state
    }

    pub fn events(&self) -> &[AgentEvent] {
        &self.events
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Count a new drafting attempt. Returns the 1-based attempt number.
    pub(crate) fn begin_attempt(&mut self) -> u32 {
        debug_assert!(self.has_attempts_left(), "attempt ceiling exceeded");
        self.attempts = (self.attempts + 1).min(self.max_attempts);
        self.attempts
    }

    /// Enter `state`, record the event, and return a copy for delivery.
    pub(crate) fn transition(
        &mut self,
        state: AgentState,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> AgentEvent {
        debug_assert!(
            match self.state {
                None => state == AgentState::Initializing,
                Some(current) => current.can_transition_to(state),
            },
            "illegal transition {:?} -> {}",
            self.state,
            state
        );

        let mut event = AgentEvent::new(state, message, self.clock.now());
        event.data = data;
        self.state = Some(state);
        self.events.push(event.clone());
        event
    }

    pub(crate) fn complete(&mut self, output: CandidateOutput, validation: ValidationResult) {
        self.outcome = Some(Outcome::Completed { output, validation });
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.outcome = Some(Outcome::Failed {
            message: message.into(),
        });
    }
}

/// Final result of a session, as delivered to a batch caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Reached `complete` with a valid candidate
    pub success: bool,

    pub total_attempts: u32,

    /// Absent on total failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CandidateOutput>,

    /// Absent on total failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,

    /// User-safe message, present iff `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Full audit trail
    #[serde(default)]
    pub events: Vec<AgentEvent>,
}

impl GenerationResult {
    /// Rebuild the result from a session's event sequence.
    ///
    /// Returns `None` when the sequence has no terminal event, i.e. the
    /// session was cancelled.
    pub fn from_events(events: Vec<AgentEvent>) -> Option<Self> {
        let terminal = events.iter().rev().find(|e| e.state.is_terminal())?.clone();

        let attempts_seen = events
            .iter()
            .filter(|e| e.state == AgentState::Drafting)
            .filter_map(|e| e.payload::<DraftingPayload>())
            .map(|p| p.attempt)
            .max()
            .unwrap_or(0);

        let result = match terminal.completion() {
            Some(done) => {
                let success = done.validation.is_valid;
                let error = (!success).then(|| {
                    format!("Validation failed after {} attempts.", done.total_attempts)
                });
                Self {
                    success,
                    total_attempts: done.total_attempts,
                    output: Some(done.output),
                    validation: Some(done.validation),
                    error,
                    events,
                }
            }
            None => Self {
                success: false,
                total_attempts: attempts_seen,
                output: None,
                validation: None,
                error: Some(terminal.message),
                events,
            },
        };
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CompletePayload;
    use covenant_core::Clause;

    fn request() -> GenerationRequest {
        GenerationRequest::new("Draft a liability clause", "Data Processing Agreement", "European Union")
    }

    fn candidate() -> CandidateOutput {
        CandidateOutput {
            clauses: vec![Clause::new("Limitation of Liability", "Capped.")],
            summary: "One clause".to_string(),
            governing_jurisdiction: "European Union".to_string(),
            confidence_score: 0.9,
        }
    }

    #[test]
    fn test_attempts_bounded() {
        let mut session = Session::new(request(), 2);
        assert_eq!(session.begin_attempt(), 1);
        assert!(session.has_attempts_left());
        assert_eq!(session.begin_attempt(), 2);
        assert!(!session.has_attempts_left());
    }

    #[test]
    fn test_transition_records_events_in_order() {
        let mut session = Session::new(request(), 3);
        session.transition(AgentState::Initializing, "start", None);
        session.transition(AgentState::Retrieving, "retrieve", None);
        assert_eq!(session.state(), Some(AgentState::Retrieving));
        assert_eq!(session.events().len(), 2);
        assert!(session.events()[0].timestamp < session.events()[1].timestamp);
        assert!(session.outcome().is_none());
    }

    #[test]
    fn test_result_from_complete_event() {
        let mut session = Session::new(request(), 3);
        session.transition(AgentState::Initializing, "start", None);
        session.transition(AgentState::Retrieving, "retrieve", None);
        session.transition(AgentState::Drafting, "draft", None);
        session.transition(AgentState::Validating, "validate", None);
        session.transition(AgentState::Finalizing, "finalize", None);
        let payload = CompletePayload {
            output: candidate(),
            validation: ValidationResult {
                is_valid: false,
                violations: vec![],
                attempt_number: 3,
            },
            total_attempts: 3,
        };
        let data = serde_json::to_value(&payload).ok();
        session.transition(AgentState::Complete, "done", data);

        let result = GenerationResult::from_events(session.events().to_vec()).unwrap();
        assert!(!result.success);
        assert_eq!(result.total_attempts, 3);
        assert_eq!(result.error.as_deref(), Some("Validation failed after 3 attempts."));
        assert_eq!(result.output, Some(candidate()));
    }

    #[test]
    fn test_result_from_error_event() {
        let mut session = Session::new(request(), 3);
        session.transition(AgentState::Initializing, "start", None);
        session.transition(AgentState::Retrieving, "retrieve", None);
        session.transition(AgentState::Error, "Source retrieval failed", None);
        session.fail("Source retrieval failed");

        let result = GenerationResult::from_events(session.events().to_vec()).unwrap();
        assert!(!result.success);
        assert_eq!(result.total_attempts, 0);
        assert!(result.output.is_none());
        assert_eq!(result.error.as_deref(), Some("Source retrieval failed"));
        assert!(matches!(session.outcome(), Some(Outcome::Failed { .. })));
    }

    #[test]
    fn test_no_terminal_event_means_no_result() {
        let mut session = Session::new(request(), 3);
        session.transition(AgentState::Initializing, "start", None);
        assert!(GenerationResult::from_events(session.events().to_vec()).is_none());
    }
}

//! The drafting orchestrator.
//!
//! Drives one session through retrieve → draft → validate, looping through
//! correction until the candidate is valid or the attempt ceiling is hit.
//! Every transition is written to the session's event channel; batch and
//! streaming callers are two readers of that channel.
//!
//! The only suspension points are the retriever call, the drafter call, and
//! event delivery. Cancellation is checked at each of them; once observed,
//! the session stops without a terminal event.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use covenant_core::{
    CandidateOutput, CitationResolver, ConstraintError, ConstraintSet, PresetError, PresetRegistry,
    ValidationResult, Validator, Violation,
};

use crate::config::{ConfigError, RuntimeConfig};
use crate::corrections::{build_addendum, generation_failure_violation};
use crate::drafter::{DraftRequest, Drafter};
use crate::events::{
    AgentState, CompletePayload, CorrectionPayload, DraftingPayload, FinalizingPayload,
    ValidatingPayload, ViolationPayload,
};
use crate::retrieval::{CitationSnippet, RetrievalQuery, Retriever};
use crate::session::{GenerationRequest, GenerationResult, Session};
use crate::stream::{Cancelled, EventSink, EventStream};

/// User-safe message for a failed retrieval.
pub const RETRIEVAL_FAILED: &str = "Source retrieval failed";

/// User-safe message when no attempt produced a candidate.
pub const GENERATION_FAILED: &str = "Generation could not be completed";

/// Errors raised before a session starts. Nothing here is ever emitted as
/// an event.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Configuration(#[from] PresetError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid constraints: {0}")]
    Constraints(#[from] ConstraintError),

    #[error("Invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Orchestrator not configured: {0}")]
    NotConfigured(String),

    #[error("Session was cancelled before completing")]
    Aborted,
}

/// A request resolved against the preset registry.
struct Prepared {
    request: GenerationRequest,
    constraints: Arc<ConstraintSet>,
}

/// Runs generation sessions.
///
/// Cheap to clone; clones share the retriever, drafter, and preset table.
/// Holds no per-session state.
#[derive(Clone)]
pub struct Orchestrator {
    retriever: Arc<dyn Retriever>,
    drafter: Arc<dyn Drafter>,
    presets: Arc<PresetRegistry>,
    resolver: Option<Arc<dyn CitationResolver>>,
    max_attempts: u32,
    event_buffer: usize,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    /// Run a session to completion and return its result.
    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationResult, OrchestratorError> {
        self.run_until_cancelled(request, CancellationToken::new())
            .await?
            .ok_or(OrchestratorError::Aborted)
    }

    /// Run a session until it completes or `cancel` fires.
    ///
    /// `Ok(None)` means the session was cancelled; that is not an error.
    pub async fn run_until_cancelled(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<Option<GenerationResult>, OrchestratorError> {
        let prepared = self.prepare(request)?;
        let (tx, mut rx) = mpsc::channel(self.event_buffer);
        let sink = EventSink::new(tx, cancel);

        let collect = async {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        };
        let ((), events) = tokio::join!(self.execute(prepared, sink), collect);

        Ok(GenerationResult::from_events(events))
    }

    /// Start a session and deliver its events incrementally.
    ///
    /// Configuration errors surface here, before any event exists.
    pub fn stream(&self, request: GenerationRequest) -> Result<EventStream, OrchestratorError> {
        self.stream_with_cancel(request, &CancellationToken::new())
    }

    /// Like [`stream`](Self::stream), also stopping when `cancel` fires.
    pub fn stream_with_cancel(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream, OrchestratorError> {
        let prepared = self.prepare(request)?;
        let token = cancel.child_token();
        let (tx, rx) = mpsc::channel(self.event_buffer);
        let sink = EventSink::new(tx, token.clone());

        let this = self.clone();
        let task = tokio::spawn(async move { this.execute(prepared, sink).await });

        Ok(EventStream::new(rx, token, task))
    }

    /// Validate the request and resolve its constraint set.
    fn prepare(&self, mut request: GenerationRequest) -> Result<Prepared, OrchestratorError> {
        if request.prompt.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest("prompt must not be empty".to_string()));
        }

        let constraints = match request.preset.as_deref() {
            Some(name) => {
                let preset = self.presets.lookup(name)?;
                if request.contract_type.trim().is_empty() {
                    request.contract_type = preset.contract_type.clone();
                }
                if request.jurisdiction.trim().is_empty() {
                    request.jurisdiction = preset.jurisdiction.clone();
                }
                preset.constraints.clone()
            }
            None => {
                if request.jurisdiction.trim().is_empty() {
                    return Err(OrchestratorError::InvalidRequest(
                        "jurisdiction is required when no preset is named".to_string(),
                    ));
                }
                PresetRegistry::fallback(&request.contract_type, &request.jurisdiction)?
            }
        };

        Ok(Prepared {
            request,
            constraints: Arc::new(constraints),
        })
    }

    async fn execute(&self, prepared: Prepared, sink: EventSink) {
        let Prepared { request, constraints } = prepared;
        let mut session = Session::new(request, self.max_attempts);
        let span = info_span!(
            "session",
            session_id = %session.id(),
            preset = session.request().preset.as_deref().unwrap_or("-"),
        );

        async {
            match self.drive(&mut session, &constraints, &sink).await {
                Ok(()) => info!(
                    attempts = session.attempts(),
                    state = ?session.state(),
                    "session finished"
                ),
                Err(Cancelled) => info!(
                    attempts = session.attempts(),
                    state = ?session.state(),
                    "session cancelled"
                ),
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        session: &mut Session,
        constraints: &Arc<ConstraintSet>,
        sink: &EventSink,
    ) -> Result<(), Cancelled> {
        enter(session, sink, AgentState::Initializing, "Starting contract generation...", None).await?;

        let query = RetrievalQuery::new(
            session.request().contract_type.clone(),
            session.request().jurisdiction.clone(),
            session.request().preset.clone(),
        );
        let message = format!("Retrieving sources for {}...", query.contract_type);
        enter(session, sink, AgentState::Retrieving, message, None).await?;

        let context: Vec<CitationSnippet> = match sink.guard(self.retriever.retrieve(&query)).await? {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(retriever = self.retriever.name(), error = %e, "retrieval failed");
                return fail(session, sink, RETRIEVAL_FAILED).await;
            }
        };
        debug!(snippets = context.len(), "context retrieved");

        let mut validator = Validator::new();
        if let Some(resolver) = self.resolver.as_deref() {
            validator = validator.with_resolver(resolver);
        }

        let mut corrections: Vec<String> = Vec::new();
        let mut best: Option<(CandidateOutput, ValidationResult)> = None;

        loop {
            let attempt = session.begin_attempt();
            let message = format!(
                "Drafting clauses (attempt {}/{})...",
                attempt,
                session.max_attempts()
            );
            let data = payload(&DraftingPayload {
                attempt,
                max_attempts: session.max_attempts(),
                context_snippets: context.len(),
            });
            enter(session, sink, AgentState::Drafting, message, data).await?;

            let draft_request = DraftRequest {
                prompt: session.request().prompt.clone(),
                contract_type: session.request().contract_type.clone(),
                jurisdiction: session.request().jurisdiction.clone(),
                context: context.clone(),
                corrections: corrections.clone(),
                constraints: Arc::clone(constraints),
                attempt,
            };

            let violations: Vec<Violation> = match sink.guard(self.drafter.draft(&draft_request)).await? {
                Ok(candidate) => {
                    let message = format!("Validating {} clause(s)...", candidate.clauses.len());
                    let data = payload(&ValidatingPayload {
                        clauses_count: candidate.clauses.len(),
                        confidence: candidate.confidence_score,
                    });
                    enter(session, sink, AgentState::Validating, message, data).await?;

                    let validation = validator
                        .validate(&candidate, constraints, &session.request().contract_type)
                        .with_attempt(attempt);

                    if validation.is_valid || !session.has_attempts_left() {
                        return finalize(session, sink, candidate, validation).await;
                    }

                    let violations = validation.violations.clone();
                    best = Some((candidate, validation));
                    violations
                }
                Err(e) => {
                    warn!(drafter = self.drafter.name(), attempt, error = %e, "drafting failed");
                    if !session.has_attempts_left() {
                        return match best.take() {
                            Some((candidate, validation)) => {
                                finalize(session, sink, candidate, validation).await
                            }
                            None => fail(session, sink, GENERATION_FAILED).await,
                        };
                    }
                    vec![generation_failure_violation()]
                }
            };

            info!(attempt, violations = violations.len(), "attempt rejected");
            let message = format!("Found {} violation(s)", violations.len());
            let addendum = build_addendum(&violations, attempt);
            let data = payload(&ViolationPayload { violations });
            enter(session, sink, AgentState::ViolationFound, message, data).await?;

            corrections.push(addendum.clone());
            let next_attempt = attempt + 1;
            let message = format!("Applying corrections for attempt {}...", next_attempt);
            let data = payload(&CorrectionPayload {
                addendum,
                next_attempt,
            });
            enter(session, sink, AgentState::Correcting, message, data).await?;
        }
    }
}

/// Record a transition and deliver its event.
///
/// Nothing is recorded once cancellation has been requested.
async fn enter(
    session: &mut Session,
    sink: &EventSink,
    state: AgentState,
    message: impl Into<String>,
    data: Option<Value>,
) -> Result<(), Cancelled> {
    sink.check()?;
    let event = session.transition(state, message, data);
    debug!(state = %state, "state transition");
    sink.emit(event).await
}

async fn finalize(
    session: &mut Session,
    sink: &EventSink,
    output: CandidateOutput,
    validation: ValidationResult,
) -> Result<(), Cancelled> {
    let is_valid = validation.is_valid;
    let message = if is_valid {
        "Finalizing validated output..."
    } else {
        "Finalizing best-effort output; constraints not fully satisfied..."
    };
    let data = payload(&FinalizingPayload {
        is_valid,
        attempt: validation.attempt_number,
    });
    enter(session, sink, AgentState::Finalizing, message, data).await?;

    let total_attempts = session.attempts();
    let message = if is_valid {
        format!("Generation complete after {} attempt(s)", total_attempts)
    } else {
        format!("Validation failed after {} attempts.", total_attempts)
    };
    let data = payload(&CompletePayload {
        output: output.clone(),
        validation: validation.clone(),
        total_attempts,
    });
    enter(session, sink, AgentState::Complete, message, data).await?;

    if !is_valid {
        warn!(
            attempts = total_attempts,
            violations = validation.violations.len(),
            "returning output that failed validation"
        );
    }
    session.complete(output, validation);
    Ok(())
}

async fn fail(session: &mut Session, sink: &EventSink, message: &str) -> Result<(), Cancelled> {
    enter(session, sink, AgentState::Error, message, None).await?;
    session.fail(message);
    Ok(())
}

fn payload<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, "failed to serialize event payload");
            None
        }
    }
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    retriever: Option<Arc<dyn Retriever>>,
    drafter: Option<Arc<dyn Drafter>>,
    presets: Option<Arc<PresetRegistry>>,
    resolver: Option<Arc<dyn CitationResolver>>,
    config: RuntimeConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            retriever: None,
            drafter: None,
            presets: None,
            resolver: None,
            config: RuntimeConfig::default(),
        }
    }

    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn drafter(mut self, drafter: Arc<dyn Drafter>) -> Self {
        self.drafter = Some(drafter);
        self
    }

    /// Preset table; the built-in presets when unset.
    pub fn presets(mut self, presets: Arc<PresetRegistry>) -> Self {
        self.presets = Some(presets);
        self
    }

    /// Resolver for strict citation checks.
    pub fn resolver(mut self, resolver: Arc<dyn CitationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn build(self) -> Result<Orchestrator, OrchestratorError> {
        self.config.validate()?;

        let retriever = self
            .retriever
            .ok_or_else(|| OrchestratorError::NotConfigured("No retriever set".to_string()))?;
        let drafter = self
            .drafter
            .ok_or_else(|| OrchestratorError::NotConfigured("No drafter set".to_string()))?;
        let presets = match self.presets {
            Some(presets) => presets,
            None => Arc::new(PresetRegistry::builtin()?),
        };

        Ok(Orchestrator {
            retriever,
            drafter,
            presets,
            resolver: self.resolver,
            max_attempts: self.config.max_attempts,
            event_buffer: self.config.event_buffer,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! # covenant-runtime
//!
//! LLM-assisted clause drafting with deterministic validation.
//!
//! A session retrieves citable source text, asks a [`Drafter`] for a
//! candidate, and checks it with the `covenant-core` validator. Rejected
//! candidates feed a correction addendum into the next attempt, up to a
//! fixed ceiling. Every transition is an [`AgentEvent`].
//!
//! ## Important
//!
//! The drafter is the only component that talks to a model, and it never
//! decides validity. Validation is always the deterministic core.
//!
//! ## Example
//!
//! ```rust,ignore
//! use covenant_runtime::{GenerationRequest, Orchestrator};
//!
//! let orchestrator = Orchestrator::builder()
//!     .retriever(retriever)
//!     .drafter(drafter)
//!     .build()?;
//!
//! let request = GenerationRequest::new("Draft a liability cap", "", "").with_preset("dpa");
//!
//! // All at once
//! let result = orchestrator.run(request.clone()).await?;
//!
//! // Or one event at a time
//! let mut stream = orchestrator.stream(request)?;
//! while let Some(event) = stream.next_event().await {
//!     println!("{}", covenant_runtime::encode_frame(&event)?);
//! }
//! ```

pub mod config;
pub mod corrections;
pub mod drafter;
pub mod events;
pub mod framing;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod retrieval;
pub mod session;
pub mod stream;
pub mod usage;

pub use config::{CacheConfig, ConfigError, ProviderConfig, ProviderKind, RetrievalConfig, RuntimeConfig};
pub use drafter::{DraftError, DraftRequest, Drafter, LlmDrafter, ScriptedDrafter};
pub use events::{is_valid_path, AgentEvent, AgentState};
pub use framing::{decode_frame, encode_frame, FrameDecoder};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorError};
pub use providers::{build_provider, CompletionConfig, LlmProvider, ProviderError};
pub use retrieval::{
    CachedRetriever, CitationSnippet, CorpusRetriever, RetrievalError, RetrievalQuery, Retriever,
    StaticRetriever,
};
pub use session::{GenerationRequest, GenerationResult, Outcome, Session};
pub use stream::EventStream;
pub use usage::{LlmUsage, UsageTracker};

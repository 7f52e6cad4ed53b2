//! covenant CLI
//!
//! Logs go to stderr (`RUST_LOG`, default `info`) so stdout carries only
//! results and stream frames.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use covenant_core::{
    parse_candidate, CitationCorpus, ConstraintSet, PresetRegistry, ValidationResult, Validator,
};
use covenant_runtime::{
    build_provider, encode_frame, CachedRetriever, CompletionConfig, CorpusRetriever, Drafter,
    GenerationRequest, GenerationResult, LlmDrafter, Orchestrator, Retriever, RuntimeConfig,
    ScriptedDrafter,
};
use tokio_util::sync::CancellationToken;

/// Exit code for a session stopped by Ctrl-C.
const EXIT_CANCELLED: u8 = 130;

#[derive(Parser)]
#[command(name = "covenant")]
#[command(about = "Draft and validate contract clauses against constraint presets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available constraint presets
    Presets {
        /// Extra preset file merged over the built-ins
        #[arg(long)]
        presets: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a candidate JSON file offline
    Validate {
        /// Candidate output file
        #[arg(short, long)]
        candidate: PathBuf,

        /// Contract type the candidate was drafted for
        #[arg(long)]
        contract_type: String,

        /// Preset whose constraints apply
        #[arg(long, conflicts_with = "jurisdiction")]
        preset: Option<String>,

        /// Required jurisdiction when no preset is named
        #[arg(long, required_unless_present = "preset")]
        jurisdiction: Option<String>,

        /// Corpus directory for strict citation checks
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Extra preset file merged over the built-ins
        #[arg(long)]
        presets: Option<PathBuf>,

        /// Print the validation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up a citation in the corpus
    Citation {
        /// Source id, e.g. DPA-7.1
        id: String,

        /// Corpus directory
        #[arg(long)]
        corpus: PathBuf,
    },

    /// Run a drafting session
    Generate {
        /// Drafting instruction
        #[arg(short, long)]
        prompt: String,

        #[arg(long)]
        preset: Option<String>,

        #[arg(long, default_value = "")]
        contract_type: String,

        #[arg(long, default_value = "")]
        jurisdiction: String,

        /// Corpus directory
        #[arg(long)]
        corpus: PathBuf,

        /// Replay candidates from a JSON array instead of calling a model
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Runtime configuration file (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Extra preset file merged over the built-ins
        #[arg(long)]
        presets: Option<PathBuf>,

        /// Print one frame per event as the session runs
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets { presets, json } => list_presets(presets.as_deref(), json),
        Commands::Validate {
            candidate,
            contract_type,
            preset,
            jurisdiction,
            corpus,
            presets,
            json,
        } => {
            let registry = load_presets(presets.as_deref())?;
            let constraints = match (&preset, &jurisdiction) {
                (Some(name), _) => registry.lookup_constraints(name)?.clone(),
                (None, Some(jurisdiction)) => PresetRegistry::fallback(&contract_type, jurisdiction)?,
                (None, None) => bail!("either --preset or --jurisdiction is required"),
            };
            let corpus = corpus.as_deref().map(load_corpus).transpose()?;
            validate_file(&candidate, &contract_type, &constraints, corpus.as_ref(), json)
        }
        Commands::Citation { id, corpus } => {
            let corpus = load_corpus(&corpus)?;
            let entry = corpus.lookup(&id)?;
            println!("[{}] {} § {}", entry.source_id, entry.document_name, entry.section_heading);
            println!("{}", entry.text);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Generate {
            prompt,
            preset,
            contract_type,
            jurisdiction,
            corpus,
            replay,
            config,
            presets,
            stream,
        } => {
            let config = RuntimeConfig::load(config.as_deref()).context("Failed to load runtime config")?;
            let registry = Arc::new(load_presets(presets.as_deref())?);
            let corpus = Arc::new(load_corpus(&corpus)?);
            let (drafter, llm) = build_drafter(replay.as_deref(), &config)?;

            let orchestrator = Orchestrator::builder()
                .retriever(build_retriever(&corpus, &config))
                .drafter(drafter)
                .presets(registry)
                .resolver(corpus.clone())
                .config(config)
                .build()?;

            let mut request = GenerationRequest::new(prompt, contract_type, jurisdiction);
            if let Some(preset) = preset {
                request = request.with_preset(preset);
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling session");
                    on_interrupt.cancel();
                }
            });

            let code = if stream {
                stream_session(&orchestrator, request, &cancel).await?
            } else {
                match orchestrator.run_until_cancelled(request, cancel).await? {
                    Some(result) => report(&result)?,
                    None => ExitCode::from(EXIT_CANCELLED),
                }
            };

            if let Some(llm) = llm {
                let usage = llm.usage();
                info!(
                    llm_calls = usage.llm_calls,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    cache_hits = usage.cache_hits,
                    estimated_cost_usd = usage.estimated_cost,
                    "model usage"
                );
            }
            Ok(code)
        }
    }
}

#[derive(Serialize)]
struct PresetSummary<'a> {
    name: &'a str,
    contract_type: &'a str,
    jurisdiction: &'a str,
    description: &'a str,
    rules: usize,
}

fn list_presets(extra: Option<&Path>, json: bool) -> Result<ExitCode> {
    let registry = load_presets(extra)?;
    let summaries: Vec<PresetSummary<'_>> = registry
        .iter()
        .map(|p| PresetSummary {
            name: &p.name,
            contract_type: &p.contract_type,
            jurisdiction: &p.jurisdiction,
            description: &p.description,
            rules: p.constraints.rules().len(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for s in &summaries {
            println!(
                "{:<10} {:<28} {:<16} {} rule(s)  {}",
                s.name, s.contract_type, s.jurisdiction, s.rules, s.description
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_file(
    path: &Path,
    contract_type: &str,
    constraints: &ConstraintSet,
    corpus: Option<&CitationCorpus>,
    json: bool,
) -> Result<ExitCode> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read candidate {}", path.display()))?;
    let candidate = parse_candidate(&raw).with_context(|| format!("Invalid candidate {}", path.display()))?;

    let mut validator = Validator::new();
    if let Some(corpus) = corpus {
        validator = validator.with_resolver(corpus);
    }
    let result = validator.validate(&candidate, constraints, contract_type);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_validation(&result);
    }

    Ok(if result.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_validation(result: &ValidationResult) {
    if result.is_valid {
        println!("Candidate is valid ({} advisory violation(s))", result.violations.len());
    } else {
        println!("Candidate has violations:");
    }
    for v in &result.violations {
        println!("  [{}] {}: {}", v.severity.label(), v.field, v.message);
        if !v.suggestion.is_empty() {
            println!("       fix: {}", v.suggestion);
        }
    }
}

fn load_presets(extra: Option<&Path>) -> Result<PresetRegistry> {
    let builtin = PresetRegistry::builtin().context("Built-in presets failed to load")?;
    match extra {
        Some(path) => {
            let custom = PresetRegistry::from_yaml_file(path)
                .with_context(|| format!("Failed to load presets from {}", path.display()))?;
            Ok(builtin.merge(custom))
        }
        None => Ok(builtin),
    }
}

fn load_corpus(dir: &Path) -> Result<CitationCorpus> {
    let corpus = CitationCorpus::load_dir(dir)
        .with_context(|| format!("Failed to load corpus from {}", dir.display()))?;
    info!(citations = corpus.len(), documents = corpus.documents().len(), "corpus loaded");
    Ok(corpus)
}

fn build_retriever(corpus: &Arc<CitationCorpus>, config: &RuntimeConfig) -> Arc<dyn Retriever> {
    let retriever = CorpusRetriever::new(corpus.clone(), &config.retrieval);
    if config.cache.enabled {
        Arc::new(CachedRetriever::from_config(retriever, &config.cache))
    } else {
        Arc::new(retriever)
    }
}

/// The session drafter, plus a typed handle when it calls a model.
fn build_drafter(
    replay: Option<&Path>,
    config: &RuntimeConfig,
) -> Result<(Arc<dyn Drafter>, Option<Arc<LlmDrafter>>)> {
    if let Some(path) = replay {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let drafter = ScriptedDrafter::from_json(&raw)
            .with_context(|| format!("Invalid replay file {}", path.display()))?;
        info!(path = %path.display(), "replaying scripted candidates");
        let drafter: Arc<dyn Drafter> = Arc::new(drafter);
        return Ok((drafter, None));
    }

    let provider = build_provider(&config.provider)?;
    let llm = Arc::new(LlmDrafter::new(provider, CompletionConfig::from(&config.provider)));
    let drafter: Arc<dyn Drafter> = llm.clone();
    Ok((drafter, Some(llm)))
}

async fn stream_session(
    orchestrator: &Orchestrator,
    request: GenerationRequest,
    cancel: &CancellationToken,
) -> Result<ExitCode> {
    let mut stream = orchestrator.stream_with_cancel(request, cancel)?;
    let mut terminal = None;

    while let Some(event) = stream.next_event().await {
        print!("{}", encode_frame(&event)?);
        if event.state.is_terminal() {
            terminal = Some(event);
        }
    }

    match terminal {
        Some(event) if event.completion().map(|c| c.validation.is_valid).unwrap_or(false) => {
            Ok(ExitCode::SUCCESS)
        }
        Some(_) => Ok(ExitCode::FAILURE),
        None => Ok(ExitCode::from(EXIT_CANCELLED)),
    }
}

fn report(result: &GenerationResult) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    if let Some(error) = &result.error {
        warn!(attempts = result.total_attempts, "{}", error);
    }
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

//! Scripted drafter for tests and offline replay.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;

use covenant_core::{parse_candidate, CandidateOutput, SchemaError};

use super::{DraftError, DraftRequest, Drafter};

/// Plays back a fixed script of results, one per call.
///
/// Once the script runs out the last entry repeats. Every request is
/// recorded before the optional delay, so a cancelled call still shows up.
pub struct ScriptedDrafter {
    script: Vec<Result<CandidateOutput, DraftError>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<DraftRequest>>,
}

impl ScriptedDrafter {
    pub fn new(script: Vec<Result<CandidateOutput, DraftError>>) -> Self {
        Self {
            script,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Return the same candidate on every call.
    pub fn always(candidate: CandidateOutput) -> Self {
        Self::new(vec![Ok(candidate)])
    }

    /// Parse a JSON array of candidates, each checked against the schema.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(json)?;
        let script = entries
            .iter()
            .map(|entry| parse_candidate(&entry.to_string()).map(Ok))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(script))
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<DraftRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Drafter for ScriptedDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<CandidateOutput, DraftError> {
        let index = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len() - 1
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.script.get(index).or_else(|| self.script.last()) {
            Some(result) => result.clone(),
            None => Err(DraftError::Provider("empty script".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

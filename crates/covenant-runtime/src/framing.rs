//! Text framing for events over any line-oriented transport.
//!
//! One frame per event: `data: <json>` followed by a blank line. The
//! decoder accepts arbitrary chunk boundaries and skips anything it cannot
//! parse, so a bad frame never takes the reader down.

use tracing::debug;

use crate::events::AgentEvent;

/// Marker prefix of every frame.
pub const FRAME_PREFIX: &str = "data: ";

/// Encode one event as a frame.
pub fn encode_frame(event: &AgentEvent) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(event)?;
    Ok(format!("{}{}\n\n", FRAME_PREFIX, json))
}

/// Decode a single line; `None` for anything that is not a well-formed frame.
pub fn decode_frame(line: &str) -> Option<AgentEvent> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    let Some(payload) = line.strip_prefix(FRAME_PREFIX) else {
        debug!(line, "skipping line without frame prefix");
        return None;
    };
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "skipping malformed frame");
            None
        }
    }
}

/// Longest partial line the decoder buffers while waiting for a newline.
pub const MAX_PENDING_BYTES: usize = 1 << 20;

/// Incremental frame decoder.
///
/// A partial line longer than the pending limit is dropped along with the
/// rest of that line.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: String,
    max_pending: usize,
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_pending(MAX_PENDING_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buffer: String::new(),
            max_pending,
            discarding: false,
        }
    }

    /// Feed a chunk; returns every event completed by it.
    pub fn push(&mut self, chunk: &str) -> Vec<AgentEvent> {
        let chunk = if self.discarding {
            match chunk.find('\n') {
                Some(end) => {
                    self.discarding = false;
                    &chunk[end + 1..]
                }
                None => return Vec::new(),
            }
        } else {
            chunk
        };
        self.buffer.push_str(chunk);

        let events = match self.buffer.rfind('\n') {
            Some(last_newline) => {
                let rest = self.buffer.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.buffer, rest);
                complete.lines().filter_map(decode_frame).collect()
            }
            None => Vec::new(),
        };

        if self.buffer.len() > self.max_pending {
            debug!(bytes = self.buffer.len(), "dropping oversized partial frame");
            self.buffer.clear();
            self.discarding = true;
        }
        events
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(self) -> Vec<AgentEvent> {
        decode_frame(&self.buffer).into_iter().collect()
    }

    /// Bytes waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AgentState, CompletePayload, ViolationPayload};
    use chrono::Utc;
    use covenant_core::{CandidateOutput, Clause, Severity, ValidationResult, Violation};
    use proptest::prelude::*;

    fn violation_event() -> AgentEvent {
        AgentEvent::new(AgentState::ViolationFound, "Found 1 violation(s)", Utc::now()).with_payload(
            &ViolationPayload {
                violations: vec![Violation::new(
                    "governing_jurisdiction",
                    "Expected 'European Union' but got 'United States'.",
                    Severity::High,
                    "Set governing_jurisdiction to 'European Union'.",
                )],
            },
        )
    }

    #[test]
    fn test_frame_roundtrip_preserves_event() {
        let event = violation_event();
        let frame = encode_frame(&event).unwrap();
        assert!(frame.starts_with(FRAME_PREFIX));
        assert!(frame.ends_with("\n\n"));

        let mut decoder = FrameDecoder::new();
        let decoded = decoder.push(&frame);
        assert_eq!(decoded, vec![event]);
    }

    #[test]
    fn test_split_chunks_reassembled() {
        let event = violation_event();
        let frame = encode_frame(&event).unwrap();
        let (a, b) = frame.split_at(frame.len() / 2);

        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(a).is_empty());
        assert!(decoder.pending() > 0);
        assert_eq!(decoder.push(b), vec![event]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_malformed_frames_skipped() {
        let good = encode_frame(&violation_event()).unwrap();
        let input = format!(
            ": keep-alive\n\ndata: {{not json\n\nevent: ping\n\n{}data: {{\"state\":\"bogus\"}}\n\n",
            good
        );
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(&input);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, AgentState::ViolationFound);
    }

    #[test]
    fn test_crlf_and_trailing_line() {
        let event = AgentEvent::new(AgentState::Initializing, "Starting", Utc::now());
        let json = serde_json::to_string(&event).unwrap();

        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(&format!("data: {}\r\n\r\n", json)), vec![event.clone()]);
        assert!(decoder.push(&format!("data: {}", json)).is_empty());
        assert_eq!(decoder.finish(), vec![event]);
    }

    #[test]
    fn test_oversized_partial_frame_dropped() {
        let good = encode_frame(&violation_event()).unwrap();
        let mut decoder = FrameDecoder::with_max_pending(64);

        assert!(decoder.push(&format!("data: {{\"state\":\"{}", "x".repeat(100))).is_empty());
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.push(&"y".repeat(100)).is_empty());
        assert_eq!(decoder.pending(), 0);

        // The tail of the dropped line is skipped; the next frame decodes.
        let events = decoder.push(&format!("zzz\"}}\n\n{}", good));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, AgentState::ViolationFound);
    }

    fn complete_event(confidence_score: f64) -> AgentEvent {
        AgentEvent::new(AgentState::Complete, "Generation complete after 1 attempt(s)", Utc::now())
            .with_payload(&CompletePayload {
                output: CandidateOutput {
                    clauses: vec![Clause::new("Limitation of Liability", "Capped at fees paid.")
                        .cite("DPA-7.1", "cap")],
                    summary: "One clause".to_string(),
                    governing_jurisdiction: "European Union".to_string(),
                    confidence_score,
                },
                validation: ValidationResult {
                    is_valid: true,
                    violations: vec![],
                    attempt_number: 1,
                },
                total_attempts: 1,
            })
    }

    proptest! {
        #[test]
        fn prop_complete_event_survives_framing(confidence_score in 0.0f64..=1.0) {
            let event = complete_event(confidence_score);
            let frame = encode_frame(&event).unwrap();

            let decoded = FrameDecoder::new().push(&frame);
            prop_assert_eq!(decoded.len(), 1);
            let completion = decoded[0].completion().unwrap();
            prop_assert_eq!(completion.output.confidence_score.to_bits(), confidence_score.to_bits());
            prop_assert_eq!(&decoded[0], &event);
        }
    }
}

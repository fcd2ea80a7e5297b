//! Consumer side of the gateway event stream
//!
//! Rebuilds the assistant reply from `data:` events delivered in arbitrary chunks.

use crate::client::{ClientError, ClientResult};
use gateway_core::llm::Message;
use gateway_llm::stream::{sse_data, LineBuffer};
use serde_json::Value;
use tracing::debug;

const DONE_SENTINEL: &str = "[DONE]";

/// What a fed chunk produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A delta arrived; carries the whole reply so far
    Delta { accumulated: String },
    /// The gateway sent its end-of-stream sentinel
    Done,
    /// The gateway reported a failure after streaming began
    Error { message: String },
}

/// Incremental decoder for one gateway stream
#[derive(Debug, Default)]
pub struct StreamRelay {
    lines: LineBuffer,
    accumulated: String,
    done: bool,
    error: Option<String>,
    finalized: bool,
}

impl StreamRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text accumulated so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// True once the sentinel or an error event has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk. Input after the sentinel is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RelayEvent> {
        if self.done || self.finalized {
            return Vec::new();
        }

        let mut events = Vec::new();
        for line in self.lines.push(chunk) {
            if let Some(event) = self.process_line(&line) {
                let terminal = !matches!(event, RelayEvent::Delta { .. });
                events.push(event);
                if terminal {
                    break;
                }
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<RelayEvent> {
        let data = sse_data(line)?;
        if data.trim() == DONE_SENTINEL {
            self.done = true;
            return Some(RelayEvent::Done);
        }

        let payload: Value = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable stream event");
                return None;
            }
        };

        if let Some(message) = payload.get("error") {
            let message = message
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| message.to_string());
            self.done = true;
            self.error = Some(message.clone());
            return Some(RelayEvent::Error { message });
        }

        let delta = payload.get("delta").and_then(Value::as_str).unwrap_or_default();
        self.accumulated.push_str(delta);
        Some(RelayEvent::Delta {
            accumulated: self.accumulated.clone(),
        })
    }

    /// Finalize the reply into an assistant message and reset the accumulator.
    ///
    /// Returns `Ok(Some(_))` exactly once per completed stream, whether or not the sentinel
    /// arrived. A stream that reported an error, including on an unterminated last line,
    /// is never finalized and yields `ClientError::Stream` instead.
    pub fn finish(&mut self) -> ClientResult<Option<Message>> {
        if self.finalized {
            return Ok(None);
        }
        if !self.done {
            // A last line without a trailing newline still counts.
            if let Some(line) = self.lines.finish() {
                self.process_line(&line);
            }
        }
        self.finalized = true;
        self.done = true;

        let text = std::mem::take(&mut self.accumulated);
        match self.error.take() {
            Some(message) => Err(ClientError::Stream(message)),
            None => Ok(Some(Message::assistant(text))),
        }
    }
}

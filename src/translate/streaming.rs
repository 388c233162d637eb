//! Translate provider generation events into `OpenAI` chat completion chunks.
//!
//! [`EventTranslator`] maps one provider event to at most one chunk, keeping the
//! running output index. [`StreamRelay`] wraps it with the stream lifecycle:
//! an opener chunk, in-order event chunks, and exactly one `[DONE]` terminator.
//! Both are pure; the caller writes the returned frames.
//!
//! Usage:
//!   let mut relay = StreamRelay::new("doubao-seedream-4-0-250828");
//!   let mut frames = relay.open();
//!   for event in provider_events {
//!       frames.extend(relay.step(RelayInput::Event(event))?);
//!   }
//!   frames.extend(relay.step(RelayInput::EndOfStream)?);

use serde::Serialize;

use super::openai_types::{ChatCompletionChunk, ChatContent, ChunkDelta, ContentPart};
use super::provider_types::{image_reference, ProviderErrorBody, ProviderStreamEvent};
use super::response::{completion_id, failure_text};
use crate::error::{GatewayError, Result};

/// Payload of the SSE terminator frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Maps provider events to chunks, tracking the next output index.
#[derive(Debug)]
pub struct EventTranslator {
    id: String,
    model: String,
    created: i64,
    image_index: u32,
}

impl EventTranslator {
    pub fn new(model: &str) -> Self {
        Self::with_identity(&completion_id(), model, chrono::Utc::now().timestamp())
    }

    pub fn with_identity(id: &str, model: &str, created: i64) -> Self {
        Self {
            id: id.to_string(),
            model: model.to_string(),
            created,
            image_index: 0,
        }
    }

    /// Number of output slots consumed so far, failed slots included.
    #[must_use]
    pub fn emitted(&self) -> u32 {
        self.image_index
    }

    /// Index of the last consumed slot, or 0 when none were consumed.
    #[must_use]
    pub fn last_index(&self) -> u32 {
        self.image_index.saturating_sub(1)
    }

    /// Translate one event. Request-level `error` events yield `None`; the relay handles them.
    pub fn translate(&mut self, event: &ProviderStreamEvent) -> Option<ChatCompletionChunk> {
        match event {
            ProviderStreamEvent::PartialSucceeded {
                image_index,
                url,
                b64_json,
                ..
            } => {
                let Some(reference) = image_reference(url.as_deref(), b64_json.as_deref()) else {
                    tracing::warn!(
                        provider_index = image_index,
                        "partial_succeeded event without url or b64_json, dropping"
                    );
                    return None;
                };
                let delta = ChunkDelta {
                    role: None,
                    content: Some(ChatContent::Parts(vec![ContentPart::image(reference)])),
                };
                Some(self.next_slot(delta))
            }
            ProviderStreamEvent::PartialFailed { error, .. } => {
                let text = failure_text(
                    self.image_index as usize,
                    error.message_or_unknown(),
                    None,
                );
                let delta = ChunkDelta {
                    role: None,
                    content: Some(ChatContent::Text(text)),
                };
                Some(self.next_slot(delta))
            }
            ProviderStreamEvent::Completed { .. } => Some(self.stop_chunk()),
            ProviderStreamEvent::Error { .. } => None,
        }
    }

    /// `{role: "assistant"}` chunk at index 0.
    #[must_use]
    pub fn role_chunk(&self) -> ChatCompletionChunk {
        let delta = ChunkDelta {
            role: Some("assistant".to_string()),
            content: None,
        };
        self.chunk(0, delta, None)
    }

    /// Empty-delta chunk finishing the last used slot.
    #[must_use]
    pub fn stop_chunk(&self) -> ChatCompletionChunk {
        self.chunk(self.last_index(), ChunkDelta::default(), Some("stop"))
    }

    fn next_slot(&mut self, delta: ChunkDelta) -> ChatCompletionChunk {
        let chunk = self.chunk(self.image_index, delta, None);
        self.image_index += 1;
        chunk
    }

    fn chunk(&self, index: u32, delta: ChunkDelta, finish: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk::single(&self.id, &self.model, self.created, index, delta, finish)
    }
}

/// Lifecycle of one client stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitingHeaders,
    Streaming,
    Terminated,
}

/// One input to the relay: a provider event, or the end of the provider sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayInput {
    Event(ProviderStreamEvent),
    EndOfStream,
}

/// One SSE frame for the client. Every frame is sent as `data: <payload>\n\n`.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    Chunk(ChatCompletionChunk),
    Error(InlineError),
    Done,
}

impl SseFrame {
    /// The `data:` payload of this frame.
    #[must_use]
    pub fn data(&self) -> String {
        match self {
            Self::Chunk(chunk) => serde_json::to_string(chunk).unwrap_or_default(),
            Self::Error(err) => serde_json::to_string(err).unwrap_or_default(),
            Self::Done => DONE_SENTINEL.to_string(),
        }
    }

    /// Full wire encoding, including framing.
    #[must_use]
    pub fn to_sse(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Error written into an already-open stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineError {
    pub error: InlineErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
}

impl InlineError {
    #[must_use]
    pub fn from_provider(body: &ProviderErrorBody) -> Self {
        Self {
            error: InlineErrorBody {
                message: body.message_or_unknown().to_string(),
                error_type: "api_error".to_string(),
                code: body.code_or_unknown().to_string(),
            },
        }
    }
}

/// Relay state machine owned by exactly one client stream.
#[derive(Debug)]
pub struct StreamRelay {
    state: RelayState,
    completed_received: bool,
    translator: EventTranslator,
}

impl StreamRelay {
    pub fn new(model: &str) -> Self {
        Self::from_translator(EventTranslator::new(model))
    }

    pub fn from_translator(translator: EventTranslator) -> Self {
        Self {
            state: RelayState::AwaitingHeaders,
            completed_received: false,
            translator,
        }
    }

    #[must_use]
    pub fn state(&self) -> RelayState {
        self.state
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state == RelayState::Terminated
    }

    /// Open the client stream, returning the role announcement. Idempotent.
    pub fn open(&mut self) -> Vec<SseFrame> {
        if self.state != RelayState::AwaitingHeaders {
            return Vec::new();
        }
        self.state = RelayState::Streaming;
        vec![SseFrame::Chunk(self.translator.role_chunk())]
    }

    /// Feed one input and return the frames to write, in order.
    ///
    /// # Errors
    /// A request-level `error` event before the stream was opened is returned as
    /// `GatewayError::UpstreamApi`, so it can take the ordinary error-response path.
    pub fn step(&mut self, input: RelayInput) -> Result<Vec<SseFrame>> {
        if self.state == RelayState::Terminated {
            return Ok(Vec::new());
        }

        if let RelayInput::Event(ProviderStreamEvent::Error { error }) = &input {
            if self.state == RelayState::AwaitingHeaders {
                self.state = RelayState::Terminated;
                return Err(GatewayError::upstream_api(
                    502,
                    error.code_or_unknown(),
                    error.message_or_unknown(),
                ));
            }
        }

        let mut frames = self.open();

        match input {
            RelayInput::Event(ProviderStreamEvent::Error { error }) => {
                tracing::warn!(code = error.code_or_unknown(), "provider stream failed");
                frames.push(SseFrame::Error(InlineError::from_provider(&error)));
                frames.push(SseFrame::Done);
                self.state = RelayState::Terminated;
            }
            RelayInput::Event(event) => {
                if matches!(event, ProviderStreamEvent::Completed { .. }) {
                    self.completed_received = true;
                }
                if let Some(chunk) = self.translator.translate(&event) {
                    frames.push(SseFrame::Chunk(chunk));
                }
            }
            RelayInput::EndOfStream => {
                if !self.completed_received && self.translator.emitted() > 0 {
                    frames.push(SseFrame::Chunk(self.translator.stop_chunk()));
                }
                frames.push(SseFrame::Done);
                self.state = RelayState::Terminated;
            }
        }

        Ok(frames)
    }
}

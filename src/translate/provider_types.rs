//! Type definitions for the Volcano Engine (Ark) image generation API.
//!
//! Covers the request we send to `/images/generations`, the completed response,
//! and the events of its SSE stream. Stream events arrive tagged
//! `image_generation.partial_succeeded` etc.; they are re-tagged to short names.

use serde::{Deserialize, Serialize};

use super::openai_types::ResponseFormat;

// ---------------------------------------------------------------------------
// Request types (what we send TO the provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub watermark: bool,
    pub response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation_options: Option<SequentialOptions>,
}

/// Reference images: a bare string for one image, an array for several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageInput {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequentialOptions {
    pub max_images: u32,
}

// ---------------------------------------------------------------------------
// Response types (what we receive FROM the provider)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub data: Vec<ProviderImageResult>,
    #[serde(default)]
    pub usage: Option<ProviderUsage>,
}

/// One entry of the result list. Failure is tried first since every success
/// field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderImageResult {
    Failure {
        error: ProviderErrorBody,
    },
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        b64_json: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<String>,
    },
}

impl ProviderImageResult {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    #[serde(default)]
    pub generated_images: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn code_or_unknown(&self) -> &str {
        self.code.as_deref().unwrap_or("unknown")
    }

    #[must_use]
    pub fn message_or_unknown(&self) -> &str {
        self.message.as_deref().unwrap_or("Unknown error")
    }
}

/// `{"error": {...}}` as returned on HTTP errors and request-level stream failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderErrorEnvelope {
    pub error: ProviderErrorBody,
}

// ---------------------------------------------------------------------------
// Streaming event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderStreamEvent {
    #[serde(alias = "image_generation.partial_succeeded")]
    PartialSucceeded {
        #[serde(default)]
        image_index: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        b64_json: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<String>,
    },
    #[serde(alias = "image_generation.partial_failed")]
    PartialFailed {
        #[serde(default)]
        image_index: u32,
        #[serde(default)]
        error: ProviderErrorBody,
    },
    #[serde(alias = "image_generation.completed")]
    Completed {
        #[serde(default)]
        usage: Option<ProviderUsage>,
    },
    /// Request-level failure; ends the stream.
    #[serde(alias = "image_generation.error")]
    Error {
        #[serde(default)]
        error: ProviderErrorBody,
    },
}

impl ProviderStreamEvent {
    /// Parse one SSE `data:` payload. Untyped `{"error": ...}` objects are
    /// treated as request-level errors.
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        match serde_json::from_str::<Self>(data) {
            Ok(event) => Ok(event),
            Err(tag_err) => serde_json::from_str::<ProviderErrorEnvelope>(data)
                .map(|env| Self::Error { error: env.error })
                .map_err(|_| tag_err),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PartialSucceeded { .. } => "partial_succeeded",
            Self::PartialFailed { .. } => "partial_failed",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }
}

/// URL of an image result, or a `data:` URI built from its base64 payload.
#[must_use]
pub fn image_reference(url: Option<&str>, b64_json: Option<&str>) -> Option<String> {
    url.filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(|| {
            b64_json
                .filter(|b| !b.is_empty())
                .map(|b| format!("data:image/png;base64,{b}"))
        })
}

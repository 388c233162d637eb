//! Type definitions for the [OpenAI Chat Completions API](https://platform.openai.com/docs/api-reference/chat).
//!
//! Inbound: the chat request clients send to the gateway. Outbound: completed
//! responses, streaming chunks and the error envelope.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Request types (what clients send TO us)
// ---------------------------------------------------------------------------

/// `model` and `messages` are optional at the serde level so that their absence
/// surfaces as a `MissingParameter` error rather than a body parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_watermark: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequential_image_generation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Url,
    B64Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text {
        #[serde(
            default,
            deserialize_with = "lenient",
            skip_serializing_if = "Option::is_none"
        )]
        text: Option<String>,
    },
    /// `image_url` is `None` when absent or not an object.
    #[serde(rename = "image_url")]
    ImageUrl {
        #[serde(
            default,
            deserialize_with = "lenient",
            skip_serializing_if = "Option::is_none"
        )]
        image_url: Option<ImageUrlDetail>,
    },
    /// Any part type the gateway does not consume (audio, files, ...).
    #[serde(other)]
    Unsupported,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: Some(text.into()),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: Some(ImageUrlDetail {
                url: Some(url.into()),
                detail: Some("auto".to_string()),
            }),
        }
    }
}

/// Malformed values become `None` so one bad part does not reject the request.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrlDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types (what we send back to the client)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: ChatUsage,
    /// Encodes the expiry timestamp of the returned image URLs.
    pub system_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub volcengine: GenerationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Per-request image counts reported alongside the usage block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generated_images: u64,
    pub success_count: u64,
    pub fail_count: u64,
}

// ---------------------------------------------------------------------------
// Streaming chunk types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Build a single-choice chunk, the only shape the gateway emits.
    pub fn single(
        id: &str,
        model: &str,
        created: i64,
        index: u32,
        delta: ChunkDelta,
        finish_reason: Option<&str>,
    ) -> Self {
        Self {
            id: id.to_string(),
            object: "chat.completion.chunk".to_string(),
            created,
            model: model.to_string(),
            choices: vec![ChunkChoice {
                index,
                delta,
                finish_reason: finish_reason.map(String::from),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ChatContent>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatErrorResponse {
    pub error: ChatError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    #[serde(default)]
    pub param: Option<String>,
}

impl ChatErrorResponse {
    pub fn new(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ChatError {
                message: message.into(),
                error_type: error_type.into(),
                code: code.into(),
                param: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_content_parts() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "make it blue"},
                {"type": "image_url", "image_url": {"url": "http://x/a.png"}},
                {"type": "input_audio", "input_audio": {"data": "..."}},
                {"type": "image_url"}
            ]
        }))
        .unwrap();

        let Some(ChatContent::Parts(parts)) = msg.content else {
            panic!("Expected content parts");
        };
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2], ContentPart::Unsupported);
        assert_eq!(parts[3], ContentPart::ImageUrl { image_url: None });
    }

    #[test]
    fn test_malformed_parts_parse_as_empty() {
        let msg: ChatMessage = serde_json::from_value(serde_json::json!({
            "role": "user",
            "content": [
                {"type": "text"},
                {"type": "text", "text": 42},
                {"type": "image_url", "image_url": "http://x/y.png"},
                {"type": "image_url", "image_url": {"url": null}}
            ]
        }))
        .unwrap();

        let Some(ChatContent::Parts(parts)) = msg.content else {
            panic!("Expected content parts");
        };
        assert_eq!(parts[0], ContentPart::Text { text: None });
        assert_eq!(parts[1], ContentPart::Text { text: None });
        assert_eq!(parts[2], ContentPart::ImageUrl { image_url: None });
        let ContentPart::ImageUrl {
            image_url: Some(detail),
        } = &parts[3]
        else {
            panic!("Expected image part");
        };
        assert!(detail.url.is_none());
    }

    #[test]
    fn test_request_without_model_still_parses() {
        let req: ChatRequest = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        assert!(req.model.is_none());
        assert!(!req.stream);
    }

    #[test]
    fn test_response_format_wire_names() {
        let fmt: ResponseFormat = serde_json::from_str(r#""b64_json""#).unwrap();
        assert_eq!(fmt, ResponseFormat::B64Json);
        assert_eq!(serde_json::to_string(&ResponseFormat::Url).unwrap(), r#""url""#);
    }

    #[test]
    fn test_chunk_finish_reason_serializes_as_null() {
        let chunk = ChatCompletionChunk::single("id", "m", 0, 0, ChunkDelta::default(), None);
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json["choices"][0]["finish_reason"].is_null());
        assert_eq!(json["choices"][0]["delta"], serde_json::json!({}));
    }
}

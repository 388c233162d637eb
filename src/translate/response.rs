//! Translate completed provider responses into `OpenAI` chat completion responses.

use super::openai_types::{
    ChatCompletionResponse, ChatUsage, Choice, ChoiceMessage, GenerationSummary,
};
use super::provider_types::{image_reference, ProviderImageResult, ProviderResponse};

/// How long provider image URLs stay valid, in seconds.
pub const URL_TTL_SECS: i64 = 24 * 60 * 60;

pub const URL_EXPIRY_NOTICE: &str =
    "Image URLs expire within 24 hours. Save the images promptly.";

/// Translate a provider response into a chat completion, stamped with the current time.
#[must_use]
pub fn provider_to_chat(resp: &ProviderResponse, model: &str) -> ChatCompletionResponse {
    provider_to_chat_at(resp, model, chrono::Utc::now().timestamp())
}

/// Same as [`provider_to_chat`] with an explicit `created` timestamp.
#[must_use]
pub fn provider_to_chat_at(
    resp: &ProviderResponse,
    model: &str,
    created: i64,
) -> ChatCompletionResponse {
    let choices: Vec<Choice> = resp
        .data
        .iter()
        .enumerate()
        .map(|(index, result)| result_to_choice(index, result))
        .collect();

    let fail_count = resp.data.iter().filter(|r| r.is_failure()).count() as u64;
    let success_count = resp.data.len() as u64 - fail_count;

    let usage = resp.usage.as_ref();

    ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created,
        model: model.to_string(),
        choices,
        usage: ChatUsage {
            prompt_tokens: 0,
            completion_tokens: usage.and_then(|u| u.output_tokens).unwrap_or(0),
            total_tokens: usage.and_then(|u| u.total_tokens).unwrap_or(0),
        },
        system_fingerprint: format!("url_expires_{}", created + URL_TTL_SECS),
        system_message: Some(URL_EXPIRY_NOTICE.to_string()),
        volcengine: GenerationSummary {
            generated_images: usage
                .and_then(|u| u.generated_images)
                .unwrap_or(success_count),
            success_count,
            fail_count,
        },
    }
}

/// `chatcmpl-` prefixed id shared by responses and stream chunks.
#[must_use]
pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())
}

/// Human-readable failure text for image slot `index` (zero-based).
#[must_use]
pub fn failure_text(index: usize, message: &str, code: Option<&str>) -> String {
    match code {
        Some(code) => format!("Image {} failed: {message} (code: {code})", index + 1),
        None => format!("Image {} failed: {message}", index + 1),
    }
}

fn result_to_choice(index: usize, result: &ProviderImageResult) -> Choice {
    let (content, finish_reason) = match result {
        ProviderImageResult::Failure { error } => {
            tracing::warn!(
                index,
                code = error.code_or_unknown(),
                "image generation failed"
            );
            (
                failure_text(
                    index,
                    error.message_or_unknown(),
                    Some(error.code_or_unknown()),
                ),
                "error",
            )
        }
        ProviderImageResult::Success { url, b64_json, size } => {
            let content = match image_reference(url.as_deref(), b64_json.as_deref()) {
                Some(reference) => format!(
                    "![Generated Image {}]({reference})\n\nSize: {}",
                    index + 1,
                    size.as_deref().unwrap_or("N/A")
                ),
                None => {
                    tracing::warn!(index, "image result has neither url nor b64_json");
                    format!("Image {} returned no image data", index + 1)
                }
            };
            (content, "stop")
        }
    };

    Choice {
        index: u32::try_from(index).unwrap_or(u32::MAX),
        message: ChoiceMessage {
            role: "assistant".to_string(),
            content,
        },
        finish_reason: Some(finish_reason.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::provider_types::{ProviderErrorBody, ProviderUsage};

    fn success(url: &str) -> ProviderImageResult {
        ProviderImageResult::Success {
            url: Some(url.to_string()),
            b64_json: None,
            size: Some("2048x2048".to_string()),
        }
    }

    #[test]
    fn test_success_and_failure_choices() {
        let resp = ProviderResponse {
            data: vec![
                success("http://x/1.png"),
                ProviderImageResult::Failure {
                    error: ProviderErrorBody::new("OutputImageSensitiveContentDetected", "blocked"),
                },
            ],
            usage: Some(ProviderUsage {
                generated_images: Some(1),
                output_tokens: Some(16384),
                total_tokens: Some(16384),
            }),
            ..ProviderResponse::default()
        };

        let result = provider_to_chat_at(&resp, "doubao-seedream-4-0-250828", 1_700_000_000);

        assert_eq!(result.choices.len(), 2);
        assert_eq!(result.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(
            result.choices[0].message.content,
            "![Generated Image 1](http://x/1.png)\n\nSize: 2048x2048"
        );
        assert_eq!(result.choices[1].index, 1);
        assert_eq!(result.choices[1].finish_reason.as_deref(), Some("error"));
        assert!(result.choices[1].message.content.contains("blocked"));
        assert!(result.choices[1]
            .message
            .content
            .contains("OutputImageSensitiveContentDetected"));

        assert_eq!(result.volcengine.success_count, 1);
        assert_eq!(result.volcengine.fail_count, 1);
        assert_eq!(result.usage.prompt_tokens, 0);
        assert_eq!(result.usage.completion_tokens, 16384);
        assert_eq!(result.usage.total_tokens, 16384);
    }

    #[test]
    fn test_fingerprint_expires_a_day_later() {
        let resp = ProviderResponse {
            data: vec![success("http://x/1.png")],
            ..ProviderResponse::default()
        };
        let result = provider_to_chat_at(&resp, "m", 1_000);

        assert_eq!(result.created, 1_000);
        assert_eq!(result.system_fingerprint, "url_expires_87400");
        assert!(result.id.starts_with("chatcmpl-"));
        assert_eq!(result.object, "chat.completion");
    }

    #[test]
    fn test_base64_result_becomes_data_uri() {
        let resp = ProviderResponse {
            data: vec![ProviderImageResult::Success {
                url: None,
                b64_json: Some("iVBORw0".to_string()),
                size: None,
            }],
            ..ProviderResponse::default()
        };
        let result = provider_to_chat_at(&resp, "m", 0);

        assert_eq!(
            result.choices[0].message.content,
            "![Generated Image 1](data:image/png;base64,iVBORw0)\n\nSize: N/A"
        );
    }

    #[test]
    fn test_missing_usage_reports_zero_and_counts_successes() {
        let resp = ProviderResponse {
            data: vec![success("a"), success("b")],
            ..ProviderResponse::default()
        };
        let result = provider_to_chat_at(&resp, "m", 0);

        assert_eq!(result.usage, ChatUsage::default());
        assert_eq!(result.volcengine.generated_images, 2);
    }
}

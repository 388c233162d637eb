//! Translate `OpenAI` chat completion requests into provider image generation requests.
//!
//! Only the last message is consulted: generation is single-shot, earlier turns
//! are ignored. Its text becomes the prompt and its `image_url` parts become
//! reference images.

use std::collections::HashMap;
use std::hash::BuildHasher;

use super::normalize::{normalize_guidance, normalize_size};
use super::openai_types::{ChatContent, ChatMessage, ChatRequest, ContentPart};
use super::provider_types::{ImageInput, ProviderRequest, SequentialOptions};
use crate::error::{GatewayError, Result};

/// Provider limit on reference images per request.
pub const MAX_REFERENCE_IMAGES: usize = 10;

/// Provider limit on images per sequential generation.
pub const MAX_SEQUENTIAL_IMAGES: u32 = 15;

pub const FALLBACK_PROMPT_WITH_IMAGES: &str = "Transform this image with artistic style";
pub const FALLBACK_PROMPT: &str = "Generate a beautiful image";

const DEFAULT_SEQUENTIAL_MODE: &str = "auto";

/// Translate a chat request into a provider request.
/// Pure function: `model_map` resolves aliases to provider model ids, unmapped names pass through.
///
/// # Errors
/// Returns `GatewayError::MissingParameter` when `model` or `messages` is absent or empty.
pub fn chat_to_provider<S: BuildHasher>(
    req: &ChatRequest,
    model_map: &HashMap<String, String, S>,
) -> Result<ProviderRequest> {
    let model = req
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| GatewayError::missing_parameter("model"))?;

    let last = req
        .messages
        .as_deref()
        .and_then(<[ChatMessage]>::last)
        .ok_or_else(|| GatewayError::missing_parameter("messages"))?;

    let images = extract_images(last);
    let prompt = extract_prompt(last).unwrap_or_else(|| {
        if images.is_empty() {
            FALLBACK_PROMPT.to_string()
        } else {
            FALLBACK_PROMPT_WITH_IMAGES.to_string()
        }
    });

    let target_model = model_map
        .get(model)
        .cloned()
        .unwrap_or_else(|| model.to_string());

    let mut provider_req = ProviderRequest {
        model: target_model,
        prompt,
        stream: req.stream,
        watermark: req.add_watermark.unwrap_or(false),
        response_format: req.response_format.unwrap_or_default(),
        size: req.size.as_deref().map(|s| normalize_size(Some(s))),
        guidance_scale: req.temperature.map(|t| normalize_guidance(Some(t))),
        image: attach_images(images),
        sequential_image_generation: None,
        sequential_image_generation_options: None,
    };

    let n = req.n.unwrap_or(1);
    let explicit_mode = req
        .sequential_image_generation
        .as_deref()
        .filter(|mode| !mode.is_empty());

    if n > 1 || explicit_mode.is_some() {
        provider_req.sequential_image_generation =
            Some(explicit_mode.unwrap_or(DEFAULT_SEQUENTIAL_MODE).to_string());
        provider_req.sequential_image_generation_options = Some(SequentialOptions {
            max_images: n.min(MAX_SEQUENTIAL_IMAGES),
        });
    }

    Ok(provider_req)
}

/// Plain string content, or the first text part. `None` when neither exists.
fn extract_prompt(msg: &ChatMessage) -> Option<String> {
    match msg.content.as_ref()? {
        ChatContent::Text(text) => Some(text.clone()),
        ChatContent::Parts(parts) => parts.iter().find_map(|part| match part {
            ContentPart::Text { text: Some(text) } => Some(text.clone()),
            _ => None,
        }),
    }
}

/// URLs of the `image_url` parts in order; parts without a URL are dropped.
fn extract_images(msg: &ChatMessage) -> Vec<String> {
    let Some(ChatContent::Parts(parts)) = msg.content.as_ref() else {
        return Vec::new();
    };

    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::ImageUrl {
                image_url: Some(detail),
            } => detail.url.clone(),
            _ => None,
        })
        .collect()
}

fn attach_images(mut images: Vec<String>) -> Option<ImageInput> {
    match images.len() {
        0 => None,
        1 => images.pop().map(ImageInput::Single),
        _ => {
            images.truncate(MAX_REFERENCE_IMAGES);
            Some(ImageInput::Multiple(images))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::openai_types::{ImageUrlDetail, ResponseFormat};

    fn request(content: ChatContent) -> ChatRequest {
        ChatRequest {
            model: Some("doubao-seedream-4-0-250828".to_string()),
            messages: Some(vec![ChatMessage {
                role: "user".to_string(),
                content: Some(content),
            }]),
            ..ChatRequest::default()
        }
    }

    fn image_part(url: &str) -> ContentPart {
        ContentPart::ImageUrl {
            image_url: Some(ImageUrlDetail {
                url: Some(url.to_string()),
                detail: None,
            }),
        }
    }

    #[test]
    fn test_plain_text_prompt() {
        let req = request(ChatContent::Text("a cat".to_string()));
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.prompt, "a cat");
        assert_eq!(result.image, None);
        assert!(!result.watermark);
        assert_eq!(result.response_format, ResponseFormat::Url);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("image").is_none());
        assert!(json.get("size").is_none());
        assert!(json.get("guidance_scale").is_none());
        assert!(json.get("sequential_image_generation").is_none());
    }

    #[test]
    fn test_image_only_message_gets_fallback_prompt() {
        let req = request(ChatContent::Parts(vec![image_part("http://x/y.png")]));
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.prompt, FALLBACK_PROMPT_WITH_IMAGES);
        assert_eq!(result.image, Some(ImageInput::Single("http://x/y.png".to_string())));
    }

    #[test]
    fn test_empty_parts_get_plain_fallback_prompt() {
        let req = request(ChatContent::Parts(vec![ContentPart::Unsupported]));
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();
        assert_eq!(result.prompt, FALLBACK_PROMPT);
    }

    #[test]
    fn test_first_text_part_wins_and_images_keep_order() {
        let req = request(ChatContent::Parts(vec![
            image_part("http://x/1.png"),
            ContentPart::text("merge these"),
            ContentPart::ImageUrl { image_url: None },
            image_part("http://x/2.png"),
            ContentPart::text("ignored"),
        ]));
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.prompt, "merge these");
        assert_eq!(
            result.image,
            Some(ImageInput::Multiple(vec![
                "http://x/1.png".to_string(),
                "http://x/2.png".to_string()
            ]))
        );
    }

    #[test]
    fn test_reference_images_truncated_to_ten() {
        let parts = (0..12)
            .map(|i| image_part(&format!("http://x/{i}.png")))
            .collect();
        let result =
            chat_to_provider(&request(ChatContent::Parts(parts)), &HashMap::new()).unwrap();

        let Some(ImageInput::Multiple(images)) = result.image else {
            panic!("Expected image list");
        };
        assert_eq!(images.len(), MAX_REFERENCE_IMAGES);
        assert_eq!(images[9], "http://x/9.png");
    }

    #[test]
    fn test_only_last_message_is_used() {
        let mut req = request(ChatContent::Text("second".to_string()));
        if let Some(messages) = req.messages.as_mut() {
            messages.insert(
                0,
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(ChatContent::Parts(vec![image_part("http://x/old.png")])),
                },
            );
        }

        let result = chat_to_provider(&req, &HashMap::new()).unwrap();
        assert_eq!(result.prompt, "second");
        assert_eq!(result.image, None);
    }

    #[test]
    fn test_n_enables_sequential_generation() {
        let mut req = request(ChatContent::Text("comic strip".to_string()));
        req.n = Some(3);
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.sequential_image_generation.as_deref(), Some("auto"));
        assert_eq!(
            result.sequential_image_generation_options,
            Some(SequentialOptions { max_images: 3 })
        );
    }

    #[test]
    fn test_sequential_caps_and_explicit_mode() {
        let mut req = request(ChatContent::Text("x".to_string()));
        req.n = Some(40);
        req.sequential_image_generation = Some("disabled".to_string());
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.sequential_image_generation.as_deref(), Some("disabled"));
        assert_eq!(result.sequential_image_generation_options.unwrap().max_images, 15);

        let mut single = request(ChatContent::Text("x".to_string()));
        single.sequential_image_generation = Some("auto".to_string());
        let result = chat_to_provider(&single, &HashMap::new()).unwrap();
        assert_eq!(result.sequential_image_generation_options.unwrap().max_images, 1);
    }

    #[test]
    fn test_size_and_guidance_only_when_supplied() {
        let mut req = request(ChatContent::Text("x".to_string()));
        req.size = Some("16:9".to_string());
        req.temperature = Some(0.0);
        req.add_watermark = Some(true);
        req.response_format = Some(ResponseFormat::B64Json);
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.size.as_deref(), Some("2560x1440"));
        assert_eq!(result.guidance_scale, Some(1.0));
        assert!(result.watermark);
        assert_eq!(result.response_format, ResponseFormat::B64Json);
    }

    #[test]
    fn test_missing_model_and_messages() {
        let mut req = request(ChatContent::Text("x".to_string()));
        req.model = None;
        let err = chat_to_provider(&req, &HashMap::new()).unwrap_err();
        assert!(matches!(err, GatewayError::MissingParameter { ref field } if field == "model"));

        let mut req = request(ChatContent::Text("x".to_string()));
        req.messages = Some(Vec::new());
        let err = chat_to_provider(&req, &HashMap::new()).unwrap_err();
        assert!(matches!(err, GatewayError::MissingParameter { ref field } if field == "messages"));
    }

    #[test]
    fn test_model_alias_is_resolved() {
        let req = request(ChatContent::Text("x".to_string()));
        let mut map = HashMap::new();
        map.insert(
            "doubao-seedream-4-0-250828".to_string(),
            "ep-20250901-abc".to_string(),
        );
        assert_eq!(chat_to_provider(&req, &map).unwrap().model, "ep-20250901-abc");
    }

    #[test]
    fn test_malformed_parts_are_skipped() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "text"},
                {"type": "image_url", "image_url": "http://x/bare.png"},
                {"type": "text", "text": "a fox"},
                {"type": "image_url", "image_url": {"url": "http://x/ok.png"}}
            ]}]
        }))
        .unwrap();
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.prompt, "a fox");
        assert_eq!(result.image, Some(ImageInput::Single("http://x/ok.png".to_string())));

        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "messages": [{"role": "user", "content": [
                {"type": "text"},
                {"type": "image_url", "image_url": {"url": "http://x/y.png"}}
            ]}]
        }))
        .unwrap();
        let result = chat_to_provider(&req, &HashMap::new()).unwrap();

        assert_eq!(result.prompt, FALLBACK_PROMPT_WITH_IMAGES);
        assert_eq!(result.image, Some(ImageInput::Single("http://x/y.png".to_string())));
    }

    #[test]
    fn test_translation_is_deterministic() {
        let mut req = request(ChatContent::Parts(vec![
            ContentPart::text("two views"),
            image_part("http://x/a.png"),
        ]));
        req.n = Some(2);
        req.size = Some("3:4".to_string());
        req.temperature = Some(0.5);

        let first = chat_to_provider(&req, &HashMap::new()).unwrap();
        let second = chat_to_provider(&req, &HashMap::new()).unwrap();
        assert_eq!(first, second);
    }
}

//! Demonstrate using the translation layer without a server.
//!
//! Usage:
//!   `cargo run --example translate_only`

use seedream_gateway::models::model_aliases;
use seedream_gateway::translate::openai_types::{
    ChatContent, ChatMessage, ChatRequest, ContentPart,
};
use seedream_gateway::translate::provider_types::{
    ProviderErrorBody, ProviderImageResult, ProviderResponse, ProviderStreamEvent, ProviderUsage,
};
use seedream_gateway::translate::request::chat_to_provider;
use seedream_gateway::translate::response::provider_to_chat;
use seedream_gateway::translate::streaming::{RelayInput, StreamRelay};
use std::collections::HashMap;

fn main() -> anyhow::Result<()> {
    // Build an OpenAI chat request (what a chat client sends)
    let chat_req = ChatRequest {
        model: Some("doubao-seedream-4.0".to_string()),
        messages: Some(vec![ChatMessage {
            role: "user".to_string(),
            content: Some(ChatContent::Parts(vec![
                ContentPart::text("Turn this sketch into a watercolor, two variations"),
                ContentPart::image("https://example.com/sketch.png"),
            ])),
        }]),
        n: Some(2),
        size: Some("16:9".to_string()),
        temperature: Some(0.5),
        ..ChatRequest::default()
    };

    // Legacy ids resolve through the built-in catalogue
    let aliases = model_aliases(&HashMap::new());
    let provider_req = chat_to_provider(&chat_req, &aliases)?;

    println!("=== Translated Request (provider format) ===");
    println!("{}", serde_json::to_string_pretty(&provider_req)?);

    // Simulate a provider response and translate back
    let provider_resp = ProviderResponse {
        model: Some("doubao-seedream-4-0-250828".to_string()),
        created: Some(1_700_000_000),
        data: vec![
            ProviderImageResult::Success {
                url: Some("https://cdn.example.com/1.png".to_string()),
                b64_json: None,
                size: Some("2560x1440".to_string()),
            },
            ProviderImageResult::Failure {
                error: ProviderErrorBody::new("OutputImageSensitiveContentDetected", "blocked"),
            },
        ],
        usage: Some(ProviderUsage {
            generated_images: Some(1),
            output_tokens: Some(16_384),
            total_tokens: Some(16_384),
        }),
    };

    let chat_resp = provider_to_chat(&provider_resp, "doubao-seedream-4.0");

    println!();
    println!("=== Translated Response (OpenAI format) ===");
    println!("{}", serde_json::to_string_pretty(&chat_resp)?);

    // Demonstrate the stream relay
    println!();
    println!("=== Streaming Relay Demo ===");

    let mut relay = StreamRelay::new("doubao-seedream-4.0");
    let mut frames = relay.open();

    let events = vec![
        ProviderStreamEvent::PartialSucceeded {
            image_index: 0,
            url: Some("https://cdn.example.com/1.png".to_string()),
            b64_json: None,
            size: Some("2560x1440".to_string()),
        },
        ProviderStreamEvent::PartialFailed {
            image_index: 1,
            error: ProviderErrorBody::new("OutputImageSensitiveContentDetected", "blocked"),
        },
        ProviderStreamEvent::Completed { usage: None },
    ];

    for event in events {
        frames.extend(relay.step(RelayInput::Event(event))?);
    }
    frames.extend(relay.step(RelayInput::EndOfStream)?);

    for frame in &frames {
        print!("{}", frame.to_sse());
    }

    println!("Done! The translation layer works without any network calls.");
    Ok(())
}

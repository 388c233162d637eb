//! Provider client and stream relay driver.
//!
//! Sends translated requests to the image generation endpoint and turns its
//! answers into either a completed [`ProviderResponse`] or an ordered stream of
//! [`ProviderStreamEvent`]s, which [`relay_stream`] feeds through a
//! [`StreamRelay`] to produce client SSE frames.

use crate::error::{GatewayError, Result};
use crate::logging::RequestLog;
use crate::providers::ProviderPreset;
use crate::translate::provider_types::{
    ProviderErrorBody, ProviderErrorEnvelope, ProviderImageResult, ProviderRequest,
    ProviderResponse, ProviderStreamEvent,
};
use crate::translate::streaming::{RelayInput, SseFrame, StreamRelay, DONE_SENTINEL};

use eventsource_stream::Eventsource;
use futures::stream::Stream;
use futures::StreamExt;
use std::pin::Pin;

/// Provider events in arrival order. The end of the stream is the end-of-input signal.
pub type ProviderEventStream = Pin<Box<dyn Stream<Item = ProviderStreamEvent> + Send>>;

/// Client-facing frames produced by the relay.
pub type SseStream = Pin<Box<dyn Stream<Item = SseFrame> + Send>>;

/// Where and as whom to call the provider for one request.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    pub base_url: String,
    pub api_key: String,
}

impl UpstreamTarget {
    fn generations_url(&self) -> String {
        ProviderPreset::generations_url(&self.base_url)
    }
}

/// Call the provider once and wait for the full result list.
///
/// # Errors
/// `UpstreamTimeout` on transport failure, `UpstreamApi` on an HTTP error status,
/// `UpstreamEmptyResponse` when the result list is empty.
pub async fn generate(
    req: &ProviderRequest,
    target: &UpstreamTarget,
    client: &reqwest::Client,
    log: &RequestLog,
) -> Result<ProviderResponse> {
    let url = target.generations_url();
    let mut body = req.clone();
    body.stream = false;

    log.info("proxy", format!("POST {} model={}", url, body.model));
    let started = std::time::Instant::now();

    let response = send(&body, &url, target, client).await?;
    let status = response.status().as_u16();
    let text = response.text().await.map_err(transport_error)?;

    log.debug(
        "proxy",
        format!(
            "Response status={} body_len={} took={}ms",
            status,
            text.len(),
            started.elapsed().as_millis()
        ),
    );

    if status >= 400 {
        let err = api_error(status, &text);
        log.warn("proxy", format!("Provider error: {err}"));
        return Err(err);
    }

    let parsed: ProviderResponse = serde_json::from_str(&text).map_err(|e| {
        GatewayError::upstream_api(
            502,
            "invalid_response",
            format!("Failed to parse provider response: {e}. Body: {}", truncate(&text, 300)),
        )
    })?;

    if parsed.data.is_empty() {
        log.error("proxy", "Provider returned no image data");
        return Err(GatewayError::UpstreamEmptyResponse);
    }

    Ok(parsed)
}

/// Start a provider stream.
///
/// Native streams are checked for transport and HTTP status errors here,
/// before the client stream is opened. Emulated streams return at once and
/// run the generation call when first polled, so the opener is not held back;
/// their failures arrive as a request-level `error` event.
///
/// # Errors
/// Same as [`generate`] for native stream failures before the first event.
pub async fn stream_events(
    req: &ProviderRequest,
    target: &UpstreamTarget,
    client: &reqwest::Client,
    log: &RequestLog,
    native: bool,
) -> Result<ProviderEventStream> {
    if !native {
        log.info("proxy", "Emulating stream from a single generation call");
        return Ok(Box::pin(emulated_events(
            req.clone(),
            target.clone(),
            client.clone(),
            log.clone(),
        )));
    }

    let url = target.generations_url();
    let mut body = req.clone();
    body.stream = true;

    log.info("proxy", format!("POST {} model={} (streaming)", url, body.model));

    let response = send(&body, &url, target, client).await?;
    let status = response.status().as_u16();

    if status >= 400 {
        let text = response.text().await.unwrap_or_default();
        let err = api_error(status, &text);
        log.warn("proxy", format!("Streaming error: {err}"));
        return Err(err);
    }

    Ok(Box::pin(parse_event_stream(response.bytes_stream(), log.clone())))
}

/// Frame a provider SSE byte stream into events. `[DONE]` ends the sequence;
/// a transport failure becomes a request-level `error` event.
pub fn parse_event_stream<B, E>(
    byte_stream: impl Stream<Item = std::result::Result<B, E>> + Send + 'static,
    log: RequestLog,
) -> impl Stream<Item = ProviderStreamEvent> + Send + 'static
where
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let events = byte_stream.eventsource();
        tokio::pin!(events);

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    log.error("stream", format!("Provider stream error: {e}"));
                    yield ProviderStreamEvent::Error {
                        error: ProviderErrorBody::new("network_error", e.to_string()),
                    };
                    break;
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                break;
            }

            match ProviderStreamEvent::parse(data) {
                Ok(parsed) => {
                    log.debug("stream", format!("Provider event {}", parsed.name()));
                    yield parsed;
                }
                Err(e) => {
                    log.debug("stream", format!("Skipping unparseable event: {e}"));
                }
            }
        }
    }
}

/// One non-stream generation call, replayed as stream events once it answers.
fn emulated_events(
    req: ProviderRequest,
    target: UpstreamTarget,
    client: reqwest::Client,
    log: RequestLog,
) -> impl Stream<Item = ProviderStreamEvent> + Send + 'static {
    async_stream::stream! {
        match generate(&req, &target, &client, &log).await {
            Ok(resp) => {
                for event in events_from_response(resp) {
                    yield event;
                }
            }
            Err(e) => {
                log.error("stream", format!("Emulated generation failed: {e}"));
                yield ProviderStreamEvent::Error {
                    error: error_event_body(&e),
                };
            }
        }
    }
}

fn error_event_body(err: &GatewayError) -> ProviderErrorBody {
    ProviderErrorBody::new(err.code(), err.client_message())
}

/// Replay a completed response as the event sequence a native stream would produce.
#[must_use]
pub fn events_from_response(resp: ProviderResponse) -> Vec<ProviderStreamEvent> {
    let mut events: Vec<ProviderStreamEvent> = resp
        .data
        .into_iter()
        .zip(0u32..)
        .map(|(result, image_index)| match result {
            ProviderImageResult::Failure { error } => {
                ProviderStreamEvent::PartialFailed { image_index, error }
            }
            ProviderImageResult::Success { url, b64_json, size } => {
                ProviderStreamEvent::PartialSucceeded {
                    image_index,
                    url,
                    b64_json,
                    size,
                }
            }
        })
        .collect();

    events.push(ProviderStreamEvent::Completed { usage: resp.usage });
    events
}

/// Drive `relay` over `events`: opener first, events in arrival order, then
/// end-of-input. Ends right after the relay terminates.
pub fn relay_stream(
    events: ProviderEventStream,
    mut relay: StreamRelay,
    log: RequestLog,
) -> SseStream {
    Box::pin(async_stream::stream! {
        for frame in relay.open() {
            yield frame;
        }

        let mut events = events;
        let mut images = 0usize;

        loop {
            let input = match events.next().await {
                Some(event) => {
                    if matches!(event, ProviderStreamEvent::PartialSucceeded { .. }) {
                        images += 1;
                    }
                    RelayInput::Event(event)
                }
                None => RelayInput::EndOfStream,
            };

            match relay.step(input) {
                Ok(frames) => {
                    for frame in frames {
                        yield frame;
                    }
                }
                Err(e) => {
                    log.error("stream", format!("Relay rejected event: {e}"));
                    break;
                }
            }

            if relay.is_terminated() {
                break;
            }
        }

        log.info("stream", format!("Stream completed, {images} image events relayed"));
    })
}

async fn send(
    body: &ProviderRequest,
    url: &str,
    target: &UpstreamTarget,
    client: &reqwest::Client,
) -> Result<reqwest::Response> {
    client
        .post(url)
        .bearer_auth(&target.api_key)
        .json(body)
        .send()
        .await
        .map_err(transport_error)
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout()
        || err.is_connect()
        || err.is_request()
        || err.is_body()
        || err.is_decode()
    {
        GatewayError::upstream_timeout(err.to_string())
    } else {
        GatewayError::Http(err)
    }
}

fn api_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<ProviderErrorEnvelope>(body) {
        Ok(envelope) => GatewayError::upstream_api(
            status,
            envelope
                .error
                .code
                .unwrap_or_else(|| "unknown_error".to_string()),
            envelope
                .error
                .message
                .unwrap_or_else(|| "Volcano Engine API Error".to_string()),
        ),
        Err(_) => GatewayError::upstream_api(
            status,
            "unknown_error",
            format!("Provider returned status {}: {}", status, truncate(body, 500)),
        ),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

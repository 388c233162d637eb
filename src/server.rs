use crate::auth;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::logging::{ActivityLog, RequestLog};
use crate::models;
use crate::proxy::{self, UpstreamTarget};
use crate::translate::openai_types::ChatRequest;
use crate::translate::request::chat_to_provider;
use crate::translate::response::provider_to_chat;
use crate::translate::streaming::StreamRelay;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Request bodies carry base64 reference images.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Per-request override of the provider base URL.
pub const API_BASE_HEADER: &str = "x-volc-api-base";

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub client: reqwest::Client,
    pub log: ActivityLog,
    /// Legacy and configured model aliases, resolved once at startup.
    pub model_aliases: HashMap<String, String>,
}

impl AppState {
    pub fn new(config: GatewayConfig, client: reqwest::Client, log: ActivityLog) -> Self {
        let model_aliases = models::model_aliases(&config.models);
        Self {
            config,
            client,
            log,
            model_aliases,
        }
    }

    fn upstream_target(&self, headers: &HeaderMap) -> Result<UpstreamTarget> {
        let api_key = auth::resolve_api_key(
            headers,
            self.config.auth.require_bearer,
            self.config.env_api_key(),
        )?;

        let base_url = match headers
            .get(API_BASE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            Some(base) => base.to_string(),
            None => self.config.effective_base_url()?,
        };

        Ok(UpstreamTarget { base_url, api_key })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/chat/completions", post(handle_chat_completions))
        .route("/v1/models", get(handle_models))
        .route("/health", get(handle_health))
        .fallback(handle_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let log = state.log.request();

    match chat_completions(&state, &headers, &body, &log).await {
        Ok(response) => response,
        Err(e) => {
            log.error("server", format!("Request failed: {e}"));
            e.into_response()
        }
    }
}

async fn chat_completions(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
    log: &RequestLog,
) -> Result<Response> {
    let target = state.upstream_target(headers)?;

    let req: ChatRequest = serde_json::from_slice(body)
        .map_err(|e| GatewayError::invalid_request(format!("Invalid request body: {e}")))?;

    let provider_req = chat_to_provider(&req, &state.model_aliases)?;
    // chat_to_provider already rejected a missing model
    let model = req.model.clone().unwrap_or_default();

    log.info(
        "server",
        format!(
            "Request: model={} stream={} images={} sequential={}",
            provider_req.model,
            req.stream,
            provider_req.image.is_some(),
            provider_req.sequential_image_generation.is_some()
        ),
    );

    if req.stream {
        let events = proxy::stream_events(
            &provider_req,
            &target,
            &state.client,
            log,
            state.config.provider.native_stream,
        )
        .await?;
        let frames = proxy::relay_stream(events, StreamRelay::new(&model), log.clone());

        let sse = frames.map(|frame| -> std::result::Result<Event, Infallible> {
            Ok(Event::default().data(frame.data()))
        });
        return Ok(Sse::new(sse)
            .keep_alive(axum::response::sse::KeepAlive::default())
            .into_response());
    }

    let provider_resp = proxy::generate(&provider_req, &target, &state.client, log).await?;
    let chat_resp = provider_to_chat(&provider_resp, &model);

    log.info_with_context(
        "server",
        "Completed",
        serde_json::json!({
            "success_count": chat_resp.volcengine.success_count,
            "fail_count": chat_resp.volcengine.fail_count,
        }),
    );

    Ok(Json(chat_resp).into_response())
}

async fn handle_models(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if state.config.auth.require_bearer {
        if let Err(e) = auth::bearer_token(&headers) {
            return e.into_response();
        }
    }
    Json(models::model_list()).into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn handle_not_found(method: Method, uri: Uri) -> Response {
    GatewayError::NotFound {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::new(dir.path().join("server.log")).unwrap();
        let mut config = GatewayConfig::default();
        // Nothing listens here; tests below never reach the provider.
        config.provider.base_url = Some("http://127.0.0.1:9/api/v3".to_string());
        let state = Arc::new(AppState::new(config, reqwest::Client::new(), log));
        (dir, build_router(state))
    }

    async fn json_body(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chat_request(auth: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_models_requires_bearer() {
        let (_dir, app) = app();
        let resp = app
            .clone()
            .oneshot(Request::get("/v1/models").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(
                Request::get("/v1/models")
                    .header("authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["object"], "list");
    }

    #[tokio::test]
    async fn test_missing_model_is_bad_request() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(chat_request(
                Some("Bearer k"),
                r#"{"messages":[{"role":"user","content":"a cat"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error"]["message"], "Missing required parameter: model");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(chat_request(Some("Bearer k"), "{not json"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn test_missing_auth_is_unauthorized() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(chat_request(None, r#"{"model":"m","messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_is_openai_404() {
        let (_dir, app) = app();
        let resp = app
            .oneshot(Request::get("/v1/embeddings").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["error"]["code"], "not_found");
    }
}

//! Start a seedream-gateway server programmatically.
//!
//! Usage:
//!   cargo run --example basic_gateway
//!
//! Clients send their Volcano Engine key as `Authorization: Bearer <key>`.

use seedream_gateway::{build_router, ActivityLog, AppState, GatewayConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut config = GatewayConfig::find_and_load(None)?;
    config.apply_env_overrides();
    let base_url = config.effective_base_url()?;

    println!("Provider: {} ({})", config.provider.name, base_url);
    println!("Model aliases: {}", config.models.len());

    let log = ActivityLog::new("gateway-example.log")?;
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.provider.timeout_secs))
        .build()?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, client, log));

    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("Listening on http://{}", addr);
    println!();
    println!("  curl http://localhost:{}/v1/chat/completions \\", port);
    println!("    -H 'Authorization: Bearer $VOLC_API_KEY' \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"model\":\"doubao-seedream-4-0-250828\",\"messages\":[{{\"role\":\"user\",\"content\":\"a red fox\"}}]}}'"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

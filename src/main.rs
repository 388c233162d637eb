use clap::Parser;
use seedream_gateway::config::config_search_paths;
use seedream_gateway::providers::ProviderPreset;
use seedream_gateway::translate::normalize::supported_ratios;
use seedream_gateway::{build_router, ActivityLog, AppState, GatewayConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "seedream-gateway",
    about = "OpenAI-compatible chat completions gateway for Seedream image generation",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Provider preset name (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// Activity log file path
    #[arg(long, default_value = "seedream-gateway.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seedream_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env_overrides();

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(ref provider) = cli.provider {
        config.provider.name = provider.clone();
        if let Some(preset) = ProviderPreset::from_name(provider) {
            config.provider.api_key_env = preset.default_api_key_env.to_string();
        }
    }

    let log = ActivityLog::new(&cli.log_file)?;

    // Validate config eagerly
    let base_url = config.effective_base_url()?;

    info!("{}", "=".repeat(60));
    info!("seedream-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", "=".repeat(60));
    info!("  Provider:  {}", config.provider.name);
    info!("  Base URL:  {}", base_url);
    info!(
        "  Stream:    {}",
        if config.provider.native_stream { "native" } else { "emulated" }
    );
    info!("  Port:      {}", config.port);
    info!("  Aliases:   {} configured", config.models.len());
    info!("  Log file:  {}", cli.log_file.display());
    info!(
        "  Sizes:     ratios {}; pixels (1024x1024); resolutions (1K, 2K, 4K)",
        supported_ratios().collect::<Vec<_>>().join(", ")
    );

    log.info(
        "startup",
        format!(
            "Starting seedream-gateway provider={} base_url={} port={}",
            config.provider.name, base_url, config.port
        ),
    );

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.provider.timeout_secs))
        .build()?;

    let state = Arc::new(AppState::new(config.clone(), client, log));

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  GET  /health");
    info!("  GET  /v1/models");
    info!("  POST /v1/chat/completions");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, shutting down gracefully");
}

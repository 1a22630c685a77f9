use clap::Parser;
use pkce_token_broker::config;
use pkce_token_broker::oauth::TokenExchangeService;
use pkce_token_broker::routes;
use std::path::PathBuf;
use std::time::Duration;

/// PKCE token broker — exchanges authorization codes and refresh tokens with
/// the identity provider on behalf of public browser clients.
#[derive(Parser, Debug)]
#[command(name = "pkce-token-broker", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // CLI --port overrides config
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    tracing::info!(
        token_url = %cfg.provider.token_url,
        redirect_uri = %cfg.provider.redirect_uri,
        has_client_id = cfg.provider.has_client_id(),
        has_client_secret = cfg.provider.has_client_secret(),
        "Configuration loaded successfully"
    );

    let cors = match routes::cors_layer(&cfg.server.allowed_origin) {
        Ok(layer) => layer,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.server.request_timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::error!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        });

    let app = routes::router(TokenExchangeService::new(http, cfg.provider), cors);

    let bind_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("Listening on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Server error: {e}");
            std::process::exit(1);
        });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

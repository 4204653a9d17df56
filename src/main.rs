use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use viva::config::Config;
use viva::conversation::{AgentClient, AgentService};
use viva::orchestrator::Orchestrator;
use viva::server::{self, AppState};
use viva::store::{FileSessionStore, SessionStore};
use viva::streaming::{
    CredentialIssuer, ResilientStreaming, StreamingApi, StreamingClient, TokenClient,
};

// ============================================================================
// CLI Types
// ============================================================================

/// Viva - Avatar assessment session orchestration service
#[derive(Parser, Debug)]
#[command(version = viva::build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "viva.toml")]
    config: String,

    /// Host to bind to (overrides config file)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = Path::new(&cli.config);
    let mut config = Config::load(config_path).await?;

    // CLI overrides config
    if let Some(host) = cli.host {
        config.server.host = host.to_string();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    // API keys come from the environment, never from the config file
    let streaming_api_key = env_api_key("STREAMING_API_KEY");
    let conversation_api_key = env_api_key("CONVERSATION_API_KEY");

    let http = reqwest::Client::new();

    let issuer: Arc<dyn CredentialIssuer> = Arc::new(TokenClient::new(
        http.clone(),
        config.streaming.base_url.clone(),
        streaming_api_key,
        Duration::from_secs(config.streaming.token_timeout_seconds),
    ));
    let api: Arc<dyn StreamingApi> = Arc::new(StreamingClient::new(
        http.clone(),
        config.streaming.base_url.clone(),
        Duration::from_secs(config.streaming.session_timeout_seconds),
        Duration::from_secs(config.streaming.speak_timeout_seconds),
    ));
    let streaming = ResilientStreaming::new(
        issuer,
        api,
        config.streaming.mask_failures,
        Duration::from_millis(config.streaming.mock_speak_delay_ms),
    );

    let agent: Arc<dyn AgentService> = Arc::new(AgentClient::new(
        http,
        config.conversation.base_url.clone(),
        conversation_api_key,
        Duration::from_secs(config.conversation.timeout_seconds),
    ));

    let sessions_path = Config::resolve_path(config_path, &config.sessions.path);
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&sessions_path));
    info!(path = %sessions_path.display(), "Session store initialized");

    let orchestrator = Arc::new(Orchestrator::new(streaming, agent, store));

    // Spawn stale session sweep loop
    if config.sessions.max_age_hours > 0 {
        let reaper = orchestrator.clone();
        let max_age_hours = config.sessions.max_age_hours;
        let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_seconds);
        tokio::spawn(async move {
            let max_age = chrono::Duration::hours(max_age_hours as i64);
            let mut interval = tokio::time::interval(sweep_interval);
            interval.tick().await; // skip immediate tick
            loop {
                interval.tick().await;
                match reaper.expire_stale(max_age).await {
                    Ok(0) => {}
                    Ok(cancelled) => info!(cancelled, "Expired stale sessions"),
                    Err(e) => warn!(error = %e, "Stale session sweep failed"),
                }
            }
        });
        info!(max_age_hours, "Stale session reaper enabled");
    }

    let state = AppState {
        orchestrator,
        max_connections: config.server.max_connections,
    };
    let app = server::build_app(state, config.server.request_timeout_seconds);

    let ip: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(ip, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(addr = %addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Read an API key from the environment. A missing or empty key leaves the
/// corresponding client unauthenticated; upstream calls will fail and, for
/// the streaming provider, be masked per the resilience config. The key
/// value itself is never logged.
fn env_api_key(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            warn!(variable = name, "API key not set, upstream calls will fail");
            String::new()
        }
    }
}

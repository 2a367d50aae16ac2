use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use callbridge::{
    create_router, AppState, Config, ConfiguredRecognizerFactory, ElevenLabsClient,
    SessionConfig, SessionRegistry, SessionServices, VoiceflowClient,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Telephony voice bridge: caller audio → STT → dialog → TTS → caller
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/callbridge")]
    config: String,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    for (name, present) in cfg.credential_status() {
        if present {
            info!("{}: set", name);
        } else {
            warn!("{}: MISSING", name);
        }
    }

    let services = SessionServices {
        recognizers: Arc::new(ConfiguredRecognizerFactory::new(cfg.recognizer.clone())),
        dialog: Arc::new(VoiceflowClient::new(&cfg.dialog)),
        synthesis: Arc::new(ElevenLabsClient::new(&cfg.synthesis, cfg.transport.format())),
    };
    let state = AppState::new(services, SessionConfig::from_config(&cfg), cfg.transport.clone());
    let registry = state.registry.clone();

    spawn_health_log(
        registry.clone(),
        Duration::from_secs(cfg.service.health_log_interval_secs),
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);
    info!("Health check: http://{}/health", addr);

    let grace = Duration::from_secs(cfg.service.shutdown_grace_secs);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutting down gracefully...");
            registry.shutdown_all("server shutting down").await;

            // Connections that refuse to drain must not hold the process
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                warn!("Forcing shutdown after {:?}", grace);
                std::process::exit(1);
            });
        })
        .await
        .context("HTTP server failed")?;

    info!("Server closed");
    Ok(())
}

fn spawn_health_log(registry: SessionRegistry, period: Duration) {
    if period.is_zero() {
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            info!("Health check - Active sessions: {}", registry.len().await);
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

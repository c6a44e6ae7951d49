//! slate orchestrator
//!
//! Single-binary service that loads the account and proxy rosters, builds
//! one checkout workflow per account, and exposes the control surface:
//! a WebSocket command channel plus health and metrics endpoints. Bulk
//! commands fan out across the workflows as tracked background jobs; the
//! proxy pool and webhook notifier are shared by all of them.

mod config;
mod metrics;
mod server;
mod webhook;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkout::{
    AccountCredential, CheckoutWorkflow, Collaborators, Notifier, NullNotifier, RestStorefront,
    Supervisor, WatchSet,
};
use proxy_pool::ProxyPool;
use transport::{ChallengeSolver, NoopSolver, TransportSession};

use crate::config::Config;
use crate::server::AppState;
use crate::webhook::WebhookNotifier;

/// In-flight requests get this long to conclude after the shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting slate-orchestrator");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.listen_addr,
        storefront = %config.storefront.base_url,
        proxies = config.proxies.len(),
        accounts = config.accounts.len(),
        "configuration loaded"
    );

    let pool = Arc::new(ProxyPool::new(config.proxy_endpoints()?));
    if pool.is_empty() {
        warn!("no proxies configured, all traffic uses the host's own egress");
    }

    let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NullNotifier),
    };

    // The vendor-specific challenge decryption is an external collaborator;
    // without one wired in, challenged requests surface as transport errors
    // once the solve bound is hit.
    let solver: Arc<dyn ChallengeSolver> = Arc::new(NoopSolver);

    let session_config = config.storefront.session_config();
    let limits = config.limits.workflow_limits();
    let supervisor = Arc::new(Supervisor::new());

    for account in &config.accounts {
        let session = Arc::new(
            TransportSession::new(session_config.clone(), solver.clone())
                .context("failed to build transport session")?,
        );
        let storefront = Arc::new(RestStorefront::new(
            session.clone(),
            config.storefront.base_url.clone(),
            config.storefront.locale.clone(),
            config.storefront.default_region.clone(),
        ));
        let workflow = CheckoutWorkflow::new(
            account.kind,
            AccountCredential::new(account.email.clone(), account.password.expose().clone()),
            Collaborators {
                session,
                pool: pool.clone(),
                storefront,
                notifier: notifier.clone(),
            },
            Arc::new(WatchSet::new()),
            Arc::new(AtomicBool::new(false)),
            limits.clone(),
        );
        let id = supervisor.insert(workflow).await;
        info!(task = %id, account = %account.email, kind = ?account.kind, "workflow created");
    }

    let app_state = AppState::new(supervisor.clone(), pool, prometheus_handle);
    let app = server::build_router(app_state, config.max_connections);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "control server listening");

    // Graceful shutdown: stop the workflows first (cooperative flags plus
    // job aborts), then drain the server under a hard timeout so a slow
    // client cannot block process exit.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    supervisor.shutdown().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("control server drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

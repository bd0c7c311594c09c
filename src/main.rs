// nfcache entry point.
// Pre-fetches watched endpoints, starts background refresh, and serves HTTP until signalled.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nfcache::config::TOKEN_ENV;
use nfcache::github::DEFAULT_TIMEOUT;
use nfcache::server::{self, AppState, Endpoints};
use nfcache::{CacheStore, Config, GitHubClient};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, dotenv_loaded) = Config::load();
    install_tracing(config.log_json);
    if dotenv_loaded {
        info!("Loaded .env file");
    }

    let token = config.token();
    if token.is_none() {
        warn!("{} not set, using unauthenticated access", TOKEN_ENV);
    }

    let client = GitHubClient::with_base_url(&config.api_url, token, DEFAULT_TIMEOUT)
        .context("building origin client")?;
    let store = CacheStore::new(Arc::new(client), config.cache_config());
    let endpoints = Endpoints::new(config.org.clone());

    info!("Pre-fetching initial endpoint data");
    for path in endpoints.cached_paths() {
        info!(path = %path, "Fetching");
        // Most likely an origin problem; refuse to serve an endpoint we cannot populate.
        store
            .watch(&path)
            .await
            .with_context(|| format!("unable to fetch {} on startup", path))?;
    }
    store.start(store.config().refresh_interval)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    let app = server::router(AppState::new(store.clone(), endpoints));

    server::serve(listener, app, shutdown_signal()).await?;

    // Can take a while if a refresh is in flight.
    store.shutdown().await;
    info!("Service gracefully exited");
    Ok(())
}

fn install_tracing(json: bool) {
    // RUST_LOG overrides the default INFO level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

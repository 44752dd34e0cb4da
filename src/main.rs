// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Bookswap Server
//!
//! Marketplace backend with a per-identity connection guard. Every guarded
//! request is counted against its identity (client address or username);
//! the sixth request inside one second bans that identity for an hour.
//!
//! ## Configuration
//!
//! Loaded from environment variables (a `.env` file is honoured):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `GUARD_MAX_REQUESTS`: Requests allowed per window (default: 5)
//! - `GUARD_WINDOW_MS`: Sliding window length (default: 1000)
//! - `GUARD_BAN_SECS`: Ban length (default: 3600)
//! - `TRUST_FORWARDED_FOR`: Key on the right-most X-Forwarded-For hop
//! - `STORAGE_PATH`: sled database directory (in-memory when unset)
//! - `JWT_SECRET`: Session signing secret (required)
//! - `CHECK_TOKEN`: Shared secret for `POST /check` (route disabled when unset)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bookswap_server::{
    config::Config,
    handlers::AppState,
    router::app,
    AccountStore, ConnectionStore, MemoryStore, SledStore, SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        max_requests = config.guard.max_requests,
        window_ms = config.guard.window_ms,
        ban_secs = config.guard.ban_secs,
        trust_forwarded_for = config.guard.trust_forwarded_for,
        check_endpoint = config.check_token.is_some(),
        "Starting bookswap server"
    );

    let (connections, accounts): (Arc<dyn ConnectionStore>, Arc<dyn AccountStore>) =
        match &config.storage.path {
            Some(path) => {
                let store = Arc::new(SledStore::open(path)?);
                let connections: Arc<dyn ConnectionStore> = store.clone();
                (connections, store)
            }
            None => {
                info!("STORAGE_PATH unset, connection records kept in memory");
                let store = Arc::new(MemoryStore::new());
                let connections: Arc<dyn ConnectionStore> = store.clone();
                (connections, store)
            }
        };

    let addr: SocketAddr = config.bind_addr.parse()?;
    let state = Arc::new(AppState::new(
        config,
        connections,
        accounts,
        Arc::new(SystemClock),
    )?);

    // Spawn lock-table maintenance
    let maintenance_state = state.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(maintenance_state.guard.config().maintenance_interval());
        loop {
            interval.tick().await;
            let active = maintenance_state.guard.prune_locks().await;
            tracing::debug!(active, "Identity locks after maintenance");
        }
    });

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

//! API Server for CredMate
//!
//! Exchanges Firebase identity tokens for session tokens and serves the
//! authenticated profile endpoints over REST.

mod auth;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use cm_core::identity::FirebaseVerifier;
use cm_core::user::FileUserDirectory;
use cm_core::{AuthError, ConfigError, SessionConfig};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=debug,cm_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = session_config_from(SessionConfig::from_env())?;

    let project_id = std::env::var("FIREBASE_PROJECT_ID")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .context("FIREBASE_PROJECT_ID must be set")?;
    let provider = Arc::new(FirebaseVerifier::new(project_id));

    let data_dir = std::env::var("CM_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".cm-data"));
    tracing::info!("Using data directory: {:?}", data_dir);

    let directory = FileUserDirectory::new(data_dir.join("users.json"))
        .await
        .context("failed to open user directory")?;

    let app_state = AppState::new(&config, provider, Arc::new(directory));

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::auth::router())
        .merge(routes::user::router())
        .with_state(app_state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("REST API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Startup configuration failures surface as `CONFIGURATION_MISSING`
fn session_config_from(
    loaded: Result<SessionConfig, ConfigError>,
) -> anyhow::Result<SessionConfig> {
    loaded
        .map_err(AuthError::from)
        .inspect_err(|err| {
            tracing::error!(
                code = err.code(),
                recovery = ?err.recovery(),
                error = %err,
                "session configuration rejected"
            )
        })
        .context("invalid session token configuration")
}

/// `CM_BIND_ADDR` wins over `PORT`
fn bind_addr() -> anyhow::Result<SocketAddr> {
    if let Ok(addr) = std::env::var("CM_BIND_ADDR") {
        return addr
            .parse()
            .with_context(|| format!("invalid CM_BIND_ADDR: {}", addr));
    }
    if let Ok(port) = std::env::var("PORT") {
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid PORT: {}", port))?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }
    Ok(DEFAULT_BIND_ADDR.parse()?)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

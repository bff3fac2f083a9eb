//! HTTP server initialization and runtime setup.
//!
//! Handles the database pool, migrations, mail transport selection, crash
//! recovery of interrupted sends and the Axum server lifecycle.

use crate::config::Config;
use crate::domain::transport::Transport;
use crate::infrastructure::mail::{LogTransport, SmtpTransport};
use crate::routes::app_router;
use crate::state::{AppState, DispatchSettings, Repositories};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Apply migrations
/// - Mail transport (SMTP or log-only)
/// - Optional relaunch of interrupted send loops
/// - Axum HTTP server with graceful shutdown
///
/// Send loops are detached tasks; on shutdown they stop with the runtime and
/// their campaigns stay `sending` with the unsent rows still pending.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - The SMTP transport cannot be built
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    let transport = build_transport(&config)?;

    let state = AppState::new(
        Repositories::postgres(Arc::new(pool)),
        transport,
        DispatchSettings {
            public_base_url: config.public_base_url.clone(),
            send_interval: config.send_interval(),
            batch_size: config.dispatch_batch_size,
            token_signing_secret: config.token_signing_secret.clone(),
        },
    );

    if config.dispatch_resume_on_startup {
        match state.dispatch_service.recover_interrupted().await {
            Ok(resumed) => tracing::info!(count = resumed.len(), "Interrupted campaigns resumed"),
            Err(e) => tracing::error!(error = %e, "Failed to resume interrupted campaigns"),
        }
    }

    let app = app_router(state, config.behind_proxy);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn build_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    match config.smtp_settings() {
        Some(settings) => {
            let smtp = SmtpTransport::new(&settings).context("Failed to build SMTP transport")?;
            tracing::info!(host = %settings.host, port = settings.port, "Mail transport: SMTP");
            Ok(Arc::new(smtp))
        }
        None => {
            tracing::warn!("Mail transport: log only, messages are not delivered");
            Ok(Arc::new(LogTransport::new()))
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}

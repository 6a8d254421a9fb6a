//! pridr Event Service
//!
//! Serves the user event API and listens to identity-provider account
//! notifications, removing an account's user events once the account is
//! deleted.

use std::sync::Arc;

use anyhow::{Context, Result};
use pridr_event_service::{
    api,
    bus::{BusSubscriber, NotificationHandler},
    config,
    db::Database,
    state::AppState,
};
use pridr_events::SubscriptionBinding;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to PRIDR_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting pridr event service");
    info!(
        listen_addr = %config.listen_addr,
        bus = ?config.bus,
        "Configuration loaded"
    );

    let binding = SubscriptionBinding::for_app(
        config.bus.queue.clone(),
        config.bus.exchange.clone(),
        &config.bus.app_id,
    )
    .context("Invalid message bus binding")?;

    // Connect to database
    let db = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Database connection established");
            db
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    // Run migrations and seed demo rows in dev mode
    if config.dev_mode {
        info!("Running database migrations (dev mode)");
        if let Err(e) = db.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
        match db.seed_if_empty().await {
            Ok(seeded) => info!(seeded = seeded, "Dev seed complete"),
            Err(e) => {
                error!(error = %e, "Failed to seed user events");
                return Err(e.into());
            }
        }
    }

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start message bus subscriber in background
    let handler = NotificationHandler::new(Arc::new(db.record_store()));
    let subscriber = BusSubscriber::new(config.bus.clone(), binding, handler);
    let subscription_state = subscriber.state();
    let subscriber_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            if let Err(e) = subscriber.run(shutdown_rx).await {
                error!(error = %e, "Message bus subscriber stopped");
            }
        }
    });

    // Create application state
    let state = AppState::new(db, subscription_state);

    // Build and run the server
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    // Spawn the server with graceful shutdown
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Signal shutdown to the subscriber
    let _ = shutdown_tx.send(true);

    // A cleanup in flight finishes before the subscriber closes its channel
    info!("Waiting for message bus subscriber to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if let Err(e) = tokio::time::timeout(shutdown_timeout, subscriber_handle).await {
        warn!(error = %e, "Message bus subscriber did not shut down in time");
    }

    info!("Event service shutdown complete");
    Ok(())
}

//! Entry point for the `trips-service` binary.

use axum::Router;
use carpool_auth::TokenVerifier;
use carpool_core::event_bus::EventBus;
use carpool_postgres::idempotency::IdempotencyLedger;
use carpool_postgres::pool::{build_pool, PoolConfig};
use carpool_redpanda::RedpandaEventBus;
use carpool_runtime::metrics::MetricsServer;
use carpool_trips::config::Settings;
use carpool_trips::repository::TripRepository;
use carpool_trips::state::TripsState;
use carpool_trips::{build_router, events};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "trips_service=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    tracing::info!(server_addr = %settings.server_addr(), "configuration loaded");

    let pool = build_pool(
        &settings.database.url,
        PoolConfig {
            max_connections: settings.database.max_connections,
            ..PoolConfig::default()
        },
    )
    .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("connected to postgres and ran migrations");

    let event_bus: Arc<dyn EventBus> = Arc::new(
        RedpandaEventBus::builder()
            .brokers(&settings.bus.brokers)
            .consumer_group(&settings.bus.consumer_group)
            .build()?,
    );
    tracing::info!("event bus connected");

    let mut metrics_server = MetricsServer::new(settings.metrics_addr().parse()?);
    metrics_server.start()?;
    spawn_metrics_endpoint(metrics_server, settings.metrics_addr()).await;

    let repository = TripRepository::new(pool.clone());
    let ledger = Arc::new(IdempotencyLedger::new(pool.clone()));

    tokio::spawn(events::run_reservation_consumer(event_bus.clone(), repository.clone(), ledger));

    let state = TripsState {
        repository,
        event_bus,
        pool,
        token_verifier: TokenVerifier::new(settings.auth.secret.as_bytes()),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server_addr()).await?;
    tracing::info!(address = %settings.server_addr(), "trips service listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("trips service stopped");
    Ok(())
}

async fn spawn_metrics_endpoint(server: MetricsServer, addr: String) {
    let Some(handle) = server.handle().cloned() else {
        tracing::warn!("metrics recorder not installed, skipping /metrics endpoint");
        return;
    };

    let metrics_app = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => {
            tracing::info!(%addr, "metrics endpoint listening");
            tokio::spawn(async move {
                if let Err(error) = axum::serve(listener, metrics_app).await {
                    tracing::error!(%error, "metrics server stopped unexpectedly");
                }
            });
        }
        Err(error) => tracing::error!(%error, %addr, "failed to bind metrics listener"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
    tokio::time::sleep(Duration::from_millis(100)).await;
}

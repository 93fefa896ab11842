//! Entry point for the `search-service` binary.

use axum::Router;
use carpool_auth::TokenVerifier;
use carpool_core::event_bus::EventBus;
use carpool_postgres::idempotency::IdempotencyLedger;
use carpool_postgres::pool::{build_pool, PoolConfig};
use carpool_redpanda::RedpandaEventBus;
use carpool_runtime::circuit_breaker::CircuitBreaker;
use carpool_runtime::metrics::MetricsServer;
use carpool_search::build_router;
use carpool_search::config::Settings;
use carpool_search::events;
use carpool_search::repository::SearchRepository;
use carpool_search::search_engine::{GuardedSearchEngine, SolrSearchEngine};
use carpool_search::state::SearchState;
use carpool_search::trips_client::TripsClient;
use carpool_search::users_client::UsersClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "search_service=info,tower_http=info".into()))
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

    let repository = SearchRepository::new(pool.clone());
    let ledger = Arc::new(IdempotencyLedger::new(pool.clone()));

    let trips_client = TripsClient::new(settings.downstream.trips_base_url.clone(), Duration::from_millis(settings.downstream.timeout_ms));
    let users_client = UsersClient::new(
        settings.downstream.users_base_url.clone(),
        Duration::from_millis(settings.downstream.timeout_ms),
        Duration::from_secs(settings.downstream.profile_cache_ttl_secs),
    );

    let engine = settings.search_engine.enabled.then(|| {
        let client = SolrSearchEngine::new(
            settings.search_engine.base_url.clone(),
            settings.search_engine.collection.clone(),
            Duration::from_millis(settings.search_engine.timeout_ms),
        );
        let breaker = CircuitBreaker::new()
            .with_failure_threshold(settings.search_engine.failure_threshold)
            .with_timeout(Duration::from_millis(settings.search_engine.open_timeout_ms))
            .with_success_threshold(settings.search_engine.success_threshold);
        Arc::new(GuardedSearchEngine::new(client, breaker))
    });

    tokio::spawn(events::run_projection_consumer(
        event_bus,
        repository.clone(),
        trips_client,
        users_client,
        engine.clone(),
        ledger,
    ));

    let state = SearchState {
        repository,
        pool,
        engine,
        token_verifier: TokenVerifier::new(settings.auth.secret.as_bytes()),
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server_addr()).await?;
    tracing::info!(address = %settings.server_addr(), "search service listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("search service stopped");
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

//! Courier server entry point.

use std::sync::Arc;

use apalis::prelude::*;
use axum::Router;
use courier_api::{AppState, health_router, router as api_router};
use courier_common::Config;
use courier_core::{MessagesService, build_sender};
use courier_queue::store::connect;
use courier_queue::{
    BackoffPolicy, LedgerKeys, LedgerStore, RedisJobQueue, RedisLedgerStore, SendMessageContext,
    SendMessageHandler, SendMessageJob, SharedClock, SystemClock, TokenBucket, TokenBucketConfig,
    send_message_worker,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Install the tracing subscriber. `COURIER_LOG_FORMAT=json` selects JSON output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "courier=debug,tower_http=debug".into());
    let json = std::env::var("COURIER_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting courier...");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Connect fred client for the rate ledger
    info!("Connecting to Redis...");
    let fred_client = connect(&config.redis.url).await?;
    info!("Connected to Redis for the token bucket");

    let store: Arc<dyn LedgerStore> = Arc::new(RedisLedgerStore::new(fred_client));
    let clock: SharedClock = Arc::new(SystemClock);
    let keys = LedgerKeys::with_prefix(&config.redis.prefix);
    let bucket_config = TokenBucketConfig::from(&config);

    info!(
        tokens = bucket_config.tokens.len(),
        cooldown_ms = config.bucket.cooldown_ms,
        lock_ttl_ms = config.lock.ttl_ms,
        max_lock_wait_ms = bucket_config.lock_backoff.total_wait().as_millis() as u64,
        "Token bucket configured"
    );

    let bucket = Arc::new(TokenBucket::new(store, clock, &keys, bucket_config));
    if let Err(e) = bucket.initialize().await {
        error!(error = %e, "Failed to initialize token bucket");
    }

    // Connect apalis storage for the send queue
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let storage = apalis_redis::RedisStorage::<SendMessageJob>::new(redis_conn);
    let queue = Arc::new(RedisJobQueue::new(storage));
    info!("Connected to Redis job queue");

    let sender = build_sender(&config.delivery)?;
    let delivery_retry = BackoffPolicy::from(&config.worker);
    let retries = delivery_retry.retries;
    let retry_backoff_ms = config.worker.retry_backoff_ms;
    let handler = SendMessageHandler::new(bucket, sender, delivery_retry);
    let send_ctx = SendMessageContext::new(handler, queue.clone());

    let concurrency = config.worker.concurrency;
    let worker_storage = queue.storage();

    // Spawn the worker in the background
    tokio::spawn(async move {
        let monitor = Monitor::new().register({
            WorkerBuilder::new("send-message")
                .concurrency(concurrency)
                .data(send_ctx)
                .backend(worker_storage)
                .build_fn(send_message_worker)
        });

        if let Err(e) = monitor.run().await {
            error!(error = %e, "Send worker failed");
        }
    });
    info!(concurrency, retries, retry_backoff_ms, "Send worker started");

    let state = AppState::new(MessagesService::new(queue));

    let app = Router::new()
        .merge(health_router())
        .nest("/v1", api_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

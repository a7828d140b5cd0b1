use std::net::SocketAddr;

use anyhow::Context;
use geo_incident::config::Config;
use geo_incident::queue::TaskStore;
use geo_incident::server::{AppState, build_router};
use geo_incident::service::{LocationService, TaskDispatcher, spawn_enqueue_loop};
use geo_incident::store::{Backend, MemoryBackend};
use geo_incident::webhook::HttpWebhookSender;
use geo_incident::worker::DeliveryWorker;
use geo_incident::zones::{MemoryZoneRepository, ZoneCache};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "geo_incident=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    match config.redis_url.clone() {
        #[cfg(feature = "redis")]
        Some(url) => {
            let backend = geo_incident::store::RedisBackend::connect(&url)
                .await
                .context("failed to connect to redis")?;
            info!("Using redis backend");
            serve(config, backend).await
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("REDIS_URL is set but redis support is not compiled in; using in-memory backend");
            serve(config, MemoryBackend::new()).await
        }
        None => {
            info!("Using in-memory backend");
            serve(config, MemoryBackend::new()).await
        }
    }
}

async fn serve<B: Backend>(config: Config, backend: B) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    // Requests still draining after the signal may submit tasks, so the
    // enqueue loop only stops once the server has finished.
    let enqueue_shutdown = CancellationToken::new();
    let tasks = TaskStore::new(backend.clone());

    let (dispatcher, submitted) = TaskDispatcher::channel(config.dispatch_buffer);
    let enqueue = spawn_enqueue_loop(tasks.clone(), submitted, enqueue_shutdown.clone());

    let sender = HttpWebhookSender::new(config.retry).context("failed to build HTTP client")?;
    let worker = DeliveryWorker::new(tasks.clone(), sender, config.worker());
    let worker = tokio::spawn(worker.run(shutdown.clone()));

    let zones = ZoneCache::new(backend, MemoryZoneRepository::new());
    let state = AppState::new(
        LocationService::new(zones, dispatcher),
        tasks,
        config.api_key.clone(),
        config.stats_window,
    );
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, webhook_url = %config.webhook_url, "Listening");

    let signal = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await;

    // Stop the background tasks even if the server failed on its own.
    shutdown.cancel();
    enqueue_shutdown.cancel();
    if let Err(e) = enqueue.await {
        warn!(error = %e, "Enqueue loop ended abnormally");
    }
    if let Err(e) = worker.await {
        warn!(error = %e, "Delivery worker ended abnormally");
    }
    info!("Shut down");

    served.context("server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
    info!("Shutting down gracefully");
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use coindesk_client::Client;
use price_stream::{run_sweeper, BroadcasterPool, Poller, ReplayBuffer, StreamState};
use runtime::{AppConfig, Lifecycle};
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::request_id;
use crate::web;

/// The one symbol this process tracks.
const SYMBOL: &str = "BTC";

/// Wire everything up, serve until a termination signal, then stop the
/// background tasks within the configured grace period.
pub async fn run(config: AppConfig) -> Result<()> {
    tracing::info!(%config, "service starting");

    let client = Arc::new(Client::new(&config.coindesk.url, &config.coindesk.api_key)?);
    let buffer = Arc::new(ReplayBuffer::new(config.cache.ttl(), config.cache.max_size)?);
    let pool = Arc::new(BroadcasterPool::new(config.broadcast.max_peers_per_broadcaster));

    let root = CancellationToken::new();

    let sweeper = Lifecycle::new();
    {
        let buffer = buffer.clone();
        let interval = config.cache.expiration_interval();
        sweeper.start_with_token(root.child_token(), move |cancel| async move {
            run_sweeper(buffer, interval, cancel).await;
            Ok(())
        })?;
    }

    let poller_lc = Lifecycle::new();
    {
        let poller = Poller::new(
            client,
            SYMBOL,
            config.coindesk.poll_interval(),
            buffer.clone(),
            pool.clone(),
        );
        poller_lc.start_with_token(root.child_token(), move |cancel| async move {
            poller.run(cancel).await;
            Ok(())
        })?;
    }

    let state = Arc::new(StreamState::new(buffer, pool));
    let app = build_router(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "HTTP server bound");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = runtime::shutdown::wait_for_shutdown().await {
                tracing::error!(error = %e, "failed waiting for shutdown signal");
            }
            tracing::info!("shutdown requested");
            shutdown.cancel();
        });
    }

    let serve = std::future::IntoFuture::into_future(axum::serve(listener, app).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    }));
    tokio::pin!(serve);

    let grace = config.shutdown_timeout();
    tokio::select! {
        result = &mut serve => result?,
        _ = shutdown.cancelled() => {
            // stop producing, then give in-flight streams the grace period;
            // long-lived SSE connections are dropped once it runs out
            root.cancel();
            if tokio::time::timeout(grace, &mut serve).await.is_err() {
                tracing::warn!("graceful drain timed out; dropping open connections");
            }
        }
    }

    root.cancel();
    poller_lc.stop(grace).await;
    sweeper.stop(grace).await;

    tracing::info!("service stopped");
    Ok(())
}

fn build_router(state: Arc<StreamState>, config: &AppConfig) -> Router {
    // The streaming route must not sit under a request timeout; only the
    // health endpoints get one.
    let health = Router::new()
        .route("/v1/liveness", get(web::liveness))
        .route("/v1/readiness", get(web::readiness))
        .layer(TimeoutLayer::new(config.server.read_header_timeout()));

    Router::new()
        .merge(health)
        .merge(price_stream::api::rest::router(state))
        .layer(TraceLayer::new_for_http().make_span_with(request_id::make_span))
        .layer(SetRequestIdLayer::new(
            request_id::header(),
            request_id::MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id::header()))
}

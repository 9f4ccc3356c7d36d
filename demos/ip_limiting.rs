//! An axum server that limits an expensive route per client address.
//!
//! Run with `cargo run --example ip_limiting`, then:
//!
//! ```text
//! curl -i -X POST -H 'x-forwarded-for: 203.0.113.7' http://127.0.0.1:3000/strategy
//! ```

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use window_gate::{enforce_rate_limit, MemoryStore, RateLimiter, RateLimiterConfig, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ip_limiting=info,window_gate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => RateLimiterConfig::load(path)?,
        None => RateLimiterConfig::per_hour(3),
    };
    tracing::info!(
        max_requests = config.max_requests,
        window_ms = config.window_ms,
        "rate limit configured"
    );

    let limiter = Arc::new(RateLimiter::new(config)?);
    let _cleanup = limiter.clone().start_cleanup_thread()?;

    let limited = Router::new()
        .route("/strategy", post(generate))
        .layer(middleware::from_fn_with_state(
            limiter.clone(),
            enforce_rate_limit::<MemoryStore, SystemClock>,
        ));

    let metrics_limiter = limiter.clone();
    let app = Router::new()
        .route(
            "/metrics",
            get(move || async move { metrics_limiter.metrics().summary() }),
        )
        .merge(limited);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn generate() -> Json<serde_json::Value> {
    Json(json!({ "strategy": "ok" }))
}

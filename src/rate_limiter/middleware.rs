//! axum middleware enforcing a [`RateLimiter`] per client address.

use super::{
    client_ip::get_real_ip,
    core::RateLimitDecision,
    manager::RateLimiter,
    response::RateLimitExceeded,
    store::RateLimitStore,
    utils::Clock,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Checks the caller against `limiter` before running the inner service.
///
/// Rejected requests get `429 Too Many Requests` with the rate-limit headers,
/// `retry-after` and a JSON [`RateLimitExceeded`] body. Admitted requests run
/// normally and the rate-limit headers are added to whatever they return.
/// Rejections are logged by the limiter at debug level.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use axum::{middleware, routing::post, Router};
/// use window_gate::{enforce_rate_limit, MemoryStore, RateLimiter, SystemClock};
///
/// let limiter = Arc::new(RateLimiter::hourly(3));
/// limiter.clone().start_cleanup_thread().unwrap();
///
/// let app: Router = Router::new()
///     .route("/strategy", post(|| async { "ok" }))
///     .layer(middleware::from_fn_with_state(
///         limiter,
///         enforce_rate_limit::<MemoryStore, SystemClock>,
///     ));
/// ```
pub async fn enforce_rate_limit<S, C>(
    State(limiter): State<Arc<RateLimiter<S, C>>>,
    request: Request,
    next: Next,
) -> Response
where
    S: RateLimitStore + 'static,
    C: Clock + 'static,
{
    let client = get_real_ip(request.headers());
    let decision = limiter.check_rate_limit(&client);

    if !decision.allowed {
        return too_many_requests(&decision);
    }

    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}

/// The 429 response for a rejected decision.
pub fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitExceeded::from_decision(decision)),
    )
        .into_response();
    decision.apply_headers(response.headers_mut());
    response
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        (StatusCode::TOO_MANY_REQUESTS, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::{config::RateLimiterConfig, store::MemoryStore, utils::ManualClock};
    use axum::{body::Body, middleware, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;
    use tracing_subscriber::{layer::SubscriberExt, Layer};

    // Counts events at WARN or above.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() <= tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn app(limiter: Arc<RateLimiter<MemoryStore, ManualClock>>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(
                limiter,
                enforce_rate_limit::<MemoryStore, ManualClock>,
            ))
    }

    fn limiter(max_requests: u32) -> (Arc<RateLimiter<MemoryStore, ManualClock>>, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let limiter = RateLimiter::with_parts(
            RateLimiterConfig::per_hour(max_requests),
            MemoryStore::new(100),
            clock.clone(),
        )
        .unwrap();
        (Arc::new(limiter), clock)
    }

    fn request(ip: &str) -> Request {
        axum::http::Request::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_allowed_response_echoes_headers() {
        let (limiter, _clock) = limiter(3);
        let response = app(limiter).oneshot(request("203.0.113.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "3");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "2");
        assert!(response.headers().get("retry-after").is_none());
    }

    #[tokio::test]
    async fn test_rejected_response() {
        let (limiter, _clock) = limiter(1);
        let app = app(limiter);

        let first = app.clone().oneshot(request("203.0.113.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request("203.0.113.1")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()["x-ratelimit-remaining"], "0");
        assert_eq!(second.headers()["retry-after"], "3600");
        assert_eq!(
            second.headers()["x-ratelimit-reset"],
            (1_700_000_000_000u64 + 3_600_000).to_string().as_str()
        );

        let body = axum::body::to_bytes(second.into_body(), 4096).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Too many requests");
        assert_eq!(json["retryAfter"], 3600);
        assert!(json["message"].as_str().unwrap().contains("1 hour"));
    }

    #[tokio::test]
    async fn test_clients_are_isolated() {
        let (limiter, _clock) = limiter(1);
        let app = app(limiter.clone());

        app.clone().oneshot(request("203.0.113.1")).await.unwrap();
        let other = app.oneshot(request("203.0.113.2")).await.unwrap();

        assert_eq!(other.status(), StatusCode::OK);
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[tokio::test]
    async fn test_window_reopens() {
        let (limiter, clock) = limiter(1);
        let app = app(limiter);

        app.clone().oneshot(request("203.0.113.1")).await.unwrap();
        clock.advance_ms(3_600_001);
        let response = app.oneshot(request("203.0.113.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_headers_share_unknown_bucket() {
        let (limiter, _clock) = limiter(1);
        let app = app(limiter.clone());

        let bare = || axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        app.clone().oneshot(bare()).await.unwrap();
        let second = app.oneshot(bare()).await.unwrap();

        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(limiter.window("unknown").is_some());
    }

    #[tokio::test]
    async fn test_rejections_stay_below_warn() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let (limiter, _clock) = limiter(1);
        let app = app(limiter);
        for _ in 0..20 {
            app.clone().oneshot(request("203.0.113.1")).await.unwrap();
        }

        assert_eq!(warnings.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_exceeded_into_response() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 3,
            remaining: 0,
            reset_time_ms: 10,
            retry_after_ms: 5_000,
        };
        let response = RateLimitExceeded::from_decision(&decision).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}

//! HTTP API gateway for Tierwise.
//!
//! Exposes a health check plus the v1 diagnostic API on top of a shared
//! [`DiagnosticService`].
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use tierwise_config::GatewayConfig;
use tierwise_diagnostic::DiagnosticService;

/// Build the full router: `/health` plus the v1 API nested under `/v1`.
///
/// Layers applied:
/// - CORS for local front-ends
/// - Request body size limit (64 KB)
/// - Per-student rate limiting (`rate_limit_per_minute`, 0 disables)
/// - HTTP trace logging
pub fn build_router(api_state: api_v1::SharedApiState, rate_limit_per_minute: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let rate_limiter = Arc::new(RateLimiter::new(rate_limit_per_minute, Duration::from_secs(60)));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server and serve until the process exits.
pub async fn start(config: &GatewayConfig, service: Arc<DiagnosticService>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);

    let items = service.pool().len();
    let backend = service.repository_name().to_string();
    let api_state = Arc::new(api_v1::ApiV1State::new(service));
    let app = build_router(api_state, config.rate_limit_per_minute);

    info!(addr = %addr, items, backend = %backend, "Gateway starting with v1 API");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (student id or "anonymous").
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        if self.max_requests == 0 {
            return true;
        }

        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// The student id from `/v1/students/{id}/...`, if the path has one.
fn student_key(path: &str) -> Option<&str> {
    path.strip_prefix("/v1/students/")
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
}

/// Rate limiting middleware, keyed per student. Returns 429 when exceeded.
/// `/health` is exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = student_key(req.uri().path()).unwrap_or("anonymous").to_string();

    if !limiter.check(&client_key) {
        warn!(client = %client_key.chars().take(40).collect::<String>(), "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tierwise_bank::ItemPool;
    use tierwise_core::Item;
    use tierwise_store::InMemoryRepository;
    use tower::ServiceExt;

    fn test_state() -> api_v1::SharedApiState {
        let pool = ItemPool::from_items(vec![Item {
            id: "q1".into(),
            domain: "algebra".into(),
            a: 1.0,
            b: 0.0,
            c: 0.25,
            question: "2 + 2?".into(),
            options: vec!["3".into(), "4".into()],
            correct_option: 1,
            item_type: "multiple_choice".into(),
        }])
        .unwrap();
        let service = DiagnosticService::new(Arc::new(InMemoryRepository::new()), Arc::new(pool));
        Arc::new(api_v1::ApiV1State::new(Arc::new(service)))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(), 0);
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn v1_is_nested() {
        let app = build_router(test_state(), 0);
        let response = app.oneshot(get("/v1/students/stu-1/diagnostic/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rate_limit_is_per_student() {
        let app = build_router(test_state(), 2);

        for _ in 0..2 {
            let response = app.clone().oneshot(get("/v1/students/a/diagnostic/status")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.clone().oneshot(get("/v1/students/a/diagnostic/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let response = app.clone().oneshot(get("/v1/students/b/diagnostic/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn zero_rate_limit_disables_limiting() {
        let app = build_router(test_state(), 0);
        for _ in 0..5 {
            let response = app.clone().oneshot(get("/v1/students/a/diagnostic/status")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[test]
    fn student_key_extraction() {
        assert_eq!(student_key("/v1/students/stu-9/diagnostic/start"), Some("stu-9"));
        assert_eq!(student_key("/v1/bank"), None);
        assert_eq!(student_key("/v1/students//x"), None);
    }
}

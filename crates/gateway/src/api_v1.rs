//! HTTP API v1: student-facing diagnostic endpoints.
//!
//! Endpoints:
//!
//! - `POST   /v1/students/{id}/diagnostic/start`: Start or resume a diagnostic
//! - `POST   /v1/students/{id}/diagnostic/respond`: Answer the current item
//! - `GET    /v1/students/{id}/diagnostic/status`: Where the student stands
//! - `GET    /v1/students/{id}/diagnostic/result`: Final classification
//! - `GET    /v1/students/{id}/diagnostic/responses`: Recorded answers, released with the result
//! - `DELETE /v1/students/{id}/diagnostic/session`: Discard an in-progress session
//! - `GET    /v1/bank`: Item pool summary

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response as HttpResponse},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use tierwise_core::{DiagnosticError, DiagnosticResult, Domain, Response};
use tierwise_diagnostic::{DiagnosticService, RespondOutcome, SessionView, StatusSnapshot};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub service: Arc<DiagnosticService>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl ApiV1State {
    pub fn new(service: Arc<DiagnosticService>) -> Self {
        Self {
            service,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/students/{student_id}/diagnostic/start", post(start_handler))
        .route("/students/{student_id}/diagnostic/respond", post(respond_handler))
        .route("/students/{student_id}/diagnostic/status", get(status_handler))
        .route("/students/{student_id}/diagnostic/result", get(result_handler))
        .route("/students/{student_id}/diagnostic/responses", get(responses_handler))
        .route("/students/{student_id}/diagnostic/session", delete(reset_handler))
        .route("/bank", get(bank_handler))
        .with_state(state)
}

// ── Errors ────────────────────────────────────────────────────────────────

/// JSON error body: `{"code": "...", "message": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// A [`DiagnosticError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub DiagnosticError);

impl From<DiagnosticError> for ApiError {
    fn from(err: DiagnosticError) -> Self {
        Self(err)
    }
}

/// HTTP status for each orchestrator error.
pub fn status_for(err: &DiagnosticError) -> StatusCode {
    match err {
        DiagnosticError::AlreadyCompleted { .. }
        | DiagnosticError::ItemMismatch { .. }
        | DiagnosticError::Conflict { .. } => StatusCode::CONFLICT,
        DiagnosticError::NoActiveSession { .. } | DiagnosticError::ResultNotFound { .. } => StatusCode::NOT_FOUND,
        DiagnosticError::InvalidOption { .. } => StatusCode::BAD_REQUEST,
        DiagnosticError::EmptyItemPool => StatusCode::SERVICE_UNAVAILABLE,
        DiagnosticError::ItemNotFound(_) | DiagnosticError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> HttpResponse {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(error = %self.0, code = self.0.code(), "Diagnostic request failed");
        }
        let body = ErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Diagnostic ────────────────────────────────────────────────────────────

async fn start_handler(
    State(state): State<SharedApiState>,
    Path(student_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let view = state.service.start(&student_id).await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondRequest {
    pub item_id: String,
    pub selected_option: usize,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

async fn respond_handler(
    State(state): State<SharedApiState>,
    Path(student_id): Path<String>,
    Json(payload): Json<RespondRequest>,
) -> Result<Json<RespondOutcome>, ApiError> {
    let outcome = state
        .service
        .respond(
            &student_id,
            &payload.item_id,
            payload.selected_option,
            payload.response_time_ms,
        )
        .await?;
    Ok(Json(outcome))
}

async fn status_handler(
    State(state): State<SharedApiState>,
    Path(student_id): Path<String>,
) -> Result<Json<StatusSnapshot>, ApiError> {
    Ok(Json(state.service.status(&student_id).await?))
}

async fn result_handler(
    State(state): State<SharedApiState>,
    Path(student_id): Path<String>,
) -> Result<Json<DiagnosticResult>, ApiError> {
    Ok(Json(state.service.result(&student_id).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseListResponse {
    pub responses: Vec<Response>,
    pub count: usize,
}

async fn responses_handler(
    State(state): State<SharedApiState>,
    Path(student_id): Path<String>,
) -> Result<Json<ResponseListResponse>, ApiError> {
    let responses = state.service.responses(&student_id).await?;
    let count = responses.len();
    Ok(Json(ResponseListResponse { responses, count }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub removed: bool,
}

async fn reset_handler(
    State(state): State<SharedApiState>,
    Path(student_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let removed = state.service.reset(&student_id).await?;
    if removed {
        info!(student_id = %student_id, "Session reset via API");
    }
    Ok(Json(ResetResponse { removed }))
}

// ── Bank ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct BankSummary {
    pub items: usize,
    pub domains: BTreeMap<Domain, usize>,
    pub total_items: usize,
    pub uptime_secs: i64,
}

async fn bank_handler(State(state): State<SharedApiState>) -> Json<BankSummary> {
    let pool = state.service.pool();
    Json(BankSummary {
        items: pool.len(),
        domains: pool.domain_counts(),
        total_items: state.service.total_items(),
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tierwise_bank::ItemPool;
    use tierwise_core::{Item, Level, StoreError};
    use tierwise_store::InMemoryRepository;
    use tower::ServiceExt;

    fn item(id: &str, domain: &str, b: f64) -> Item {
        Item {
            id: id.into(),
            domain: domain.into(),
            a: 1.2,
            b,
            c: 0.2,
            question: format!("Question {id}"),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_option: 0,
            item_type: "multiple_choice".into(),
        }
    }

    fn test_api_state() -> SharedApiState {
        let mut items = Vec::new();
        for domain in ["algebra", "geometry"] {
            for (i, b) in [-1.5, -0.5, 0.5, 1.5].into_iter().enumerate() {
                items.push(item(&format!("{domain}-{i}"), domain, b));
            }
        }
        let pool = ItemPool::from_items(items).unwrap();
        let service = DiagnosticService::new(Arc::new(InMemoryRepository::new()), Arc::new(pool)).with_total_items(3);
        Arc::new(ApiV1State::new(Arc::new(service)))
    }

    async fn send(state: &SharedApiState, method: &str, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = v1_router(state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn start(state: &SharedApiState, student: &str) -> SessionView {
        let (status, body) = send(state, "POST", &format!("/students/{student}/diagnostic/start"), None).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    async fn respond(state: &SharedApiState, student: &str, item_id: &str, option: usize) -> (StatusCode, Vec<u8>) {
        let body = serde_json::json!({ "item_id": item_id, "selected_option": option });
        send(state, "POST", &format!("/students/{student}/diagnostic/respond"), Some(body)).await
    }

    fn error_code(body: &[u8]) -> String {
        serde_json::from_slice::<ErrorBody>(body).unwrap().code
    }

    #[tokio::test]
    async fn start_hides_item_parameters() {
        let state = test_api_state();
        let (status, body) = send(&state, "POST", "/students/stu-1/diagnostic/start", None).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let item = &json["current_item"];
        assert!(item["id"].is_string());
        assert_eq!(item["options"].as_array().unwrap().len(), 3);
        for hidden in ["a", "b", "c", "correct_option"] {
            assert!(item.get(hidden).is_none(), "{hidden} leaked");
        }
        assert_eq!(json["total_items"], 3);
    }

    #[tokio::test]
    async fn full_run_over_http() {
        let state = test_api_state();
        let mut current = start(&state, "stu-1").await.current_item.id;

        let result = loop {
            let (status, body) = respond(&state, "stu-1", &current, 0).await;
            assert_eq!(status, StatusCode::OK);
            match serde_json::from_slice::<RespondOutcome>(&body).unwrap() {
                RespondOutcome::InProgress(view) => current = view.current_item.id,
                RespondOutcome::Completed(result) => break result,
            }
        };
        assert_eq!(result.items_administered, 3);
        assert_eq!(result.overall_level, Level::Advanced);

        let (status, body) = send(&state, "GET", "/students/stu-1/diagnostic/result", None).await;
        assert_eq!(status, StatusCode::OK);
        let stored: DiagnosticResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(stored.session_id, result.session_id);

        let (_, body) = send(&state, "GET", "/students/stu-1/diagnostic/status", None).await;
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "completed");

        let (_, body) = send(&state, "GET", "/students/stu-1/diagnostic/responses", None).await;
        let list: ResponseListResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.count, 3);
    }

    #[tokio::test]
    async fn status_of_unknown_student() {
        let state = test_api_state();
        let (status, body) = send(&state, "GET", "/students/nobody/diagnostic/status", None).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "not_started");
    }

    #[tokio::test]
    async fn respond_to_wrong_item_is_conflict() {
        let state = test_api_state();
        let view = start(&state, "stu-1").await;
        let wrong = if view.current_item.id == "algebra-0" { "algebra-1" } else { "algebra-0" };

        let (status, body) = respond(&state, "stu-1", wrong, 0).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), "item_mismatch");
    }

    #[tokio::test]
    async fn respond_without_session_is_not_found() {
        let state = test_api_state();
        let (status, body) = respond(&state, "stu-1", "algebra-0", 0).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), "no_active_session");
    }

    #[tokio::test]
    async fn invalid_option_is_bad_request() {
        let state = test_api_state();
        let view = start(&state, "stu-1").await;
        let (status, body) = respond(&state, "stu-1", &view.current_item.id, 7).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "invalid_option");
    }

    #[tokio::test]
    async fn result_before_completion_is_not_found() {
        let state = test_api_state();
        start(&state, "stu-1").await;
        let (status, body) = send(&state, "GET", "/students/stu-1/diagnostic/result", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), "result_not_found");
    }

    #[tokio::test]
    async fn responses_hidden_while_in_progress() {
        let state = test_api_state();
        let view = start(&state, "stu-1").await;
        let (status, _) = respond(&state, "stu-1", &view.current_item.id, 1).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, "GET", "/students/stu-1/diagnostic/responses", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), "result_not_found");
        assert!(!String::from_utf8_lossy(&body).contains("is_correct"));
    }

    #[tokio::test]
    async fn restart_after_completion_is_conflict() {
        let state = test_api_state();
        let mut current = start(&state, "stu-1").await.current_item.id;
        for _ in 0..3 {
            let (_, body) = respond(&state, "stu-1", &current, 1).await;
            if let RespondOutcome::InProgress(view) = serde_json::from_slice(&body).unwrap() {
                current = view.current_item.id;
            }
        }
        let (status, body) = send(&state, "POST", "/students/stu-1/diagnostic/start", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&body), "already_completed");
    }

    #[tokio::test]
    async fn delete_session_reports_removal() {
        let state = test_api_state();
        start(&state, "stu-1").await;

        let (status, body) = send(&state, "DELETE", "/students/stu-1/diagnostic/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(serde_json::from_slice::<ResetResponse>(&body).unwrap().removed);

        let (_, body) = send(&state, "DELETE", "/students/stu-1/diagnostic/session", None).await;
        assert!(!serde_json::from_slice::<ResetResponse>(&body).unwrap().removed);
    }

    #[tokio::test]
    async fn bank_summary_counts_domains() {
        let state = test_api_state();
        let (status, body) = send(&state, "GET", "/bank", None).await;
        assert_eq!(status, StatusCode::OK);
        let summary: BankSummary = serde_json::from_slice(&body).unwrap();
        assert_eq!(summary.items, 8);
        assert_eq!(summary.domains.len(), 2);
        assert_eq!(summary.domains[&Domain::new("geometry")], 4);
    }

    #[test]
    fn error_statuses() {
        let cases = [
            (DiagnosticError::EmptyItemPool, StatusCode::SERVICE_UNAVAILABLE),
            (DiagnosticError::ItemNotFound("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                DiagnosticError::Conflict {
                    student_id: "s".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                DiagnosticError::Store(StoreError::Storage("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }
}

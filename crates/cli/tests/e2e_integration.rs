//! End-to-end integration tests for the Tierwise diagnostic pipeline.
//!
//! These tests exercise the full path from item bank file to placement
//! result: bank loading, adaptive selection, estimation, persistence across
//! restarts, and the HTTP gateway.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use tierwise_bank::{ItemPool, JsonItemBank};
use tierwise_config::AppConfig;
use tierwise_core::{DiagnosticError, DiagnosticRepository, DiagnosticResult, Domain, Level, SessionStatus};
use tierwise_diagnostic::{DiagnosticService, RespondOutcome, StatusSnapshot};
use tierwise_gateway::api_v1::{ApiV1State, RespondRequest};
use tierwise_store::{InMemoryRepository, SqliteRepository};

// ── Fixtures ─────────────────────────────────────────────────────────────

fn sample_bank_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/sample_item_bank.json")
}

fn sample_pool() -> Arc<ItemPool> {
    Arc::new(ItemPool::load(&JsonItemBank::new(sample_bank_path())).unwrap())
}

fn memory_service() -> DiagnosticService {
    DiagnosticService::new(Arc::new(InMemoryRepository::new()), sample_pool())
}

fn option_for(service: &DiagnosticService, item_id: &str, correct: bool) -> usize {
    let item = service.pool().get(item_id).unwrap();
    if correct {
        item.correct_option
    } else {
        (item.correct_option + 1) % item.options.len()
    }
}

/// Answer `count` items (or until completion), returning the current item id
/// or the result.
async fn answer(
    service: &DiagnosticService,
    student: &str,
    mut current: String,
    count: usize,
    correct: bool,
) -> Result<String, DiagnosticResult> {
    for _ in 0..count {
        let selected = option_for(service, &current, correct);
        match service.respond(student, &current, selected, Some(1_500)).await.unwrap() {
            RespondOutcome::InProgress(view) => current = view.current_item.id,
            RespondOutcome::Completed(result) => return Err(result),
        }
    }
    Ok(current)
}

async fn complete(service: &DiagnosticService, student: &str, correct: bool) -> DiagnosticResult {
    let first = service.start(student).await.unwrap().current_item.id;
    match answer(service, student, first, usize::MAX, correct).await {
        Err(result) => result,
        Ok(_) => unreachable!("diagnostic never completed"),
    }
}

// ── Item bank ────────────────────────────────────────────────────────────

#[test]
fn sample_bank_has_four_balanced_domains() {
    let pool = sample_pool();
    assert_eq!(pool.len(), 40);
    let counts = pool.domain_counts();
    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|&n| n == 10));
}

// ── Full diagnostic ──────────────────────────────────────────────────────

#[tokio::test]
async fn all_correct_student_places_advanced_everywhere() {
    let service = memory_service();
    let result = complete(&service, "stu-strong", true).await;

    assert_eq!(result.items_administered, 25);
    assert_eq!(result.overall_level, Level::Advanced);

    let domains: BTreeSet<Domain> = result.domain_levels.keys().cloned().collect();
    let expected: BTreeSet<Domain> = service.pool().domain_counts().into_keys().collect();
    assert_eq!(domains, expected);
    assert!(result.domain_levels.values().all(|l| *l == Level::Advanced));

    let responses = service.responses("stu-strong").await.unwrap();
    assert_eq!(responses.len(), 25);
    let distinct: BTreeSet<_> = responses.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(distinct.len(), 25);
    assert_eq!(responses.last().unwrap().theta_after, result.theta_final);
    assert!(responses.iter().all(|r| r.response_time_ms == Some(1_500)));
}

#[tokio::test]
async fn all_incorrect_student_places_foundation() {
    let service = memory_service();
    let result = complete(&service, "stu-weak", false).await;
    assert_eq!(result.overall_level, Level::Foundation);
    assert!(result.domain_levels.values().all(|l| *l == Level::Foundation));
}

#[tokio::test]
async fn many_students_run_concurrently() {
    let service = Arc::new(memory_service());
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let service = service.clone();
            tokio::spawn(async move { complete(&service, &format!("stu-{n}"), n % 2 == 0).await })
        })
        .collect();

    let mut sessions = BTreeSet::new();
    for (n, handle) in handles.into_iter().enumerate() {
        let result = handle.await.unwrap();
        let expected = if n % 2 == 0 { Level::Advanced } else { Level::Foundation };
        assert_eq!(result.overall_level, expected);
        sessions.insert(result.session_id);
    }
    assert_eq!(sessions.len(), 8);
}

#[tokio::test]
async fn config_controls_budget() {
    let config: AppConfig = toml::from_str("[engine]\ntotal_items = 8\n").unwrap();
    config.validate().unwrap();
    let service = DiagnosticService::from_config(Arc::new(InMemoryRepository::new()), sample_pool(), &config.engine);
    let result = complete(&service, "stu-1", true).await;
    assert_eq!(result.items_administered, 8);
}

// ── Persistence ──────────────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("tierwise.db").display());

    // First process: answer three items, then go away
    let (session_id, current) = {
        let repo = Arc::new(SqliteRepository::new(&url).await.unwrap());
        let service = DiagnosticService::new(repo, sample_pool());
        let view = service.start("stu-1").await.unwrap();
        let current = answer(&service, "stu-1", view.current_item.id, 3, true).await.unwrap();
        (view.session_id, current)
    };

    // Second process: resume exactly where the first left off
    let repo = Arc::new(SqliteRepository::new(&url).await.unwrap());
    let service = DiagnosticService::new(repo.clone(), sample_pool());
    let resumed = service.start("stu-1").await.unwrap();
    assert_eq!(resumed.session_id, session_id);
    assert_eq!(resumed.items_administered, 3);
    assert_eq!(resumed.current_item.id, current);

    let result = match answer(&service, "stu-1", current, usize::MAX, true).await {
        Err(result) => result,
        Ok(_) => unreachable!("diagnostic never completed"),
    };
    assert_eq!(result.items_administered, 25);

    let session = repo.get_session("stu-1").await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);

    // Third process: the result is final
    let repo = Arc::new(SqliteRepository::new(&url).await.unwrap());
    let service = DiagnosticService::new(repo, sample_pool());
    assert_eq!(service.result("stu-1").await.unwrap(), result);
    assert!(matches!(
        service.start("stu-1").await,
        Err(DiagnosticError::AlreadyCompleted { .. })
    ));
    assert!(matches!(service.status("stu-1").await.unwrap(), StatusSnapshot::Completed(_)));
}

// ── HTTP gateway ─────────────────────────────────────────────────────────

async fn call(app: &axum::Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn http_diagnostic_round_trip() {
    let service = Arc::new(memory_service().with_total_items(6));
    let app = tierwise_gateway::build_router(Arc::new(ApiV1State::new(service.clone())), 0);

    let (status, health) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");

    let (status, started) = call(&app, "POST", "/v1/students/web-1/diagnostic/start", None).await;
    assert_eq!(status, StatusCode::OK);
    let mut current = started["current_item"]["id"].as_str().unwrap().to_string();

    let final_body = loop {
        let request = RespondRequest {
            item_id: current.clone(),
            selected_option: option_for(&service, &current, true),
            response_time_ms: None,
        };
        let (status, body) = call(
            &app,
            "POST",
            "/v1/students/web-1/diagnostic/respond",
            Some(serde_json::to_string(&request).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" {
            break body;
        }
        current = body["current_item"]["id"].as_str().unwrap().to_string();
    };
    assert_eq!(final_body["overall_level"], "advanced");
    assert_eq!(final_body["items_administered"], 6);

    let (status, result) = call(&app, "GET", "/v1/students/web-1/diagnostic/result", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["session_id"], final_body["session_id"]);

    let (status, err) = call(&app, "POST", "/v1/students/web-1/diagnostic/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["code"], "already_completed");
}

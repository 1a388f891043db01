//! `DiagnosticService` drives a student from the first item to a result.

use crate::locks::StudentLocks;
use crate::settings::engine_settings;
use crate::view::{RespondOutcome, SessionView, StatusSnapshot};
use chrono::Utc;
use std::sync::Arc;
use tierwise_bank::ItemPool;
use tierwise_config::EngineConfig;
use tierwise_core::{
    DiagnosticError, DiagnosticEvent, DiagnosticRepository, DiagnosticResult, EventBus, Response, Session,
    SessionStatus, StoreError,
};
use tierwise_engine::{
    EngineSettings, Observation, compute_domain_levels, compute_domain_scores, estimate_theta_with,
    select_next_item, standard_error,
};
use tracing::{debug, info, warn};

/// Default number of items administered per session.
pub const DEFAULT_TOTAL_ITEMS: usize = 25;

/// The session orchestrator.
///
/// Holds the loaded item pool and a repository handle; all engine math is
/// delegated to `tierwise-engine`.
pub struct DiagnosticService {
    repository: Arc<dyn DiagnosticRepository>,
    pool: Arc<ItemPool>,
    settings: EngineSettings,
    total_items: usize,
    locks: StudentLocks,
    event_bus: Arc<EventBus>,
}

impl DiagnosticService {
    pub fn new(repository: Arc<dyn DiagnosticRepository>, pool: Arc<ItemPool>) -> Self {
        Self {
            repository,
            pool,
            settings: EngineSettings::default(),
            total_items: DEFAULT_TOTAL_ITEMS,
            locks: StudentLocks::new(),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Build a service with engine constants and the item budget taken from config.
    pub fn from_config(repository: Arc<dyn DiagnosticRepository>, pool: Arc<ItemPool>, config: &EngineConfig) -> Self {
        Self::new(repository, pool)
            .with_settings(engine_settings(config))
            .with_total_items(config.total_items)
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_total_items(mut self, total_items: usize) -> Self {
        self.total_items = total_items.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn pool(&self) -> &ItemPool {
        &self.pool
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn repository_name(&self) -> &str {
        self.repository.name()
    }

    /// Start (or resume) a diagnostic.
    ///
    /// A student with an in-progress session gets that session back unchanged;
    /// a student with a result is rejected.
    pub async fn start(&self, student_id: &str) -> Result<SessionView, DiagnosticError> {
        let _guard = self.locks.acquire(student_id).await;

        if self.repository.get_result(student_id).await?.is_some() {
            return Err(already_completed(student_id));
        }

        if let Some(session) = self.repository.get_session(student_id).await? {
            if session.is_in_progress() {
                debug!(student_id, session_id = %session.id, "Resuming diagnostic session");
                return self.session_view(&session);
            }
            // Completed session whose result write never landed
            warn!(student_id, session_id = %session.id, "Completed session without result, finalizing");
            let result = self.build_result(&session).await?;
            self.persist_result(&result).await?;
            return Err(already_completed(student_id));
        }

        let first = select_next_item(0.0, self.pool.items(), &[]).ok_or(DiagnosticError::EmptyItemPool)?;
        let session = Session::new(student_id, self.total_items, first.id.as_str());
        self.repository
            .create_session(&session)
            .await
            .map_err(|e| store_error(student_id, e))?;

        info!(
            student_id,
            session_id = %session.id,
            first_item = %first.id,
            total_items = session.total_items,
            "Diagnostic session started"
        );
        self.event_bus.publish(DiagnosticEvent::SessionStarted {
            student_id: student_id.to_string(),
            session_id: session.id.clone(),
            first_item_id: first.id.clone(),
            timestamp: Utc::now(),
        });

        Ok(SessionView {
            session_id: session.id,
            total_items: session.total_items,
            items_administered: 0,
            current_item: first.view(),
        })
    }

    /// Record an answer to the current item and advance the session.
    ///
    /// Every rejection happens before anything is written.
    pub async fn respond(
        &self,
        student_id: &str,
        item_id: &str,
        selected_option: usize,
        response_time_ms: Option<u64>,
    ) -> Result<RespondOutcome, DiagnosticError> {
        let _guard = self.locks.acquire(student_id).await;

        if self.repository.get_result(student_id).await?.is_some() {
            return Err(already_completed(student_id));
        }
        let mut session = self
            .repository
            .get_session(student_id)
            .await?
            .filter(Session::is_in_progress)
            .ok_or_else(|| DiagnosticError::NoActiveSession {
                student_id: student_id.to_string(),
            })?;

        let expected = session.current_item_id.clone().unwrap_or_default();
        if expected != item_id {
            warn!(student_id, expected = %expected, received = item_id, "Response for a non-current item");
            return Err(DiagnosticError::ItemMismatch {
                expected,
                received: item_id.to_string(),
            });
        }

        let item = self
            .pool
            .get(item_id)
            .ok_or_else(|| DiagnosticError::ItemNotFound(item_id.to_string()))?;
        if selected_option >= item.options.len() {
            return Err(DiagnosticError::InvalidOption {
                item_id: item_id.to_string(),
                selected: selected_option,
                options: item.options.len(),
            });
        }
        let is_correct = item.is_correct(selected_option);

        let history = self.repository.list_responses(&session.id).await?;
        let mut observations = self.observations(&history)?;
        observations.push(Observation::new(item, is_correct));
        let theta = estimate_theta_with(&observations, session.theta_estimate, &self.settings.estimation);

        session.theta_estimate = theta;
        session.mark_administered(item_id);

        let next = if session.budget_exhausted() {
            None
        } else {
            select_next_item(theta, self.pool.items(), &session.administered_item_ids)
        };
        session.current_item_id = next.map(|n| n.id.clone());
        if next.is_none() {
            session.status = SessionStatus::Completed;
        }
        session.updated_at = Utc::now();

        let response = Response {
            session_id: session.id.clone(),
            item_id: item_id.to_string(),
            selected_option,
            is_correct,
            theta_after: theta,
            response_time_ms,
            answered_at: session.updated_at,
        };
        session.version = self
            .repository
            .record_response(&session, &response)
            .await
            .map_err(|e| store_error(student_id, e))?;

        debug!(
            student_id,
            item_id,
            is_correct,
            theta,
            administered = session.items_administered,
            "Response recorded"
        );
        self.event_bus.publish(DiagnosticEvent::ResponseRecorded {
            student_id: student_id.to_string(),
            session_id: session.id.clone(),
            item_id: item_id.to_string(),
            is_correct,
            theta_after: theta,
            items_administered: session.items_administered,
            timestamp: response.answered_at,
        });

        match next {
            Some(next_item) => Ok(RespondOutcome::InProgress(SessionView {
                session_id: session.id,
                total_items: session.total_items,
                items_administered: session.items_administered,
                current_item: next_item.view(),
            })),
            None => {
                let result = self.score(&session, &observations);
                self.persist_result(&result).await?;
                Ok(RespondOutcome::Completed(result))
            }
        }
    }

    /// Read-only view of where a student stands.
    pub async fn status(&self, student_id: &str) -> Result<StatusSnapshot, DiagnosticError> {
        if let Some(result) = self.repository.get_result(student_id).await? {
            return Ok(StatusSnapshot::Completed(result));
        }
        match self.repository.get_session(student_id).await? {
            Some(session) if session.is_in_progress() => Ok(StatusSnapshot::InProgress(self.session_view(&session)?)),
            Some(session) => Ok(StatusSnapshot::Completed(self.build_result(&session).await?)),
            None => Ok(StatusSnapshot::NotStarted),
        }
    }

    /// The stored result, if the diagnostic has completed.
    pub async fn result(&self, student_id: &str) -> Result<DiagnosticResult, DiagnosticError> {
        self.repository
            .get_result(student_id)
            .await?
            .ok_or_else(|| DiagnosticError::ResultNotFound {
                student_id: student_id.to_string(),
            })
    }

    /// Response history of the completed diagnostic, oldest first.
    ///
    /// Answers are released together with the result, so an in-progress
    /// session reports [`DiagnosticError::ResultNotFound`].
    pub async fn responses(&self, student_id: &str) -> Result<Vec<Response>, DiagnosticError> {
        let result = self.result(student_id).await?;
        Ok(self.repository.list_responses(&result.session_id).await?)
    }

    /// Discard an in-progress session. Completed diagnostics are untouched.
    pub async fn reset(&self, student_id: &str) -> Result<bool, DiagnosticError> {
        let _guard = self.locks.acquire(student_id).await;

        let removed = self.repository.delete_session(student_id).await?;
        if removed {
            info!(student_id, "In-progress session discarded");
            self.event_bus.publish(DiagnosticEvent::SessionReset {
                student_id: student_id.to_string(),
                timestamp: Utc::now(),
            });
        }
        Ok(removed)
    }

    fn session_view(&self, session: &Session) -> Result<SessionView, DiagnosticError> {
        let current_id = session.current_item_id.as_deref().unwrap_or_default();
        let item = self
            .pool
            .get(current_id)
            .ok_or_else(|| DiagnosticError::ItemNotFound(current_id.to_string()))?;
        Ok(SessionView {
            session_id: session.id.clone(),
            total_items: session.total_items,
            items_administered: session.items_administered,
            current_item: item.view(),
        })
    }

    fn observations<'a>(&'a self, history: &[Response]) -> Result<Vec<Observation<'a>>, DiagnosticError> {
        history
            .iter()
            .map(|r| {
                self.pool
                    .get(&r.item_id)
                    .map(|item| Observation::new(item, r.is_correct))
                    .ok_or_else(|| DiagnosticError::ItemNotFound(r.item_id.clone()))
            })
            .collect()
    }

    async fn build_result(&self, session: &Session) -> Result<DiagnosticResult, DiagnosticError> {
        let history = self.repository.list_responses(&session.id).await?;
        let observations = self.observations(&history)?;
        Ok(self.score(session, &observations))
    }

    fn score(&self, session: &Session, observations: &[Observation<'_>]) -> DiagnosticResult {
        let theta = session.theta_estimate;
        let domain_scores = compute_domain_scores(observations, &self.settings.estimation);
        let domain_levels = compute_domain_levels(&domain_scores, &self.settings.thresholds);

        DiagnosticResult {
            student_id: session.student_id.clone(),
            session_id: session.id.clone(),
            overall_level: self.settings.thresholds.classify(theta),
            theta_final: theta,
            standard_error: standard_error(theta, observations.iter().map(|o| o.item)),
            items_administered: session.items_administered,
            domain_levels,
            domain_scores,
            completed_at: session.updated_at,
        }
    }

    async fn persist_result(&self, result: &DiagnosticResult) -> Result<(), DiagnosticError> {
        match self.repository.create_result(result).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => return Err(already_completed(&result.student_id)),
            Err(e) => return Err(e.into()),
        }

        info!(
            student_id = %result.student_id,
            session_id = %result.session_id,
            level = %result.overall_level,
            theta = result.theta_final,
            items = result.items_administered,
            "Diagnostic completed"
        );
        self.event_bus.publish(DiagnosticEvent::SessionCompleted {
            student_id: result.student_id.clone(),
            session_id: result.session_id.clone(),
            overall_level: result.overall_level,
            theta_final: result.theta_final,
            timestamp: result.completed_at,
        });
        Ok(())
    }
}

fn already_completed(student_id: &str) -> DiagnosticError {
    DiagnosticError::AlreadyCompleted {
        student_id: student_id.to_string(),
    }
}

/// Lost version checks and unique-index violations both mean another writer
/// got to this student first.
fn store_error(student_id: &str, err: StoreError) -> DiagnosticError {
    match err {
        StoreError::Conflict { .. } | StoreError::Duplicate(_) => DiagnosticError::Conflict {
            student_id: student_id.to_string(),
        },
        other => DiagnosticError::Store(other),
    }
}

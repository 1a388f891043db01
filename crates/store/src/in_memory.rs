//! In-memory repository: useful for testing, simulations, and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tierwise_core::error::StoreError;
use tierwise_core::repository::DiagnosticRepository;
use tierwise_core::session::{DiagnosticResult, Response, Session};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    /// In creation order
    sessions: Vec<Session>,
    responses: HashMap<String, Vec<Response>>,
    results: HashMap<String, DiagnosticResult>,
}

impl State {
    /// Replace the stored session if its version still matches.
    fn swap_session(&mut self, session: &Session) -> Result<u64, StoreError> {
        let stored = self
            .sessions
            .iter_mut()
            .find(|s| s.id == session.id)
            .ok_or_else(|| StoreError::QueryFailed(format!("session {} not found", session.id)))?;

        if stored.version != session.version {
            return Err(StoreError::Conflict {
                session_id: session.id.clone(),
                expected_version: session.version,
            });
        }

        let new_version = session.version + 1;
        *stored = Session {
            version: new_version,
            updated_at: Utc::now(),
            ..session.clone()
        };
        Ok(new_version)
    }
}

/// A repository that keeps everything behind one `RwLock`.
///
/// Writes take the write lock, so the version check in `save_session`, the
/// session-plus-response write in `record_response` and the uniqueness checks
/// in the `create_*` methods are atomic.
pub struct InMemoryRepository {
    state: Arc<RwLock<State>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiagnosticRepository for InMemoryRepository {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_session(&self, student_id: &str) -> Result<Option<Session>, StoreError> {
        let state = self.state.read().await;
        let mut latest = None;
        for session in state.sessions.iter().filter(|s| s.student_id == student_id) {
            if session.is_in_progress() {
                return Ok(Some(session.clone()));
            }
            latest = Some(session);
        }
        Ok(latest.cloned())
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.sessions.iter().any(|s| s.id == session.id) {
            return Err(StoreError::Duplicate(format!("session {}", session.id)));
        }
        if state
            .sessions
            .iter()
            .any(|s| s.student_id == session.student_id && s.is_in_progress())
        {
            return Err(StoreError::Duplicate(format!(
                "in-progress session for student {}",
                session.student_id
            )));
        }
        state.sessions.push(session.clone());
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        state.swap_session(session)
    }

    async fn record_response(&self, session: &Session, response: &Response) -> Result<u64, StoreError> {
        if response.session_id != session.id {
            return Err(StoreError::QueryFailed(format!(
                "response belongs to session {}, not {}",
                response.session_id, session.id
            )));
        }
        let mut state = self.state.write().await;
        let new_version = state.swap_session(session)?;
        state
            .responses
            .entry(session.id.clone())
            .or_default()
            .push(response.clone());
        Ok(new_version)
    }

    async fn list_responses(&self, session_id: &str) -> Result<Vec<Response>, StoreError> {
        let state = self.state.read().await;
        Ok(state.responses.get(session_id).cloned().unwrap_or_default())
    }

    async fn get_result(&self, student_id: &str) -> Result<Option<DiagnosticResult>, StoreError> {
        Ok(self.state.read().await.results.get(student_id).cloned())
    }

    async fn create_result(&self, result: &DiagnosticResult) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.results.contains_key(&result.student_id) {
            return Err(StoreError::Duplicate(format!("result for student {}", result.student_id)));
        }
        state.results.insert(result.student_id.clone(), result.clone());
        Ok(())
    }

    async fn delete_session(&self, student_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(position) = state
            .sessions
            .iter()
            .position(|s| s.student_id == student_id && s.is_in_progress())
        else {
            return Ok(false);
        };
        let removed = state.sessions.remove(position);
        state.responses.remove(&removed.id);
        Ok(true)
    }
}

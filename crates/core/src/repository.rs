//! Repository trait: persistence for sessions, responses, and results.
//!
//! The orchestrator performs a read-modify-write per response, so every
//! implementation must make concurrent writers for the same student safe:
//! - `create_session` rejects a second in-progress session for a student
//! - `save_session` is an optimistic compare-and-swap on [`Session::version`]
//! - `record_response` applies that same compare-and-swap and appends the
//!   response as one atomic write
//! - `create_result` rejects a second result for a student

use async_trait::async_trait;
use crate::error::StoreError;
use crate::session::{DiagnosticResult, Response, Session};

/// The core DiagnosticRepository trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
#[async_trait]
pub trait DiagnosticRepository: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// The student's in-progress session if there is one, otherwise their
    /// most recent session.
    async fn get_session(&self, student_id: &str) -> Result<Option<Session>, StoreError>;

    /// Insert a new session. Fails with [`StoreError::Duplicate`] if the
    /// student already has one in progress.
    async fn create_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Persist `session` if the stored version still equals `session.version`.
    ///
    /// Returns the new version. A stale version fails with [`StoreError::Conflict`].
    async fn save_session(&self, session: &Session) -> Result<u64, StoreError>;

    /// Persist the advanced `session` and append `response` to its history
    /// atomically: either both land or neither does.
    ///
    /// Uses the same version check as [`save_session`](Self::save_session)
    /// and returns the new version.
    async fn record_response(&self, session: &Session, response: &Response) -> Result<u64, StoreError>;

    /// All responses of a session, in the order they were recorded.
    async fn list_responses(&self, session_id: &str) -> Result<Vec<Response>, StoreError>;

    async fn get_result(&self, student_id: &str) -> Result<Option<DiagnosticResult>, StoreError>;

    /// Insert the terminal result. Fails with [`StoreError::Duplicate`] if
    /// the student already has one.
    async fn create_result(&self, result: &DiagnosticResult) -> Result<(), StoreError>;

    /// Remove the student's in-progress session and its responses.
    ///
    /// Completed sessions and results are never touched. Returns whether
    /// anything was removed.
    async fn delete_session(&self, student_id: &str) -> Result<bool, StoreError>;
}

//! Error types for the Tierwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use std::path::PathBuf;
use thiserror::Error;

// --- Bounded context errors ---

/// Problems with the item bank content. These indicate a content or
/// configuration problem, never a student mistake.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("Failed to read item bank at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse item bank: {0}")]
    Parse(String),

    #[error("Invalid item {item_id}: {reason}")]
    InvalidItem { item_id: String, reason: String },

    #[error("Duplicate item id: {0}")]
    DuplicateId(String),

    #[error("Item bank is empty")]
    Empty,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Optimistic version check lost: someone else saved the session first.
    #[error("Session {session_id} was modified concurrently (expected version {expected_version})")]
    Conflict {
        session_id: String,
        expected_version: u64,
    },

    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

/// Errors surfaced by the session orchestrator.
///
/// Policy rejections and data-integrity problems each get their own variant
/// so callers can branch on [`DiagnosticError::code`]. Storage failures are
/// wrapped unchanged and stay distinguishable from domain errors.
#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("Diagnostic already completed for student {student_id}")]
    AlreadyCompleted { student_id: String },

    #[error("No active diagnostic session for student {student_id}")]
    NoActiveSession { student_id: String },

    #[error("Item mismatch: expected {expected}, received {received}")]
    ItemMismatch { expected: String, received: String },

    #[error("Item not found in pool: {0}")]
    ItemNotFound(String),

    #[error("Item pool is empty")]
    EmptyItemPool,

    #[error("Option {selected} is out of range for item {item_id} ({options} options)")]
    InvalidOption {
        item_id: String,
        selected: usize,
        options: usize,
    },

    #[error("Session for student {student_id} was modified concurrently")]
    Conflict { student_id: String },

    #[error("No diagnostic result for student {student_id}")]
    ResultNotFound { student_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DiagnosticError {
    /// Stable machine-readable code for callers to branch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyCompleted { .. } => "already_completed",
            Self::NoActiveSession { .. } => "no_active_session",
            Self::ItemMismatch { .. } => "item_mismatch",
            Self::ItemNotFound(_) => "item_not_found",
            Self::EmptyItemPool => "empty_item_pool",
            Self::InvalidOption { .. } => "invalid_option",
            Self::Conflict { .. } => "conflict",
            Self::ResultNotFound { .. } => "result_not_found",
            Self::Store(_) => "storage_error",
        }
    }
}

//! Caller-facing payloads. Items only ever appear as [`ItemView`], never
//! with IRT parameters or the answer key.

use serde::{Deserialize, Serialize};
use tierwise_core::{DiagnosticResult, ItemView};

/// Where an in-progress session stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: String,
    pub total_items: usize,
    pub items_administered: usize,
    pub current_item: ItemView,
}

/// What `respond` hands back: the next item, or the final classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RespondOutcome {
    InProgress(SessionView),
    Completed(DiagnosticResult),
}

/// Read-only snapshot of a student's diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusSnapshot {
    NotStarted,
    InProgress(SessionView),
    Completed(DiagnosticResult),
}

impl StatusSnapshot {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress(_) => "in_progress",
            Self::Completed(_) => "completed",
        }
    }
}

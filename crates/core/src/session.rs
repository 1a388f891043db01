//! Diagnostic sessions, recorded responses, and the terminal result.

use crate::item::Domain;
use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One student's run through the diagnostic.
///
/// Invariants held by the orchestrator:
/// - `administered_item_ids` has no duplicates and only grows
/// - `items_administered == administered_item_ids.len()`
/// - while in progress, `current_item_id` is in the pool and not yet administered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub student_id: String,
    pub status: SessionStatus,
    pub theta_estimate: f64,
    pub items_administered: usize,
    pub total_items: usize,
    pub current_item_id: Option<String>,
    pub administered_item_ids: Vec<String>,
    /// Optimistic concurrency token, bumped by every successful save.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh session positioned on `first_item_id`.
    pub fn new(student_id: impl Into<String>, total_items: usize, first_item_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.into(),
            status: SessionStatus::InProgress,
            theta_estimate: 0.0,
            items_administered: 0,
            total_items,
            current_item_id: Some(first_item_id.into()),
            administered_item_ids: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    /// Move the current item into the administered set.
    ///
    /// Returns `false` (and changes nothing) if the item was already administered.
    pub fn mark_administered(&mut self, item_id: &str) -> bool {
        if self.administered_item_ids.iter().any(|id| id == item_id) {
            return false;
        }
        self.administered_item_ids.push(item_id.to_string());
        self.items_administered = self.administered_item_ids.len();
        if self.current_item_id.as_deref() == Some(item_id) {
            self.current_item_id = None;
        }
        self.updated_at = Utc::now();
        true
    }

    pub fn budget_exhausted(&self) -> bool {
        self.items_administered >= self.total_items
    }
}

/// An answered item. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub session_id: String,
    pub item_id: String,
    pub selected_option: usize,
    pub is_correct: bool,
    /// Ability estimate right after this response was incorporated
    pub theta_after: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    pub answered_at: DateTime<Utc>,
}

/// Terminal classification. At most one per student, ever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub student_id: String,
    pub session_id: String,
    pub overall_level: Level,
    pub theta_final: f64,
    /// `None` when the administered items carry no information at `theta_final`
    #[serde(default)]
    pub standard_error: Option<f64>,
    pub items_administered: usize,
    pub domain_levels: BTreeMap<Domain, Level>,
    pub domain_scores: BTreeMap<Domain, f64>,
    pub completed_at: DateTime<Utc>,
}

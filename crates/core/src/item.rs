//! Calibrated test items and the public payload shown to students.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A subject-area tag partitioning the item pool (e.g. `math`, `reading`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A pre-calibrated 3PL test item.
///
/// `a`, `b` and `c` drive the estimation math; the remaining fields are
/// presentation content the engine never looks at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique item id
    pub id: String,

    /// Subject-area tag
    pub domain: Domain,

    /// Discrimination (> 0)
    pub a: f64,

    /// Difficulty
    pub b: f64,

    /// Guessing floor, in [0, 1)
    #[serde(default)]
    pub c: f64,

    /// Question text
    pub question: String,

    /// Answer options, shown in order
    pub options: Vec<String>,

    /// Index into `options` of the correct answer
    pub correct_option: usize,

    /// Presentation hint (e.g. "multiple_choice")
    #[serde(default = "default_item_type")]
    pub item_type: String,
}

fn default_item_type() -> String {
    "multiple_choice".into()
}

impl Item {
    /// Whether `selected_option` is the keyed answer.
    pub fn is_correct(&self, selected_option: usize) -> bool {
        selected_option == self.correct_option
    }

    /// The caller-facing payload: no IRT parameters, no answer key.
    pub fn view(&self) -> ItemView {
        ItemView {
            id: self.id.clone(),
            domain: self.domain.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
            item_type: self.item_type.clone(),
        }
    }
}

/// What a student gets to see of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub domain: Domain,
    pub question: String,
    pub options: Vec<String>,
    pub item_type: String,
}

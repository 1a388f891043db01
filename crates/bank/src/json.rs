//! Item bank sources: a JSON file on disk, or a fixed in-process list.

use std::path::{Path, PathBuf};
use tierwise_core::{BankError, Item, ItemBank};
use tracing::debug;

/// Loads a JSON array of items from a file.
pub struct JsonItemBank {
    path: PathBuf,
}

impl JsonItemBank {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ItemBank for JsonItemBank {
    fn source(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<Vec<Item>, BankError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| BankError::Read {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let items: Vec<Item> =
            serde_json::from_str(&content).map_err(|e| BankError::Parse(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), count = items.len(), "Item bank file parsed");
        Ok(items)
    }
}

/// A fixed list of items, handy for tests and simulations.
pub struct StaticItemBank {
    items: Vec<Item>,
}

impl StaticItemBank {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

impl ItemBank for StaticItemBank {
    fn source(&self) -> String {
        "static".into()
    }

    fn load(&self) -> Result<Vec<Item>, BankError> {
        Ok(self.items.clone())
    }
}

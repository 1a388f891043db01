//! The validated in-memory item pool shared by every session.

use crate::validate_item;
use std::collections::{BTreeMap, HashMap};
use tierwise_core::{BankError, Domain, Item, ItemBank};
use tracing::info;

/// Items in bank order plus an id index.
///
/// Pool order matters: it is the tie-breaker for item selection.
#[derive(Debug, Clone, Default)]
pub struct ItemPool {
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl ItemPool {
    /// Build a pool from items, validating each and rejecting duplicate ids.
    ///
    /// An empty list yields an empty pool; [`ItemPool::load`] is the strict entry point.
    pub fn from_items(items: Vec<Item>) -> Result<Self, BankError> {
        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            validate_item(item)?;
            if index.insert(item.id.clone(), position).is_some() {
                return Err(BankError::DuplicateId(item.id.clone()));
            }
        }
        Ok(Self { items, index })
    }

    /// Load and validate every item from `bank`. An empty bank is an error.
    pub fn load(bank: &dyn ItemBank) -> Result<Self, BankError> {
        Self::load_restricted(bank, &[])
    }

    /// Like [`ItemPool::load`], also requiring each item's domain to be in
    /// `allowed_domains` (when non-empty).
    pub fn load_restricted(bank: &dyn ItemBank, allowed_domains: &[String]) -> Result<Self, BankError> {
        let items = bank.load()?;
        if items.is_empty() {
            return Err(BankError::Empty);
        }
        if !allowed_domains.is_empty() {
            if let Some(stray) = items
                .iter()
                .find(|item| !allowed_domains.iter().any(|d| d == item.domain.as_str()))
            {
                return Err(BankError::InvalidItem {
                    item_id: stray.id.clone(),
                    reason: format!("domain \"{}\" is not one of {allowed_domains:?}", stray.domain),
                });
            }
        }

        let pool = Self::from_items(items)?;
        info!(
            source = %bank.source(),
            items = pool.len(),
            domains = pool.domain_counts().len(),
            "Item pool loaded"
        );
        Ok(pool)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items per domain.
    pub fn domain_counts(&self) -> BTreeMap<Domain, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.domain.clone()).or_insert(0) += 1;
        }
        counts
    }
}

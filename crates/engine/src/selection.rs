//! Greedy maximum-information item selection.

use crate::irt::item_information;
use std::collections::HashSet;
use tierwise_core::Item;

/// Pick the most informative item at `theta` that has not been administered.
///
/// Returns `None` only when every pool item is in `administered_ids`. Ties
/// go to the item that appears first in `pool`, so selection is deterministic.
pub fn select_next_item<'a>(theta: f64, pool: &'a [Item], administered_ids: &[String]) -> Option<&'a Item> {
    let administered: HashSet<&str> = administered_ids.iter().map(String::as_str).collect();

    let mut best: Option<(&Item, f64)> = None;
    for item in pool.iter().filter(|item| !administered.contains(item.id.as_str())) {
        let info = item_information(theta, item);
        match best {
            Some((_, best_info)) if info <= best_info => {}
            _ => best = Some((item, info)),
        }
    }
    best.map(|(item, _)| item)
}

//! Item bank sources and the validated, shareable item pool.
//!
//! Items are checked once at load time so malformed bank entries surface as
//! [`BankError`]s at startup rather than as odd numbers mid-session.

pub mod json;
pub mod pool;

pub use json::{JsonItemBank, StaticItemBank};
pub use pool::ItemPool;

use tierwise_core::{BankError, Item};

/// Check a single item's parameters and presentation content.
pub fn validate_item(item: &Item) -> Result<(), BankError> {
    let invalid = |reason: String| BankError::InvalidItem {
        item_id: item.id.clone(),
        reason,
    };

    if item.id.trim().is_empty() {
        return Err(BankError::InvalidItem {
            item_id: "<blank>".into(),
            reason: "id must not be blank".into(),
        });
    }
    if item.domain.as_str().trim().is_empty() {
        return Err(invalid("domain must not be blank".into()));
    }
    if !(item.a.is_finite() && item.a > 0.0) {
        return Err(invalid(format!("discrimination a must be positive, got {}", item.a)));
    }
    if !item.b.is_finite() {
        return Err(invalid(format!("difficulty b must be finite, got {}", item.b)));
    }
    if !(0.0..1.0).contains(&item.c) {
        return Err(invalid(format!("guessing c must be in [0, 1), got {}", item.c)));
    }
    if item.options.is_empty() {
        return Err(invalid("item has no options".into()));
    }
    if item.correct_option >= item.options.len() {
        return Err(invalid(format!(
            "correct_option {} out of range for {} options",
            item.correct_option,
            item.options.len()
        )));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use test_support::item;

    #[test]
    fn well_formed_item_passes() {
        assert!(validate_item(&item("m1", "math", 0.0)).is_ok());
    }

    #[test]
    fn rejects_non_positive_discrimination() {
        let mut bad = item("m1", "math", 0.0);
        bad.a = 0.0;
        assert!(matches!(validate_item(&bad), Err(BankError::InvalidItem { .. })));
        bad.a = f64::NAN;
        assert!(validate_item(&bad).is_err());
    }

    #[test]
    fn rejects_guessing_outside_unit_interval() {
        let mut bad = item("m1", "math", 0.0);
        bad.c = 1.0;
        assert!(validate_item(&bad).is_err());
        bad.c = -0.1;
        assert!(validate_item(&bad).is_err());
    }

    #[test]
    fn rejects_out_of_range_answer_key() {
        let mut bad = item("m1", "math", 0.0);
        bad.correct_option = 4;
        let err = validate_item(&bad).unwrap_err();
        assert!(err.to_string().contains("correct_option"));
    }

    #[test]
    fn rejects_blank_id_and_empty_options() {
        let mut bad = item(" ", "math", 0.0);
        assert!(validate_item(&bad).is_err());
        bad = item("m1", "math", 0.0);
        bad.options.clear();
        assert!(validate_item(&bad).is_err());
    }
}

//! `tierwise bank`: Item bank tools.

use std::path::Path;

use tierwise_bank::{ItemPool, JsonItemBank};

use super::CommandResult;

pub async fn validate(path: &Path) -> CommandResult {
    println!("🔍 Validating item bank {}...", path.display());

    let pool = match ItemPool::load(&JsonItemBank::new(path)) {
        Ok(pool) => pool,
        Err(e) => {
            println!("   ❌ {e}");
            return Err(e.into());
        }
    };

    println!("   ✅ {} items loaded", pool.len());
    println!();
    for (domain, count) in pool.domain_counts() {
        println!("   {domain:<16} {count:>4} items");
    }

    let summary = ParameterSummary::of(&pool);
    println!();
    println!("   a: {:.2} .. {:.2}", summary.a.0, summary.a.1);
    println!("   b: {:.2} .. {:.2}", summary.b.0, summary.b.1);
    println!("   c: {:.2} .. {:.2}", summary.c.0, summary.c.1);

    Ok(())
}

/// Min/max of each IRT parameter across a pool.
#[derive(Debug, PartialEq)]
struct ParameterSummary {
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
}

impl ParameterSummary {
    fn of(pool: &ItemPool) -> Self {
        let range = |f: fn(&tierwise_core::Item) -> f64| {
            pool.items()
                .iter()
                .map(f)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
        };
        Self {
            a: range(|i| i.a),
            b: range(|i| i.b),
            c: range(|i| i.c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BANK: &str = r#"[
        {"id": "m1", "domain": "math", "a": 0.8, "b": -1.0, "c": 0.2,
         "question": "1+1?", "options": ["1", "2"], "correct_option": 1},
        {"id": "r1", "domain": "reading", "a": 1.4, "b": 0.5, "c": 0.25,
         "question": "Pick the noun", "options": ["run", "dog", "blue"], "correct_option": 1}
    ]"#;

    #[test]
    fn summary_spans_parameters() {
        let items: Vec<tierwise_core::Item> = serde_json::from_str(BANK).unwrap();
        let pool = ItemPool::from_items(items).unwrap();
        let summary = ParameterSummary::of(&pool);
        assert_eq!(summary.a, (0.8, 1.4));
        assert_eq!(summary.b, (-1.0, 0.5));
        assert_eq!(summary.c, (0.2, 0.25));
    }

    #[tokio::test]
    async fn validate_accepts_good_bank() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BANK.as_bytes()).unwrap();
        validate(file.path()).await.unwrap();
    }

    #[tokio::test]
    async fn validate_rejects_bad_bank() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"[{"id": "x", "domain": "math", "a": -1.0, "b": 0.0,
            "question": "?", "options": ["a"], "correct_option": 0}]"#)
            .unwrap();
        assert!(validate(file.path()).await.is_err());
    }
}

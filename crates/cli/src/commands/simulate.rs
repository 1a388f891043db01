//! `tierwise simulate`: Run a diagnostic against a simulated student.
//!
//! The simulated student answers each item correctly with the 3PL
//! probability at their true ability, so the estimate trajectory shows how
//! quickly the engine homes in on them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tierwise_core::{DiagnosticError, DiagnosticResult, Item, Response};
use tierwise_diagnostic::{DiagnosticService, RespondOutcome};
use tierwise_engine::probability_correct;
use tierwise_store::InMemoryRepository;

use super::CommandResult;

pub struct SimulateOptions {
    pub theta: f64,
    pub bank: Option<PathBuf>,
    pub seed: Option<u64>,
    pub items: Option<usize>,
    pub json: bool,
}

/// A finished simulated diagnostic.
#[derive(Debug)]
pub struct Simulation {
    pub responses: Vec<Response>,
    pub result: DiagnosticResult,
}

pub async fn run(config_path: Option<&Path>, options: SimulateOptions) -> CommandResult {
    if !options.theta.is_finite() {
        return Err("--theta must be a finite number".into());
    }

    let mut config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(items) = options.items {
        config.engine.total_items = items;
    }
    config.validate()?;

    let pool = super::load_pool(&config, options.bank.as_deref())
        .map_err(|e| format!("Failed to load item bank: {e}"))?;
    let service = DiagnosticService::from_config(Arc::new(InMemoryRepository::new()), Arc::new(pool), &config.engine);

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let simulation = simulate_student(&service, "simulated", options.theta, &mut rng).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&simulation.result)?);
        return Ok(());
    }

    println!("🎲 Simulated student, true θ = {:.2}", options.theta);
    println!();
    for (n, response) in simulation.responses.iter().enumerate() {
        let mark = if response.is_correct { "✓" } else { "✗" };
        println!(
            "   #{:02}  {:<20} {mark}  θ = {:+.3}",
            n + 1,
            response.item_id,
            response.theta_after
        );
    }

    let result = &simulation.result;
    println!();
    println!("   Level:   {}", result.overall_level);
    match result.standard_error {
        Some(se) => println!("   θ final: {:+.3} (SE {se:.3})", result.theta_final),
        None => println!("   θ final: {:+.3}", result.theta_final),
    }
    println!("   Items:   {}", result.items_administered);
    for (domain, level) in &result.domain_levels {
        let score = result.domain_scores.get(domain).copied().unwrap_or_default();
        println!("   {domain:<16} {level:<10} {score:+.3}");
    }

    Ok(())
}

/// Drive one diagnostic to completion with answers drawn from the 3PL model.
pub async fn simulate_student<R: Rng>(
    service: &DiagnosticService,
    student_id: &str,
    true_theta: f64,
    rng: &mut R,
) -> Result<Simulation, DiagnosticError> {
    let mut current = service.start(student_id).await?.current_item.id;

    loop {
        let item = service
            .pool()
            .get(&current)
            .ok_or_else(|| DiagnosticError::ItemNotFound(current.clone()))?;
        let p = probability_correct(true_theta, item.a, item.b, item.c);
        let selected = if rng.random::<f64>() < p {
            item.correct_option
        } else {
            wrong_option(item)
        };

        match service.respond(student_id, &current, selected, None).await? {
            RespondOutcome::InProgress(view) => current = view.current_item.id,
            RespondOutcome::Completed(result) => {
                let responses = service.responses(student_id).await?;
                return Ok(Simulation { responses, result });
            }
        }
    }
}

fn wrong_option(item: &Item) -> usize {
    (item.correct_option + 1) % item.options.len().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierwise_bank::ItemPool;
    use tierwise_core::Level;

    fn pool() -> ItemPool {
        let mut items = Vec::new();
        for domain in ["math", "reading"] {
            for (i, b) in [-2.0, -1.0, 0.0, 1.0, 2.0].into_iter().enumerate() {
                items.push(Item {
                    id: format!("{domain}-{i}"),
                    domain: domain.into(),
                    a: 1.0,
                    b,
                    c: 0.0,
                    question: "?".into(),
                    options: vec!["A".into(), "B".into(), "C".into()],
                    correct_option: 2,
                    item_type: "multiple_choice".into(),
                });
            }
        }
        ItemPool::from_items(items).unwrap()
    }

    fn service() -> DiagnosticService {
        DiagnosticService::new(Arc::new(InMemoryRepository::new()), Arc::new(pool())).with_total_items(6)
    }

    #[tokio::test]
    async fn strong_student_places_advanced() {
        let mut rng = StdRng::seed_from_u64(7);
        let sim = simulate_student(&service(), "s", 40.0, &mut rng).await.unwrap();
        assert_eq!(sim.result.overall_level, Level::Advanced);
        assert_eq!(sim.responses.len(), 6);
        assert!(sim.responses.iter().all(|r| r.is_correct));
    }

    #[tokio::test]
    async fn weak_student_places_foundation() {
        let mut rng = StdRng::seed_from_u64(7);
        let sim = simulate_student(&service(), "s", -40.0, &mut rng).await.unwrap();
        assert_eq!(sim.result.overall_level, Level::Foundation);
        assert!(sim.responses.iter().all(|r| !r.is_correct));
    }

    #[tokio::test]
    async fn seeded_runs_are_reproducible() {
        let first = simulate_student(&service(), "s", 0.3, &mut StdRng::seed_from_u64(42)).await.unwrap();
        let second = simulate_student(&service(), "s", 0.3, &mut StdRng::seed_from_u64(42)).await.unwrap();
        let ids = |s: &Simulation| s.responses.iter().map(|r| r.item_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.result.theta_final, second.result.theta_final);
    }

    #[test]
    fn wrong_option_differs_from_key() {
        let item = pool().items()[0].clone();
        assert_ne!(wrong_option(&item), item.correct_option);
    }
}

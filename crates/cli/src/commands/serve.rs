//! `tierwise serve`: Start the HTTP diagnostic gateway.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tierwise_core::{DiagnosticEvent, EventBus};
use tierwise_diagnostic::DiagnosticService;
use tracing::{debug, info};

use super::CommandResult;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
    host_override: Option<String>,
    bank_override: Option<PathBuf>,
) -> CommandResult {
    let mut config = super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    let pool = super::load_pool(&config, bank_override.as_deref())
        .map_err(|e| format!("Failed to load item bank: {e}"))?;
    let repository = super::open_repository(&config.storage)
        .await
        .map_err(|e| format!("Failed to open storage: {e}"))?;

    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    let service = DiagnosticService::from_config(repository, Arc::new(pool), &config.engine)
        .with_event_bus(event_bus);

    println!("🎯 Tierwise Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Item bank: {} items across {} domains",
        service.pool().len(),
        service.pool().domain_counts().len()
    );
    println!("   Storage:   {}", service.repository_name());
    println!("   Budget:    {} items per diagnostic", service.total_items());

    tierwise_gateway::start(&config.gateway, Arc::new(service)).await?;

    Ok(())
}

/// Mirror session transitions into the log.
fn spawn_event_logger(event_bus: &EventBus) {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match event.as_ref() {
                    DiagnosticEvent::SessionCompleted {
                        student_id,
                        overall_level,
                        theta_final,
                        ..
                    } => info!(student_id = %student_id, level = %overall_level, theta = theta_final, "Placement decided"),
                    other => debug!(event = ?other, "Diagnostic event"),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

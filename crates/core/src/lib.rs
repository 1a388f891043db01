//! # Tierwise Core
//!
//! Domain types, traits, and error definitions for the Tierwise adaptive
//! diagnostic engine. This crate has **no framework dependencies**: it defines
//! the domain model that the engine, store, and orchestrator implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations live
//! in their respective crates. This enables:
//! - Swapping storage backends via configuration
//! - Easy testing with in-memory implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod bank;
pub mod error;
pub mod event;
pub mod item;
pub mod level;
pub mod repository;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use bank::ItemBank;
pub use error::{BankError, DiagnosticError, StoreError};
pub use event::{DiagnosticEvent, EventBus};
pub use item::{Domain, Item, ItemView};
pub use level::Level;
pub use repository::DiagnosticRepository;
pub use session::{DiagnosticResult, Response, Session, SessionStatus};

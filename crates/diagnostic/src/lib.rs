//! The diagnostic session orchestrator.
//!
//! One state machine per student, `not_started → in_progress → completed`:
//!
//! 1. **Start**: select the most informative item at theta 0 and open a session
//! 2. **Respond**: score the answer, re-estimate theta over the whole history,
//!    persist, and select the next item
//! 3. **Finalize**: once the item budget (or the pool) is spent, score every
//!    domain, classify, and write the one-and-only result
//!
//! Calls for the same student are serialized by [`StudentLocks`]; storage
//! backends additionally reject stale writes with a version check.

pub mod locks;
pub mod service;
pub mod settings;
pub mod view;

pub use locks::StudentLocks;
pub use service::DiagnosticService;
pub use settings::engine_settings;
pub use view::{RespondOutcome, SessionView, StatusSnapshot};

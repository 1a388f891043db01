//! Per-student mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle entries are swept once the table grows past this.
const SWEEP_THRESHOLD: usize = 1_024;

/// One async mutex per student id.
///
/// Different students never contend; two calls for the same student run
/// one after the other.
#[derive(Default)]
pub struct StudentLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StudentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `student_id`. Released when the guard drops.
    pub async fn acquire(&self, student_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > SWEEP_THRESHOLD {
                // Only the table itself references an idle lock
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(student_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked students.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

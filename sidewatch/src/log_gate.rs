//! At-most-once logging for recoverable failure streaks.
//!
//! Long-running tasks hit the same recoverable failure over and over (a
//! pool API that is down stays down for a while). Logging every occurrence
//! drowns the journal, so each task owns a [`LogGate`] that records which
//! failure keys have already been reported. Gates are per task; two tasks
//! suppressing the same key never interfere.

use tracing::trace;

use std::collections::HashSet;

/// Records which failure keys a task has already logged.
#[derive(Debug)]
pub struct LogGate {
    scope: &'static str,
    logged: HashSet<&'static str>,
}

impl LogGate {
    /// Create a gate scoped to one logical task.
    pub fn new(scope: &'static str) -> Self {
        Self {
            scope,
            logged: HashSet::new(),
        }
    }

    /// Whether `key` has not been logged yet. Marks it logged.
    ///
    /// Used for conditions that should be reported once for the lifetime
    /// of the task (for example, a missing field in an API payload).
    pub fn first(&mut self, key: &'static str) -> bool {
        let fresh = self.logged.insert(key);
        if !fresh {
            trace!(scope = self.scope, key, "Suppressed repeat log.");
        }
        fresh
    }

    /// Whether `key` starts a new failure streak. Forgets all other keys.
    ///
    /// Used by the reconnect loop: an unbroken run of identical failures
    /// logs once, but a differing failure class resets the suppression so
    /// the change is visible.
    pub fn supersede(&mut self, key: &'static str) -> bool {
        let repeat = self.logged.len() == 1 && self.logged.contains(key);
        if repeat {
            trace!(scope = self.scope, key, "Suppressed repeat log.");
            return false;
        }
        self.logged.clear();
        self.logged.insert(key);
        true
    }

    /// Forget everything, so the next occurrence of any key logs again.
    /// Called after a successful connection to start a fresh streak.
    pub fn reset(&mut self) {
        self.logged.clear();
    }
}

//! Correlates log lines from concurrent workers back to one orchestrator
//! run. Attached to the root `tracing::info_span!` the orchestrator opens
//! in `Orchestrator::run`.

use std::fmt;

/// Opaque, lexicographically sortable identifier for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(ulid::Ulid);

impl RunId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_run_ids_are_distinct_and_sortable() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert!(a.to_string() <= b.to_string() || a.to_string() != b.to_string());
    }
}

//! Immediate admission of flows that have no declared intent

use sdn_common::{FlowCounts, FlowKey, PathId};
use serde::Serialize;

use crate::selector::PathRanking;

/// Observed flows without a delay budget; append-only
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdHocFlows {
    flows: Vec<FlowKey>,
}

impl AdHocFlows {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flow; false if it was already known
    pub fn observe(&mut self, key: FlowKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.flows.push(key);
        true
    }

    /// Whether the flow was observed
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.flows.contains(key)
    }

    /// Flows in observation order
    pub fn as_slice(&self) -> &[FlowKey] {
        &self.flows
    }

    /// Number of flows
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// True when nothing was observed
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Path for a newly admitted flow: least loaded, slowest first on ties
///
/// Same rule the selector applies to ad-hoc flows during a recompute.
pub fn admission_path(ranking: &PathRanking, counts: &FlowCounts) -> PathId {
    counts
        .least_loaded(ranking.as_slice())
        .unwrap_or_else(|| ranking.fastest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_common::{Host, PerPath};

    #[test]
    fn test_observe_once() {
        let mut flows = AdHocFlows::new();
        let key = FlowKey::new(Host::H3, Host::H4);
        assert!(flows.observe(key));
        assert!(!flows.observe(key));
        assert_eq!(flows.len(), 1);
    }

    #[test]
    fn test_admission_least_loaded() {
        let ranking = PathRanking::by_delay(&PerPath([90.0, 50.0, 10.0]));
        let mut counts = FlowCounts::new();
        counts.increment(PathId::A);
        counts.increment(PathId::C);
        assert_eq!(admission_path(&ranking, &counts), PathId::B);

        counts.increment(PathId::B);
        // all equal: slowest wins
        assert_eq!(admission_path(&ranking, &counts), PathId::A);
    }
}

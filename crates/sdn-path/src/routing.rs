//! Installed routing state: what the switches currently carry

use sdn_common::{FlowCounts, FlowKey, Intent, PathId, PerPath, Route, RoutingTable};
use serde::Serialize;
use tracing::info;

use crate::admission::{admission_path, AdHocFlows};
use crate::reconciler::{reconcile, FlowOp};
use crate::selector::{select_paths, PathAssignment, PathRanking};

/// Routing table, counts, ad-hoc set and default path as last installed
#[derive(Debug, Clone, Default, Serialize)]
pub struct RoutingState {
    routes: RoutingTable,
    counts: FlowCounts,
    ranking: PathRanking,
    adhoc: AdHocFlows,
}

impl RoutingState {
    /// Nothing installed; default path is `C` until the first recompute
    pub fn new() -> Self {
        Self::default()
    }

    /// Installed routes
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// Routes per path
    pub fn counts(&self) -> FlowCounts {
        self.counts
    }

    /// Ranking of the last recompute
    pub fn ranking(&self) -> PathRanking {
        self.ranking
    }

    /// Path for unmatched traffic
    pub fn default_path(&self) -> PathId {
        self.ranking.fastest()
    }

    /// Observed ad-hoc flows
    pub fn adhoc(&self) -> &AdHocFlows {
        &self.adhoc
    }

    /// Full selection pass followed by reconciliation
    ///
    /// Returns the ops to push to the switches; the new table replaces the
    /// installed one.
    pub fn recompute(&mut self, delays: &PerPath<f64>, intents: &[Intent]) -> Vec<FlowOp> {
        let assignment = select_paths(delays, intents, self.adhoc.as_slice());
        self.install(assignment)
    }

    /// Reconcile against `assignment` and make it the installed state
    pub fn install(&mut self, assignment: PathAssignment) -> Vec<FlowOp> {
        let ops = reconcile(&self.routes, &assignment.routes);
        if assignment.default_path() != self.default_path() {
            info!(from = %self.default_path(), to = %assignment.default_path(), "default route changed");
        }
        self.routes = assignment.routes;
        self.counts = assignment.counts;
        self.ranking = assignment.ranking;
        ops
    }

    /// Admit a flow with no intent immediately, without waiting for a recompute
    ///
    /// `None` when the key is already routed or already admitted.
    pub fn admit(&mut self, key: FlowKey) -> Option<Route> {
        if self.routes.contains(&key) || !self.adhoc.observe(key) {
            return None;
        }
        let path = admission_path(&self.ranking, &self.counts);
        self.counts.increment(path);
        self.routes.insert(key, path);
        info!(flow = %key, %path, counts = %self.counts, "admitted unspecified flow");
        Some(Route { key, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_common::Host;

    fn catalog() -> Vec<Intent> {
        vec![
            Intent::new(Host::H1, Host::H4, 90.0),
            Intent::new(Host::H1, Host::H5, 90.0),
            Intent::new(Host::H1, Host::H6, 20.0),
            Intent::new(Host::H2, Host::H4, 600.0),
            Intent::new(Host::H2, Host::H5, 50.0),
            Intent::new(Host::H2, Host::H6, 150.0),
        ]
    }

    #[test]
    fn test_recompute_then_idle() {
        let mut state = RoutingState::new();
        let delays = PerPath([90.0, 50.0, 10.0]);

        let ops = state.recompute(&delays, &catalog());
        assert_eq!(ops.len(), 6);
        assert!(ops.iter().all(|op| matches!(op, FlowOp::Install(_))));

        assert!(state.recompute(&delays, &catalog()).is_empty());
        assert_eq!(state.counts().total(), 6);
        assert_eq!(state.default_path(), PathId::C);
    }

    #[test]
    fn test_delay_shift_reroutes() {
        let mut state = RoutingState::new();
        state.recompute(&PerPath([90.0, 50.0, 10.0]), &catalog());

        // C becomes the slowest path
        let ops = state.recompute(&PerPath([30.0, 50.0, 300.0]), &catalog());
        assert!(!ops.is_empty());
        assert!(ops.iter().all(|op| matches!(op, FlowOp::Reroute { .. })));
        assert_eq!(state.default_path(), PathId::A);
        assert_eq!(state.counts().total(), 6);
    }

    #[test]
    fn test_admission_between_recomputes() {
        let mut state = RoutingState::new();
        let delays = PerPath([90.0, 50.0, 10.0]);
        state.recompute(&delays, &catalog());

        let key = FlowKey::new(Host::H3, Host::H4);
        let route = state.admit(key).unwrap();
        // counts were 2/2/2, slowest wins the tie
        assert_eq!(route.path, PathId::A);
        assert_eq!(state.counts().total(), 7);
        assert!(state.admit(key).is_none());

        // next recompute keeps it and issues nothing new
        assert!(state.recompute(&delays, &catalog()).is_empty());
        assert_eq!(state.routes().path_for(&key), Some(PathId::A));
        assert_eq!(state.counts().total(), 7);
    }

    #[test]
    fn test_admission_skips_intent_keys() {
        let mut state = RoutingState::new();
        state.recompute(&PerPath([90.0, 50.0, 10.0]), &catalog());
        assert!(state.admit(FlowKey::new(Host::H1, Host::H4)).is_none());
        assert!(state.adhoc().is_empty());
    }

    #[test]
    fn test_admission_before_first_recompute() {
        let mut state = RoutingState::new();
        let route = state.admit(FlowKey::new(Host::H3, Host::H6)).unwrap();
        assert_eq!(route.path, PathId::A);
        assert_eq!(state.counts().total(), 1);
    }
}

//! Delay-aware intent path selection
//!
//! Greedy single pass over the demand set:
//!
//! - intents tightest budget first; feasible paths are those strictly faster
//!   than the budget, scanned slowest first, and the least loaded one wins
//!   (ties keep the slower path, spending SLA slack before fast capacity)
//! - an intent no path can satisfy falls back to the fastest path
//! - ad-hoc flows go to the least loaded of all paths, same tie rule
//! - the fastest path becomes the default route

use sdn_common::{FlowCounts, FlowKey, Intent, PathId, PerPath, RoutingTable};
use serde::Serialize;
use tracing::{debug, info};

/// Paths ordered by descending delay; the last one is the fastest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathRanking([PathId; 3]);

impl PathRanking {
    /// Rank paths by delay, slowest first; equal delays keep `A, B, C` order
    pub fn by_delay(delays: &PerPath<f64>) -> Self {
        let mut paths = PathId::ALL;
        paths.sort_by(|a, b| delays.get(*b).total_cmp(&delays.get(*a)));
        Self(paths)
    }

    /// Lowest-delay path
    pub fn fastest(&self) -> PathId {
        self.0[2]
    }

    /// Paths slowest first
    pub fn as_slice(&self) -> &[PathId] {
        &self.0
    }

    /// Paths strictly faster than `budget_ms`, slowest first
    pub fn feasible(&self, delays: &PerPath<f64>, budget_ms: f64) -> Vec<PathId> {
        self.0
            .iter()
            .copied()
            .filter(|p| delays.get(*p) < budget_ms)
            .collect()
    }
}

impl Default for PathRanking {
    fn default() -> Self {
        Self::by_delay(&PerPath::splat(0.0))
    }
}

/// Complete output of one selection pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathAssignment {
    /// One route per intent and ad-hoc flow
    pub routes: RoutingTable,
    /// Routes per path
    pub counts: FlowCounts,
    /// Ranking the pass was computed with
    pub ranking: PathRanking,
    /// Intents routed best-effort because no path met their budget
    pub fallbacks: Vec<FlowKey>,
}

impl PathAssignment {
    /// Path for traffic not matched by any route
    pub fn default_path(&self) -> PathId {
        self.ranking.fastest()
    }
}

/// Compute a full assignment for the current delays and demand set
pub fn select_paths(delays: &PerPath<f64>, intents: &[Intent], adhoc: &[FlowKey]) -> PathAssignment {
    let ranking = PathRanking::by_delay(delays);
    let mut routes = RoutingTable::new();
    let mut counts = FlowCounts::new();
    let mut fallbacks = Vec::new();

    let mut ordered: Vec<&Intent> = intents.iter().collect();
    ordered.sort_by(|a, b| a.max_delay_ms.total_cmp(&b.max_delay_ms));

    for intent in ordered {
        let key = intent.key();
        let feasible = ranking.feasible(delays, intent.max_delay_ms);
        let path = match counts.least_loaded(&feasible) {
            Some(path) => path,
            None => {
                info!(
                    intent = %key,
                    budget_ms = intent.max_delay_ms,
                    fastest = %ranking.fastest(),
                    "no path meets delay budget, using fastest path"
                );
                fallbacks.push(key);
                ranking.fastest()
            }
        };
        counts.increment(path);
        routes.insert(key, path);
    }

    for key in adhoc {
        if routes.contains(key) {
            debug!(flow = %key, "ad-hoc flow shadowed by intent");
            continue;
        }
        // ranking is never empty
        let path = counts.least_loaded(ranking.as_slice()).unwrap_or_else(|| ranking.fastest());
        counts.increment(path);
        routes.insert(*key, path);
    }

    PathAssignment {
        routes,
        counts,
        ranking,
        fallbacks,
    }
}

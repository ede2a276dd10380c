//! Demand and routing types: intents, ad-hoc flows, routes

use crate::{Host, HostSide, PathId, PerPath, SdnError, SdnResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Source/destination pair identifying a demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    /// Source host (ingress side)
    pub source: Host,
    /// Destination host (egress side)
    pub destination: Host,
}

impl FlowKey {
    /// Create a key
    pub const fn new(source: Host, destination: Host) -> Self {
        Self { source, destination }
    }

    /// True when the pair crosses the diamond from s1 to s5
    pub fn crosses_fabric(&self) -> bool {
        self.source.side() == HostSide::Ingress && self.destination.side() == HostSide::Egress
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.source, self.destination)
    }
}

/// Declared demand with a delay budget
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Source host
    pub source: Host,
    /// Destination host
    pub destination: Host,
    /// Maximum tolerable end-to-end delay in milliseconds
    #[serde(rename = "delay")]
    pub max_delay_ms: f64,
}

impl Intent {
    /// Create an intent
    pub const fn new(source: Host, destination: Host, max_delay_ms: f64) -> Self {
        Self {
            source,
            destination,
            max_delay_ms,
        }
    }

    /// Key of the demand
    pub const fn key(&self) -> FlowKey {
        FlowKey::new(self.source, self.destination)
    }

    /// Reject intents the fabric cannot carry
    pub fn validate(&self) -> SdnResult<()> {
        if !self.key().crosses_fabric() {
            return Err(SdnError::InvalidIntent(format!(
                "{} must go from an s1 host to an s5 host",
                self.key()
            )));
        }
        if !self.max_delay_ms.is_finite() || self.max_delay_ms <= 0.0 {
            return Err(SdnError::InvalidIntent(format!(
                "{} has budget {} ms",
                self.key(),
                self.max_delay_ms
            )));
        }
        Ok(())
    }
}

/// Binding of a demand to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Demand
    pub key: FlowKey,
    /// Chosen path
    pub path: PathId,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {}", self.key, self.path)
    }
}

/// Ordered set of routes with at most one route per key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingTable {
    routes: Vec<Route>,
    #[serde(skip)]
    index: HashMap<FlowKey, usize>,
}

impl RoutingTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key` to `path`, replacing any previous binding in place
    ///
    /// Returns the previous path if there was one.
    pub fn insert(&mut self, key: FlowKey, path: PathId) -> Option<PathId> {
        match self.index.get(&key) {
            Some(&i) => {
                let old = self.routes[i].path;
                self.routes[i].path = path;
                Some(old)
            }
            None => {
                self.index.insert(key, self.routes.len());
                self.routes.push(Route { key, path });
                None
            }
        }
    }

    /// Current path of a key
    pub fn path_for(&self, key: &FlowKey) -> Option<PathId> {
        self.index.get(key).map(|&i| self.routes[i].path)
    }

    /// Whether the key is routed
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.index.contains_key(key)
    }

    /// Routes in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no route is installed
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<Route> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        let mut table = Self::new();
        for route in iter {
            table.insert(route.key, route.path);
        }
        table
    }
}

/// Number of routes bound to each path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCounts(PerPath<u32>);

impl FlowCounts {
    /// All zero
    pub const fn new() -> Self {
        Self(PerPath::splat(0))
    }

    /// Count for a path
    #[inline]
    pub fn get(&self, path: PathId) -> u32 {
        self.0.get(path)
    }

    /// Add one route to a path
    #[inline]
    pub fn increment(&mut self, path: PathId) {
        self.0.set(path, self.0.get(path) + 1);
    }

    /// Sum over all paths
    pub fn total(&self) -> u32 {
        self.0.iter().map(|(_, c)| c).sum()
    }

    /// Path with the lowest count among `candidates`; ties go to the first
    pub fn least_loaded(&self, candidates: &[PathId]) -> Option<PathId> {
        let mut best: Option<PathId> = None;
        for &path in candidates {
            match best {
                Some(b) if self.get(path) >= self.get(b) => {}
                _ => best = Some(path),
            }
        }
        best
    }
}

impl fmt::Display for FlowCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A: {}; B: {}; C: {}",
            self.get(PathId::A),
            self.get(PathId::B),
            self.get(PathId::C)
        )
    }
}

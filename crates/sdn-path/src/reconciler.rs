//! Flow reconciliation between two routing tables
//!
//! Each route is realised by two rules: the forward direction on the ingress
//! switch `s1` and the reverse direction on the egress switch `s5`. A key seen
//! for the first time is added, a key whose path changed is modified in
//! place, and an unchanged key costs nothing.

use sdn_common::{
    FlowMatch, FlowMod, FlowModCommand, PathId, Route, RoutingTable, SwitchRole, PRIORITY_ROUTE,
};
use tracing::info;

/// Change required to move one key to its new route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOp {
    /// Key not installed before
    Install(Route),
    /// Key moved away from `from`
    Reroute {
        /// New binding
        route: Route,
        /// Previous path
        from: PathId,
    },
}

impl FlowOp {
    /// Route being installed
    pub fn route(&self) -> Route {
        match self {
            Self::Install(route) | Self::Reroute { route, .. } => *route,
        }
    }

    /// Flow table command realising the op
    pub fn command(&self) -> FlowModCommand {
        match self {
            Self::Install(_) => FlowModCommand::Add,
            Self::Reroute { .. } => FlowModCommand::ModifyStrict,
        }
    }

    /// Switch rules for this op
    pub fn flow_mods(&self) -> [(SwitchRole, FlowMod); 2] {
        route_flow_mods(&self.route(), self.command())
    }
}

/// Ops converging `previous` to `next`, in `next`'s order
pub fn reconcile(previous: &RoutingTable, next: &RoutingTable) -> Vec<FlowOp> {
    let mut ops = Vec::new();
    for route in next.iter() {
        match previous.path_for(&route.key) {
            Some(old) if old == route.path => {}
            Some(old) => {
                info!(flow = %route.key, from = %old, to = %route.path, "changed routing path");
                ops.push(FlowOp::Reroute {
                    route: *route,
                    from: old,
                });
            }
            None => {
                info!(flow = %route.key, path = %route.path, "new routing path");
                ops.push(FlowOp::Install(*route));
            }
        }
    }
    ops
}

/// Forward rule on `s1` and reverse rule on `s5` for a route
pub fn route_flow_mods(route: &Route, command: FlowModCommand) -> [(SwitchRole, FlowMod); 2] {
    let src = route.key.source.ip();
    let dst = route.key.destination.ip();
    [
        (
            SwitchRole::S1,
            FlowMod {
                command,
                matcher: FlowMatch::ipv4_pair(src, dst),
                out_port: route.path.ingress_port(),
                priority: PRIORITY_ROUTE,
            },
        ),
        (
            SwitchRole::S5,
            FlowMod {
                command,
                matcher: FlowMatch::ipv4_pair(dst, src),
                out_port: route.path.egress_port(),
                priority: PRIORITY_ROUTE,
            },
        ),
    ]
}

/// Rules removing an installed route
pub fn teardown_flow_mods(route: &Route) -> [(SwitchRole, FlowMod); 2] {
    route_flow_mods(route, FlowModCommand::DeleteStrict)
}

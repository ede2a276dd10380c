//! Static forwarding: transit rules, local delivery, ARP and unmatched traffic
//!
//! Everything here is independent of measured delays except for the default
//! path, which the caller passes in.

use sdn_common::{
    FlowMatch, FlowMod, FlowModCommand, Host, HostSide, PathId, PortNo, SwitchRole, ETH_TYPE_ARP,
    ETH_TYPE_IPV4, PRIORITY_ROUTE, PRIORITY_TRANSIT,
};
use std::net::Ipv4Addr;

/// Aggregation port facing `s1`
pub const AGG_PORT_INGRESS: PortNo = 1;
/// Aggregation port facing `s5`
pub const AGG_PORT_EGRESS: PortNo = 2;

/// Rules installed when a switch connects
pub fn base_flow_mods(switch: SwitchRole) -> Vec<FlowMod> {
    match switch {
        SwitchRole::S2 | SwitchRole::S3 | SwitchRole::S4 => transit_flow_mods(),
        SwitchRole::S1 | SwitchRole::S5 => Host::ALL
            .into_iter()
            .filter(|h| h.edge_switch() == switch)
            .map(local_delivery_flow_mod)
            .collect(),
    }
}

/// Aggregation switches bridge port 1 and port 2 for ARP and IPv4
pub fn transit_flow_mods() -> Vec<FlowMod> {
    let mut mods = Vec::with_capacity(4);
    for (from, to) in [(AGG_PORT_INGRESS, AGG_PORT_EGRESS), (AGG_PORT_EGRESS, AGG_PORT_INGRESS)] {
        for dl_type in [ETH_TYPE_ARP, ETH_TYPE_IPV4] {
            mods.push(FlowMod {
                command: FlowModCommand::Add,
                matcher: FlowMatch::from_port(dl_type, from),
                out_port: to,
                priority: PRIORITY_TRANSIT,
            });
        }
    }
    mods
}

/// IPv4 towards a host is delivered on its edge port
pub fn local_delivery_flow_mod(host: Host) -> FlowMod {
    FlowMod {
        command: FlowModCommand::Add,
        matcher: FlowMatch::ipv4_to(host.ip()),
        out_port: host.port(),
        priority: PRIORITY_ROUTE,
    }
}

/// Port out of an edge switch towards `dst`, crossing on `path` when needed
pub fn edge_out_port(switch: SwitchRole, dst: Host, path: PathId) -> Option<PortNo> {
    match (switch, dst.side()) {
        (SwitchRole::S1, HostSide::Ingress) | (SwitchRole::S5, HostSide::Egress) => Some(dst.port()),
        (SwitchRole::S1, HostSide::Egress) => Some(path.ingress_port()),
        (SwitchRole::S5, HostSide::Ingress) => Some(path.egress_port()),
        _ => None,
    }
}

/// Where an ARP request for `target` leaves an edge switch
pub fn arp_out_port(switch: SwitchRole, target: Ipv4Addr, default_path: PathId) -> Option<PortNo> {
    edge_out_port(switch, Host::from_ip(target)?, default_path)
}

/// Aggregation switches without transit rules forward to the opposite port
pub fn transit_out_port(in_port: PortNo) -> Option<PortNo> {
    match in_port {
        AGG_PORT_INGRESS => Some(AGG_PORT_EGRESS),
        AGG_PORT_EGRESS => Some(AGG_PORT_INGRESS),
        _ => None,
    }
}

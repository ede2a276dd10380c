//! Controller state machine
//!
//! [`Controller`] owns every piece of mutable state (switch bindings, delay
//! estimates, routing table, flow counts, scheduler phase) and turns one
//! [`ControllerEvent`] at a time into the [`ControlCommand`]s the transport
//! must send. It performs no I/O and never blocks, so the runtime can drive
//! it from a single task.

use bytes::Bytes;
use sdn_common::{
    ControlCommand, ControllerEvent, Dpid, FlowCounts, FlowKey, FlowMod, FlowModCommand, Host, Intent,
    ParsedPacket, PathId, PerPath, PortCounters, PortNo, Route, SdnError, SdnResult, SwitchRole, Target,
    Tenths,
};
use sdn_path::{
    encode_probe_frame, route_flow_mods, teardown_flow_mods, DelayEstimator, FlowOp, Measurement,
    ProbePhase, ProbeScheduler, RoutingState,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::counters::PortCounterHistory;
use crate::forwarding::{arp_out_port, base_flow_mods, edge_out_port, transit_out_port};

/// Role ↔ datapath bindings learned from connection events
#[derive(Debug, Default)]
pub struct SwitchRegistry {
    by_role: BTreeMap<SwitchRole, Dpid>,
    by_dpid: HashMap<Dpid, SwitchRole>,
}

impl SwitchRegistry {
    /// Bind a role; a previous datapath for the role is replaced
    pub fn bind(&mut self, role: SwitchRole, dpid: Dpid) {
        if let Some(old) = self.by_role.insert(role, dpid) {
            self.by_dpid.remove(&old);
        }
        if let Some(old_role) = self.by_dpid.insert(dpid, role) {
            if old_role != role {
                self.by_role.remove(&old_role);
            }
        }
    }

    /// Drop a datapath; returns its role
    pub fn unbind(&mut self, dpid: Dpid) -> Option<SwitchRole> {
        let role = self.by_dpid.remove(&dpid)?;
        self.by_role.remove(&role);
        Some(role)
    }

    /// Role of a datapath
    pub fn role(&self, dpid: Dpid) -> Option<SwitchRole> {
        self.by_dpid.get(&dpid).copied()
    }

    /// Command target for a connected role
    pub fn target(&self, role: SwitchRole) -> Option<Target> {
        self.by_role.get(&role).map(|&dpid| Target { role, dpid })
    }

    /// Command target, or [`SdnError::NotConnected`]
    pub fn require(&self, role: SwitchRole) -> SdnResult<Target> {
        self.target(role).ok_or_else(|| SdnError::NotConnected(role.to_string()))
    }

    /// All five roles bound
    pub fn complete(&self) -> bool {
        self.by_role.len() == SwitchRole::ALL.len()
    }
}

/// Diagnostic view of the controller
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    /// Scheduler running
    pub running: bool,
    /// Scheduler generation
    pub generation: u64,
    /// Next phase
    pub phase: ProbePhase,
    /// Delay estimates in ms
    pub delays: PerPath<f64>,
    /// Installed routes
    pub routes: Vec<Route>,
    /// Routes per path
    pub counts: FlowCounts,
    /// Path for unmatched traffic
    pub default_path: PathId,
    /// Observed flows without intent
    pub adhoc_flows: Vec<FlowKey>,
    /// Latest transmit delta on each path's s1 port
    pub path_tx_deltas: PerPath<u64>,
}

/// Delay-aware intent routing controller
#[derive(Debug)]
pub struct Controller {
    intents: Vec<Intent>,
    switches: SwitchRegistry,
    scheduler: ProbeScheduler,
    estimator: DelayEstimator,
    routing: RoutingState,
    counters: PortCounterHistory,
}

impl Controller {
    /// Create from a validated configuration
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            intents: config.intents.clone(),
            switches: SwitchRegistry::default(),
            scheduler: ProbeScheduler::new(),
            estimator: DelayEstimator::new(),
            routing: RoutingState::new(),
            counters: PortCounterHistory::new(),
        }
    }

    /// Current delay estimates
    pub fn delays(&self) -> PerPath<f64> {
        self.estimator.delays()
    }

    /// Delay estimator
    pub fn estimator(&self) -> &DelayEstimator {
        &self.estimator
    }

    /// Installed routing state
    pub fn routing(&self) -> &RoutingState {
        &self.routing
    }

    /// Scheduler
    pub fn scheduler(&self) -> &ProbeScheduler {
        &self.scheduler
    }

    /// Switch bindings
    pub fn switches(&self) -> &SwitchRegistry {
        &self.switches
    }

    /// Diagnostic view
    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            running: self.scheduler.is_running(),
            generation: self.scheduler.generation(),
            phase: self.scheduler.phase(),
            delays: self.estimator.delays(),
            routes: self.routing.routes().iter().copied().collect(),
            counts: self.routing.counts(),
            default_path: self.routing.default_path(),
            adhoc_flows: self.routing.adhoc().as_slice().to_vec(),
            path_tx_deltas: self.counters.path_tx_deltas(),
        }
    }

    /// Process one event received at `now`
    pub fn handle(&mut self, event: ControllerEvent, now: Tenths) -> Vec<ControlCommand> {
        match event {
            ControllerEvent::ConnectionUp { dpid, port_names } => self.on_connection_up(dpid, &port_names),
            ControllerEvent::ConnectionDown { dpid } => {
                self.on_connection_down(dpid);
                Vec::new()
            }
            ControllerEvent::PortStatsReceived { dpid, xid, ports } => {
                self.on_port_stats(dpid, xid, &ports, now);
                Vec::new()
            }
            ControllerEvent::PacketIn {
                dpid,
                in_port,
                packet,
                data,
            } => self.on_packet_in(dpid, in_port, packet, data, now),
            ControllerEvent::Tick => self.on_tick(now),
        }
    }

    /// Delete-strict every installed route
    pub fn teardown_all(&self) -> Vec<ControlCommand> {
        let mut commands = Vec::new();
        for route in self.routing.routes().iter() {
            for (role, flow_mod) in teardown_flow_mods(route) {
                self.push_flow_mod(&mut commands, role, flow_mod);
            }
        }
        commands
    }

    fn on_connection_up(&mut self, dpid: Dpid, port_names: &[String]) -> Vec<ControlCommand> {
        let Some(role) = port_names.iter().find_map(|n| SwitchRole::from_port_name(n)) else {
            debug!(%dpid, "connection from switch outside the diamond");
            return Vec::new();
        };
        self.switches.bind(role, dpid);
        info!(%role, %dpid, "switch connected");

        let mut commands = Vec::new();
        for flow_mod in base_flow_mods(role) {
            self.push_flow_mod(&mut commands, role, flow_mod);
        }
        // a reconnecting edge switch comes back with an empty table
        for route in self.routing.routes().iter() {
            for (switch, flow_mod) in route_flow_mods(route, FlowModCommand::Add) {
                if switch == role {
                    self.push_flow_mod(&mut commands, role, flow_mod);
                }
            }
        }

        if self.switches.complete() && self.scheduler.start() {
            info!(generation = self.scheduler.generation(), "all switches connected, probe scheduler started");
        }
        commands
    }

    fn on_connection_down(&mut self, dpid: Dpid) {
        let Some(role) = self.switches.unbind(dpid) else {
            return;
        };
        self.counters.forget(role);
        warn!(%role, %dpid, "switch disconnected");
        if self.scheduler.stop() {
            self.estimator.abandon_all();
            info!(generation = self.scheduler.generation(), "probe scheduler stopped");
        }
    }

    fn on_tick(&mut self, now: Tenths) -> Vec<ControlCommand> {
        match self.scheduler.tick() {
            None => Vec::new(),
            Some(ProbePhase::Recompute) => self.recompute(),
            Some(phase) => match phase.path() {
                Some(path) => self.start_measurement(path, now),
                None => Vec::new(),
            },
        }
    }

    fn start_measurement(&mut self, path: PathId, now: Tenths) -> Vec<ControlCommand> {
        let (near, far) = match (
            self.switches.require(SwitchRole::S1),
            self.switches.require(path.aggregation_switch()),
        ) {
            (Ok(near), Ok(far)) => (near, far),
            (Err(e), _) | (_, Err(e)) => {
                debug!(%path, error = %e, "skipping measurement");
                return Vec::new();
            }
        };

        let req = self.estimator.begin(path, now);
        debug!(%path, epoch = req.epoch, stamp = req.stamp, "probing path");
        vec![
            ControlCommand::StatsRequest {
                target: near,
                xid: req.near_xid,
            },
            ControlCommand::PacketOut {
                target: near,
                out_port: path.ingress_port(),
                data: encode_probe_frame(req.stamp),
            },
            ControlCommand::StatsRequest {
                target: far,
                xid: req.far_xid,
            },
        ]
    }

    fn recompute(&mut self) -> Vec<ControlCommand> {
        let delays = self.estimator.delays();
        let ops = self.routing.recompute(&delays, &self.intents);

        let mut commands = Vec::new();
        for op in &ops {
            for (role, flow_mod) in op.flow_mods() {
                self.push_flow_mod(&mut commands, role, flow_mod);
            }
        }

        info!(
            delay_a = delays.get(PathId::A),
            delay_b = delays.get(PathId::B),
            delay_c = delays.get(PathId::C),
            counts = %self.routing.counts(),
            default_path = %self.routing.default_path(),
            changes = ops.len(),
            "routing recomputed"
        );
        for route in self.routing.routes().iter() {
            debug!(%route, "current routing");
        }
        commands
    }

    fn on_port_stats(&mut self, dpid: Dpid, xid: u32, ports: &[PortCounters], now: Tenths) {
        let Some(role) = self.switches.role(dpid) else {
            debug!(%dpid, "statistics from unknown datapath");
            return;
        };
        self.counters.update(role, ports);
        let outcome = self.estimator.record_stats_reply(role, xid, now);
        self.log_measurement(role, outcome);
    }

    fn on_packet_in(
        &mut self,
        dpid: Dpid,
        in_port: PortNo,
        packet: ParsedPacket,
        data: Bytes,
        now: Tenths,
    ) -> Vec<ControlCommand> {
        let Some(role) = self.switches.role(dpid) else {
            debug!(%dpid, "packet-in from unknown datapath");
            return Vec::new();
        };

        match packet {
            ParsedPacket::Probe { payload } => {
                match self.estimator.record_probe(role, &payload, now) {
                    Ok(outcome) => self.log_measurement(role, outcome),
                    Err(e) => warn!(%role, error = %e, "dropping probe"),
                }
                Vec::new()
            }
            ParsedPacket::Arp { target_ip, .. } => match role {
                SwitchRole::S1 | SwitchRole::S5 => self.forward_arp(role, target_ip, data),
                _ => self.forward_transit(role, in_port, data),
            },
            ParsedPacket::Ipv4 { src, dst } => match role {
                SwitchRole::S1 => self.on_ingress_ipv4(src, dst, data),
                SwitchRole::S5 => self.on_egress_ipv4(src, dst, data),
                _ => self.forward_transit(role, in_port, data),
            },
            ParsedPacket::Other { eth_type } => {
                debug!(%role, eth_type, "ignoring packet-in");
                Vec::new()
            }
        }
    }

    fn forward_arp(&self, role: SwitchRole, target_ip: Ipv4Addr, data: Bytes) -> Vec<ControlCommand> {
        match arp_out_port(role, target_ip, self.routing.default_path()) {
            Some(out_port) => self.packet_out(role, out_port, data).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn forward_transit(&self, role: SwitchRole, in_port: PortNo, data: Bytes) -> Vec<ControlCommand> {
        match transit_out_port(in_port) {
            Some(out_port) => self.packet_out(role, out_port, data).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// First packet of a flow entering at s1
    fn on_ingress_ipv4(&mut self, src: Ipv4Addr, dst: Ipv4Addr, data: Bytes) -> Vec<ControlCommand> {
        let Some(dst_host) = Host::from_ip(dst) else {
            return Vec::new();
        };
        let key = Host::from_ip(src).map(|s| FlowKey::new(s, dst_host));

        let mut commands = Vec::new();
        let path = match key {
            Some(key) if key.crosses_fabric() => self.route_for_new_flow(key, &mut commands),
            _ => self.routing.default_path(),
        };
        if let Some(out_port) = edge_out_port(SwitchRole::S1, dst_host, path) {
            commands.extend(self.packet_out(SwitchRole::S1, out_port, data));
        }
        commands
    }

    /// Path for a crossing flow, admitting it if it has neither route nor intent
    fn route_for_new_flow(&mut self, key: FlowKey, commands: &mut Vec<ControlCommand>) -> PathId {
        if let Some(path) = self.routing.routes().path_for(&key) {
            return path;
        }
        if self.intents.iter().any(|i| i.key() == key) {
            debug!(flow = %key, "intent not yet routed, using default path");
            return self.routing.default_path();
        }
        match self.routing.admit(key) {
            Some(route) => {
                for (role, flow_mod) in FlowOp::Install(route).flow_mods() {
                    self.push_flow_mod(commands, role, flow_mod);
                }
                route.path
            }
            None => self.routing.default_path(),
        }
    }

    /// Packet reaching s5 without a matching rule
    fn on_egress_ipv4(&self, src: Ipv4Addr, dst: Ipv4Addr, data: Bytes) -> Vec<ControlCommand> {
        let Some(dst_host) = Host::from_ip(dst) else {
            return Vec::new();
        };
        // reverse traffic follows the forward route when there is one
        let path = Host::from_ip(src)
            .and_then(|s| self.routing.routes().path_for(&FlowKey::new(dst_host, s)))
            .unwrap_or_else(|| self.routing.default_path());
        match edge_out_port(SwitchRole::S5, dst_host, path) {
            Some(out_port) => self.packet_out(SwitchRole::S5, out_port, data).into_iter().collect(),
            None => Vec::new(),
        }
    }

    fn packet_out(&self, role: SwitchRole, out_port: PortNo, data: Bytes) -> Option<ControlCommand> {
        let target = self.switches.target(role)?;
        Some(ControlCommand::PacketOut {
            target,
            out_port,
            data,
        })
    }

    fn push_flow_mod(&self, commands: &mut Vec<ControlCommand>, role: SwitchRole, flow_mod: FlowMod) {
        match self.switches.require(role) {
            Ok(target) => commands.push(ControlCommand::FlowMod { target, flow_mod }),
            Err(e) => debug!(error = %e, "flow modification skipped"),
        }
    }

    fn log_measurement(&self, role: SwitchRole, outcome: Measurement) {
        match outcome {
            Measurement::Pending => {}
            Measurement::Completed(sample) => info!(
                path = %sample.path,
                delay_ms = sample.delay_ms,
                ctrl_near_ms = sample.ctrl_near_ms,
                ctrl_far_ms = sample.ctrl_far_ms,
                "path delay measured"
            ),
            Measurement::Stale(reason) => warn!(%role, ?reason, "discarding stale measurement input"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_path::probe::probe_payload;

    fn dpid(role: SwitchRole) -> Dpid {
        Dpid(role as u64 + 1)
    }

    fn connect(ctl: &mut Controller, role: SwitchRole) -> Vec<ControlCommand> {
        let port_names = (1..=3).map(|i| format!("{}-eth{}", role, i)).collect();
        ctl.handle(
            ControllerEvent::ConnectionUp {
                dpid: dpid(role),
                port_names,
            },
            Tenths(0),
        )
    }

    fn connected() -> Controller {
        let mut ctl = Controller::new(&ControllerConfig::default());
        for role in SwitchRole::ALL {
            connect(&mut ctl, role);
        }
        ctl
    }

    fn flow_mods(commands: &[ControlCommand]) -> Vec<(SwitchRole, FlowMod)> {
        commands
            .iter()
            .filter_map(|c| c.as_flow_mod().map(|(t, m)| (t.role, *m)))
            .collect()
    }

    fn ipv4_in(ctl: &mut Controller, role: SwitchRole, src: Host, dst: Host) -> Vec<ControlCommand> {
        ctl.handle(
            ControllerEvent::PacketIn {
                dpid: dpid(role),
                in_port: src.port(),
                packet: ParsedPacket::Ipv4 {
                    src: src.ip(),
                    dst: dst.ip(),
                },
                data: Bytes::from_static(b"frame"),
            },
            Tenths(0),
        )
    }

    /// Run one measurement phase with symmetric control latency
    fn measure(ctl: &mut Controller, start: Tenths, ctrl: u64, path_delay: u64) {
        let commands = ctl.handle(ControllerEvent::Tick, start);
        assert_eq!(commands.len(), 3);

        let mut probe = None;
        for command in commands {
            match command {
                ControlCommand::StatsRequest { target, xid } => {
                    let reply = ControllerEvent::PortStatsReceived {
                        dpid: target.dpid,
                        xid,
                        ports: Vec::new(),
                    };
                    assert!(ctl.handle(reply, start + 2 * ctrl).is_empty());
                }
                ControlCommand::PacketOut { out_port, data, .. } => {
                    probe = Some((PathId::from_ingress_port(out_port).unwrap(), data));
                }
                ControlCommand::FlowMod { .. } => panic!("unexpected flow mod"),
            }
        }

        let (path, frame) = probe.unwrap();
        let payload = Bytes::copy_from_slice(probe_payload(&frame).unwrap());
        let arrival = ControllerEvent::PacketIn {
            dpid: dpid(path.aggregation_switch()),
            in_port: 1,
            packet: ParsedPacket::Probe { payload },
            data: frame,
        };
        assert!(ctl.handle(arrival, start + 2 * ctrl + path_delay).is_empty());
        assert!(!ctl.estimator().in_flight(path));
    }

    #[test]
    fn test_registry_rebind() {
        let mut reg = SwitchRegistry::default();
        reg.bind(SwitchRole::S1, Dpid(7));
        reg.bind(SwitchRole::S1, Dpid(8));
        assert_eq!(reg.role(Dpid(7)), None);
        assert_eq!(reg.target(SwitchRole::S1).unwrap().dpid, Dpid(8));
        assert_eq!(reg.unbind(Dpid(8)), Some(SwitchRole::S1));
        assert!(reg.require(SwitchRole::S1).is_err());
    }

    #[test]
    fn test_scheduler_starts_with_full_fabric() {
        let mut ctl = Controller::new(&ControllerConfig::default());
        let commands = connect(&mut ctl, SwitchRole::S2);
        assert_eq!(flow_mods(&commands).len(), 4);
        assert!(!ctl.scheduler().is_running());

        for role in [SwitchRole::S1, SwitchRole::S3, SwitchRole::S4, SwitchRole::S5] {
            connect(&mut ctl, role);
        }
        assert!(ctl.switches().complete());
        assert!(ctl.scheduler().is_running());
        assert_eq!(ctl.scheduler().generation(), 1);
    }

    #[test]
    fn test_unknown_switch_ignored() {
        let mut ctl = Controller::new(&ControllerConfig::default());
        let commands = ctl.handle(
            ControllerEvent::ConnectionUp {
                dpid: Dpid(42),
                port_names: vec!["r1-eth1".into()],
            },
            Tenths(0),
        );
        assert!(commands.is_empty());
        assert!(ctl.switches().role(Dpid(42)).is_none());
    }

    #[test]
    fn test_measure_phase_commands() {
        let mut ctl = connected();
        let commands = ctl.handle(ControllerEvent::Tick, Tenths(1000));
        assert_eq!(commands.len(), 3);

        match (&commands[0], &commands[1], &commands[2]) {
            (
                ControlCommand::StatsRequest { target: near, .. },
                ControlCommand::PacketOut { target, out_port, .. },
                ControlCommand::StatsRequest { target: far, .. },
            ) => {
                assert_eq!(near.role, SwitchRole::S1);
                assert_eq!(target.role, SwitchRole::S1);
                assert_eq!(*out_port, 4);
                assert_eq!(far.role, SwitchRole::S2);
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn test_full_cycle_installs_intents() {
        let mut ctl = connected();
        let mut now = Tenths(10_000);
        // one-way delays in tenths: A 90 ms, B 50 ms, C 10 ms
        for delay in [900, 500, 100] {
            measure(&mut ctl, now, 20, delay);
            now = now + 10_000;
        }
        assert_eq!(ctl.delays(), PerPath([90.0, 50.0, 10.0]));

        let commands = ctl.handle(ControllerEvent::Tick, now);
        let mods = flow_mods(&commands);
        assert_eq!(mods.len(), 12);
        assert!(mods.iter().all(|(_, m)| m.command == FlowModCommand::Add));

        let routes = ctl.routing().routes();
        assert_eq!(routes.path_for(&FlowKey::new(Host::H1, Host::H6)), Some(PathId::C));
        assert_eq!(ctl.routing().counts().total(), 6);
        assert_eq!(ctl.routing().default_path(), PathId::C);

        // nothing changed: the next recompute sends nothing
        for delay in [900, 500, 100] {
            now = now + 10_000;
            measure(&mut ctl, now, 20, delay);
        }
        assert!(ctl.handle(ControllerEvent::Tick, now + 10_000).is_empty());
    }

    #[test]
    fn test_adhoc_flow_admitted_once() {
        let mut ctl = connected();
        let commands = ipv4_in(&mut ctl, SwitchRole::S1, Host::H3, Host::H4);
        let mods = flow_mods(&commands);
        assert_eq!(mods.len(), 2);
        // before any recompute the ranking is A, B, C and all counts are zero
        assert_eq!(mods[0].1.out_port, PathId::A.ingress_port());
        assert!(matches!(
            commands.last(),
            Some(ControlCommand::PacketOut { out_port: 4, .. })
        ));

        let again = ipv4_in(&mut ctl, SwitchRole::S1, Host::H3, Host::H4);
        assert!(flow_mods(&again).is_empty());
        assert_eq!(again.len(), 1);
        assert_eq!(ctl.routing().adhoc().len(), 1);
    }

    #[test]
    fn test_intent_pair_not_admitted() {
        let mut ctl = connected();
        let commands = ipv4_in(&mut ctl, SwitchRole::S1, Host::H1, Host::H4);
        assert!(flow_mods(&commands).is_empty());
        assert!(matches!(
            commands.as_slice(),
            [ControlCommand::PacketOut { out_port: 6, .. }]
        ));
        assert!(ctl.routing().adhoc().is_empty());
    }

    #[test]
    fn test_local_and_egress_forwarding() {
        let mut ctl = connected();
        let local = ipv4_in(&mut ctl, SwitchRole::S1, Host::H1, Host::H2);
        assert!(matches!(local.as_slice(), [ControlCommand::PacketOut { out_port: 2, .. }]));

        let reverse = ipv4_in(&mut ctl, SwitchRole::S5, Host::H5, Host::H2);
        assert!(matches!(reverse.as_slice(), [ControlCommand::PacketOut { out_port: 3, .. }]));

        let transit = ipv4_in(&mut ctl, SwitchRole::S3, Host::H1, Host::H5);
        assert!(matches!(transit.as_slice(), [ControlCommand::PacketOut { out_port: 2, .. }]));
    }

    #[test]
    fn test_arp_follows_default_path() {
        let mut ctl = connected();
        let commands = ctl.handle(
            ControllerEvent::PacketIn {
                dpid: dpid(SwitchRole::S1),
                in_port: 1,
                packet: ParsedPacket::Arp {
                    sender_ip: Host::H1.ip(),
                    target_ip: Host::H5.ip(),
                },
                data: Bytes::from_static(b"arp"),
            },
            Tenths(0),
        );
        assert!(matches!(commands.as_slice(), [ControlCommand::PacketOut { out_port: 6, .. }]));
    }

    #[test]
    fn test_arp_transit_at_aggregation() {
        let mut ctl = connected();
        let arp = ParsedPacket::Arp {
            sender_ip: Host::H1.ip(),
            target_ip: Host::H5.ip(),
        };
        let commands = ctl.handle(
            ControllerEvent::PacketIn {
                dpid: dpid(SwitchRole::S3),
                in_port: 1,
                packet: arp.clone(),
                data: Bytes::from_static(b"arp"),
            },
            Tenths(0),
        );
        assert!(matches!(
            commands.as_slice(),
            [ControlCommand::PacketOut { target, out_port: 2, .. }] if target.role == SwitchRole::S3
        ));

        let back = ctl.handle(
            ControllerEvent::PacketIn {
                dpid: dpid(SwitchRole::S4),
                in_port: 2,
                packet: arp,
                data: Bytes::from_static(b"arp"),
            },
            Tenths(0),
        );
        assert!(matches!(back.as_slice(), [ControlCommand::PacketOut { out_port: 1, .. }]));
    }

    #[test]
    fn test_missing_switch_skips_measurement() {
        let mut ctl = connected();
        let mut now = Tenths(10_000);
        for delay in [900, 500, 100] {
            measure(&mut ctl, now, 20, delay);
            now = now + 10_000;
        }
        ctl.handle(ControllerEvent::Tick, now);

        // s3's datapath id now belongs to s2, leaving s3 unbound
        ctl.handle(
            ControllerEvent::ConnectionUp {
                dpid: dpid(SwitchRole::S3),
                port_names: vec!["s2-eth1".into()],
            },
            now,
        );
        assert!(ctl.switches().target(SwitchRole::S3).is_none());
        assert!(ctl.scheduler().is_running());

        assert_eq!(ctl.handle(ControllerEvent::Tick, now + 10_000).len(), 3);
        assert_eq!(ctl.scheduler().phase(), ProbePhase::MeasurePathB);
        assert!(ctl.handle(ControllerEvent::Tick, now + 20_000).is_empty());
        assert!(!ctl.estimator().in_flight(PathId::B));
        assert_eq!(ctl.delays().get(PathId::B), 50.0);
        assert_eq!(ctl.scheduler().phase(), ProbePhase::MeasurePathC);
    }

    #[test]
    fn test_disconnect_stops_probing() {
        let mut ctl = connected();
        ctl.handle(ControllerEvent::Tick, Tenths(0));
        assert!(ctl.estimator().in_flight(PathId::A));

        ctl.handle(ControllerEvent::ConnectionDown { dpid: dpid(SwitchRole::S3) }, Tenths(10));
        assert!(!ctl.scheduler().is_running());
        assert!(!ctl.estimator().in_flight(PathId::A));
        assert!(ctl.handle(ControllerEvent::Tick, Tenths(20)).is_empty());

        connect(&mut ctl, SwitchRole::S3);
        assert!(ctl.scheduler().is_running());
        assert_eq!(ctl.scheduler().generation(), 2);
        assert_eq!(ctl.scheduler().phase(), ProbePhase::MeasurePathA);
    }

    #[test]
    fn test_malformed_probe_ignored() {
        let mut ctl = connected();
        ctl.handle(ControllerEvent::Tick, Tenths(0));
        let commands = ctl.handle(
            ControllerEvent::PacketIn {
                dpid: dpid(SwitchRole::S2),
                in_port: 1,
                packet: ParsedPacket::Probe {
                    payload: Bytes::from_static(&[1, 2]),
                },
                data: Bytes::new(),
            },
            Tenths(5),
        );
        assert!(commands.is_empty());
        assert_eq!(ctl.delays(), PerPath::splat(0.0));
    }

    #[test]
    fn test_teardown_deletes_routes() {
        let mut ctl = connected();
        ipv4_in(&mut ctl, SwitchRole::S1, Host::H3, Host::H5);
        let mods = flow_mods(&ctl.teardown_all());
        assert_eq!(mods.len(), 2);
        assert!(mods.iter().all(|(_, m)| m.command == FlowModCommand::DeleteStrict));
        assert_eq!(mods[0].0, SwitchRole::S1);
        assert_eq!(mods[1].0, SwitchRole::S5);
    }

    #[test]
    fn test_snapshot_serializes() {
        let ctl = connected();
        let json = serde_json::to_value(ctl.snapshot()).unwrap();
        assert_eq!(json["running"], true);
        assert_eq!(json["default_path"], "C");
    }
}

//! In-process emulation of the diamond fabric
//!
//! Stands in for the five switches behind the control channel: statistics
//! requests are answered after a control-channel round trip, probes sent out
//! of `s1` surface at the aggregation switch after the configured path delay,
//! and flow modifications are applied to per-switch tables that tests can
//! inspect. Data traffic is not forwarded.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sdn_common::{
    ControlCommand, ControllerEvent, Dpid, FlowMatch, FlowMod, FlowModCommand, ParsedPacket, PathId, PortCounters,
    PortNo, SdnError, SdnResult, SwitchRole,
};
use sdn_path::probe::probe_payload;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::channel::ControlChannel;
use crate::config::EmulatorConfig;
use crate::forwarding::AGG_PORT_INGRESS;

/// Datapath id the emulator assigns to a role
pub fn emulated_dpid(role: SwitchRole) -> Dpid {
    Dpid(role as u64 + 1)
}

fn port_names(role: SwitchRole) -> Vec<String> {
    let ports = match role {
        SwitchRole::S1 | SwitchRole::S5 => 6,
        _ => 2,
    };
    (1..=ports).map(|i| format!("{}-eth{}", role, i)).collect()
}

/// Emulated switches behind a [`ControlChannel`]
pub struct EmulatedFabric {
    config: EmulatorConfig,
    events: mpsc::Sender<ControllerEvent>,
    tables: Mutex<BTreeMap<SwitchRole, Vec<FlowMod>>>,
    tx_packets: Mutex<BTreeMap<(SwitchRole, PortNo), u64>>,
}

impl EmulatedFabric {
    /// Create a fabric that reports to `events`
    pub fn new(config: EmulatorConfig, events: mpsc::Sender<ControllerEvent>) -> Self {
        Self {
            config,
            events,
            tables: Mutex::new(BTreeMap::new()),
            tx_packets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Announce every switch
    pub async fn connect_all(&self) -> SdnResult<()> {
        for role in SwitchRole::ALL {
            self.connect(role).await?;
        }
        Ok(())
    }

    /// Announce one switch; its flow table starts empty
    pub async fn connect(&self, role: SwitchRole) -> SdnResult<()> {
        self.tables.lock().insert(role, Vec::new());
        self.emit(ControllerEvent::ConnectionUp {
            dpid: emulated_dpid(role),
            port_names: port_names(role),
        })
        .await
    }

    /// Drop one switch's control connection
    pub async fn disconnect(&self, role: SwitchRole) -> SdnResult<()> {
        self.tables.lock().remove(&role);
        self.emit(ControllerEvent::ConnectionDown {
            dpid: emulated_dpid(role),
        })
        .await
    }

    /// Installed rules of a switch
    pub fn flow_table(&self, role: SwitchRole) -> Vec<FlowMod> {
        self.tables.lock().get(&role).cloned().unwrap_or_default()
    }

    /// Output port of the rule with exactly this match, if installed
    pub fn rule_out_port(&self, role: SwitchRole, matcher: &FlowMatch) -> Option<PortNo> {
        self.tables
            .lock()
            .get(&role)?
            .iter()
            .find(|m| m.matcher == *matcher)
            .map(|m| m.out_port)
    }

    /// Packets the controller sent out of a port
    pub fn tx_packets(&self, role: SwitchRole, port: PortNo) -> u64 {
        self.tx_packets.lock().get(&(role, port)).copied().unwrap_or(0)
    }

    fn control_latency(&self) -> Duration {
        Duration::from_millis(self.config.control_latency_ms)
    }

    fn path_delay(&self, path: PathId) -> Duration {
        let ms = match path {
            PathId::A => self.config.path_a_delay_ms,
            PathId::B => self.config.path_b_delay_ms,
            PathId::C => self.config.path_c_delay_ms,
        };
        Duration::from_millis(ms)
    }

    async fn emit(&self, event: ControllerEvent) -> SdnResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|e| SdnError::Channel(e.to_string()))
    }

    /// Deliver `event` after `after` from a detached task
    fn emit_later(&self, event: ControllerEvent, after: Duration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if events.send(event).await.is_err() {
                debug!("controller gone, dropping emulated event");
            }
        });
    }

    fn port_counters(&self, role: SwitchRole) -> Vec<PortCounters> {
        self.tx_packets
            .lock()
            .iter()
            .filter(|((r, _), _)| *r == role)
            .map(|(&(_, port_no), &tx)| PortCounters {
                port_no,
                rx_packets: 0,
                tx_packets: tx,
            })
            .collect()
    }

    fn packet_out(&self, role: SwitchRole, out_port: PortNo, data: Bytes) {
        *self.tx_packets.lock().entry((role, out_port)).or_insert(0) += 1;

        let path = match (role, PathId::from_ingress_port(out_port)) {
            (SwitchRole::S1, Some(path)) => path,
            _ => return,
        };
        let Ok(payload) = probe_payload(&data) else {
            trace!(%role, out_port, "data packet-out not forwarded");
            return;
        };
        let payload = Bytes::copy_from_slice(payload);
        let aggregation = path.aggregation_switch();
        if !self.tables.lock().contains_key(&aggregation) {
            return;
        }

        let after = self.control_latency() + self.path_delay(path) + self.control_latency();
        self.emit_later(
            ControllerEvent::PacketIn {
                dpid: emulated_dpid(aggregation),
                in_port: AGG_PORT_INGRESS,
                packet: ParsedPacket::Probe { payload },
                data,
            },
            after,
        );
    }

    fn apply_flow_mod(&self, role: SwitchRole, flow_mod: FlowMod) -> SdnResult<()> {
        let mut tables = self.tables.lock();
        let table = tables
            .get_mut(&role)
            .ok_or_else(|| SdnError::NotConnected(role.to_string()))?;
        let existing = table
            .iter()
            .position(|m| m.matcher == flow_mod.matcher && m.priority == flow_mod.priority);

        match (flow_mod.command, existing) {
            (FlowModCommand::Add | FlowModCommand::ModifyStrict, Some(i)) => {
                table[i].out_port = flow_mod.out_port;
            }
            (FlowModCommand::Add | FlowModCommand::ModifyStrict, None) => {
                table.push(FlowMod {
                    command: FlowModCommand::Add,
                    ..flow_mod
                });
            }
            (FlowModCommand::DeleteStrict, Some(i)) => {
                table.remove(i);
            }
            (FlowModCommand::DeleteStrict, None) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl ControlChannel for EmulatedFabric {
    async fn send(&self, command: ControlCommand) -> SdnResult<()> {
        let target = command.target();
        if target.dpid != emulated_dpid(target.role) {
            return Err(SdnError::UnknownDatapath(target.dpid));
        }

        match command {
            ControlCommand::StatsRequest { target, xid } => {
                let reply = ControllerEvent::PortStatsReceived {
                    dpid: target.dpid,
                    xid,
                    ports: self.port_counters(target.role),
                };
                self.emit_later(reply, 2 * self.control_latency());
            }
            ControlCommand::PacketOut { target, out_port, data } => self.packet_out(target.role, out_port, data),
            ControlCommand::FlowMod { target, flow_mod } => self.apply_flow_mod(target.role, flow_mod)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdn_common::{Host, Target, PRIORITY_ROUTE};
    use sdn_path::encode_probe_frame;
    use tokio_test::{assert_err, assert_ok};

    fn fabric() -> (EmulatedFabric, mpsc::Receiver<ControllerEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (EmulatedFabric::new(EmulatorConfig::default(), tx), rx)
    }

    fn target(role: SwitchRole) -> Target {
        Target {
            role,
            dpid: emulated_dpid(role),
        }
    }

    fn route_rule(command: FlowModCommand, out_port: PortNo) -> ControlCommand {
        ControlCommand::FlowMod {
            target: target(SwitchRole::S1),
            flow_mod: FlowMod {
                command,
                matcher: FlowMatch::ipv4_pair(Host::H1.ip(), Host::H4.ip()),
                out_port,
                priority: PRIORITY_ROUTE,
            },
        }
    }

    #[tokio::test]
    async fn test_connect_announces_roles() {
        let (fabric, mut rx) = fabric();
        fabric.connect_all().await.unwrap();

        for role in SwitchRole::ALL {
            match rx.recv().await.unwrap() {
                ControllerEvent::ConnectionUp { dpid, port_names } => {
                    assert_eq!(dpid, emulated_dpid(role));
                    assert_eq!(SwitchRole::from_port_name(&port_names[0]), Some(role));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_flow_table_commands() {
        let (fabric, _rx) = fabric();
        fabric.connect(SwitchRole::S1).await.unwrap();
        let matcher = FlowMatch::ipv4_pair(Host::H1.ip(), Host::H4.ip());

        assert_ok!(fabric.send(route_rule(FlowModCommand::Add, 4)).await);
        assert_eq!(fabric.rule_out_port(SwitchRole::S1, &matcher), Some(4));

        assert_ok!(fabric.send(route_rule(FlowModCommand::ModifyStrict, 6)).await);
        assert_eq!(fabric.rule_out_port(SwitchRole::S1, &matcher), Some(6));
        assert_eq!(fabric.flow_table(SwitchRole::S1).len(), 1);

        assert_ok!(fabric.send(route_rule(FlowModCommand::DeleteStrict, 6)).await);
        assert!(fabric.flow_table(SwitchRole::S1).is_empty());
    }

    #[tokio::test]
    async fn test_flow_mod_to_absent_switch_fails() {
        let (fabric, _rx) = fabric();
        let err = assert_err!(fabric.send(route_rule(FlowModCommand::Add, 4)).await);
        assert!(matches!(err, SdnError::NotConnected(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_surfaces_after_path_delay() {
        let (fabric, mut rx) = fabric();
        fabric.connect_all().await.unwrap();
        for _ in SwitchRole::ALL {
            rx.recv().await.unwrap();
        }

        let start = tokio::time::Instant::now();
        fabric
            .send(ControlCommand::PacketOut {
                target: target(SwitchRole::S1),
                out_port: PathId::B.ingress_port(),
                data: encode_probe_frame(1234),
            })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ControllerEvent::PacketIn { dpid, packet, .. } => {
                assert_eq!(dpid, emulated_dpid(SwitchRole::S3));
                assert!(matches!(packet, ParsedPacket::Probe { .. }));
            }
            other => panic!("unexpected event {:?}", other),
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(54) && elapsed < Duration::from_millis(56));
        assert_eq!(fabric.tx_packets(SwitchRole::S1, 5), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_reply_echoes_xid() {
        let (fabric, mut rx) = fabric();
        fabric
            .send(ControlCommand::StatsRequest {
                target: target(SwitchRole::S4),
                xid: 77,
            })
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ControllerEvent::PortStatsReceived { dpid, xid, .. } => {
                assert_eq!(dpid, emulated_dpid(SwitchRole::S4));
                assert_eq!(xid, 77);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}

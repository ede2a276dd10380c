//! Port counter history from statistics replies
//!
//! Kept for diagnostics only; routing decisions do not read it.

use sdn_common::{PathId, PerPath, PortCounters, PortNo, SwitchRole, OFPP_MAX_PHYSICAL};
use serde::Serialize;
use std::collections::BTreeMap;

/// Last two transmit samples of a port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortHistory {
    /// Previous `tx_packets`
    pub previous_tx: u64,
    /// Latest `tx_packets`
    pub current_tx: u64,
    /// Latest `rx_packets`
    pub current_rx: u64,
}

impl PortHistory {
    /// Packets sent between the last two replies
    pub fn tx_delta(&self) -> u64 {
        self.current_tx.saturating_sub(self.previous_tx)
    }
}

/// Counter history per switch and port
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortCounterHistory {
    ports: BTreeMap<SwitchRole, BTreeMap<PortNo, PortHistory>>,
}

impl PortCounterHistory {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a statistics reply in; reserved ports are skipped
    pub fn update(&mut self, switch: SwitchRole, counters: &[PortCounters]) {
        let ports = self.ports.entry(switch).or_default();
        for c in counters.iter().filter(|c| c.port_no <= OFPP_MAX_PHYSICAL) {
            let entry = ports.entry(c.port_no).or_default();
            entry.previous_tx = entry.current_tx;
            entry.current_tx = c.tx_packets;
            entry.current_rx = c.rx_packets;
        }
    }

    /// History of one port
    pub fn port(&self, switch: SwitchRole, port: PortNo) -> Option<PortHistory> {
        self.ports.get(&switch)?.get(&port).copied()
    }

    /// Latest transmit delta on each path's `s1` egress port
    pub fn path_tx_deltas(&self) -> PerPath<u64> {
        let mut deltas = PerPath::splat(0);
        for path in PathId::ALL {
            if let Some(h) = self.port(SwitchRole::S1, path.ingress_port()) {
                deltas.set(path, h.tx_delta());
            }
        }
        deltas
    }

    /// Forget a disconnected switch
    pub fn forget(&mut self, switch: SwitchRole) {
        self.ports.remove(&switch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(port_no: PortNo, tx: u64) -> PortCounters {
        PortCounters {
            port_no,
            rx_packets: 0,
            tx_packets: tx,
        }
    }

    #[test]
    fn test_history_shifts() {
        let mut h = PortCounterHistory::new();
        h.update(SwitchRole::S1, &[sample(4, 10), sample(5, 3)]);
        h.update(SwitchRole::S1, &[sample(4, 25), sample(5, 3)]);

        assert_eq!(h.port(SwitchRole::S1, 4).unwrap().tx_delta(), 15);
        let deltas = h.path_tx_deltas();
        assert_eq!(deltas.get(PathId::A), 15);
        assert_eq!(deltas.get(PathId::B), 0);
    }

    #[test]
    fn test_reserved_ports_skipped() {
        let mut h = PortCounterHistory::new();
        h.update(SwitchRole::S2, &[sample(0xFFFE, 99), sample(1, 1)]);
        assert!(h.port(SwitchRole::S2, 0xFFFE).is_none());
        assert!(h.port(SwitchRole::S2, 1).is_some());

        h.forget(SwitchRole::S2);
        assert!(h.port(SwitchRole::S2, 1).is_none());
    }
}

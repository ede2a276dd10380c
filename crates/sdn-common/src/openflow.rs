//! Control-channel vocabulary
//!
//! The wire transport is out of scope: these are the already-parsed events the
//! controller receives and the commands it asks the transport to send.

use crate::{PortNo, SwitchRole};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Ethertype for IPv4
pub const ETH_TYPE_IPV4: u16 = 0x0800;
/// Ethertype for ARP
pub const ETH_TYPE_ARP: u16 = 0x0806;
/// Unregistered ethertype reserved for delay probes
pub const ETH_TYPE_PROBE: u16 = 0x5577;

/// Highest physical port number; above are reserved ports (LOCAL, NONE)
pub const OFPP_MAX_PHYSICAL: PortNo = 0xFFFD;

/// Priority of per-demand and local delivery rules
pub const PRIORITY_ROUTE: u16 = 100;
/// Priority of aggregation transit rules
pub const PRIORITY_TRANSIT: u16 = 10;

/// OpenFlow datapath id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Dpid(pub u64);

impl fmt::Display for Dpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// Switch addressed by a command: role for the controller, dpid for the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// Logical role
    pub role: SwitchRole,
    /// Datapath bound to the role
    pub dpid: Dpid,
}

/// Flow match fields used by this controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    /// Ethertype
    pub dl_type: u16,
    /// Source IPv4
    pub nw_src: Option<Ipv4Addr>,
    /// Destination IPv4
    pub nw_dst: Option<Ipv4Addr>,
    /// Ingress port
    pub in_port: Option<PortNo>,
}

impl FlowMatch {
    /// IPv4 traffic between two addresses
    pub const fn ipv4_pair(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            dl_type: ETH_TYPE_IPV4,
            nw_src: Some(src),
            nw_dst: Some(dst),
            in_port: None,
        }
    }

    /// IPv4 traffic to an address
    pub const fn ipv4_to(dst: Ipv4Addr) -> Self {
        Self {
            dl_type: ETH_TYPE_IPV4,
            nw_src: None,
            nw_dst: Some(dst),
            in_port: None,
        }
    }

    /// Any frame of `dl_type` entering on `in_port`
    pub const fn from_port(dl_type: u16, in_port: PortNo) -> Self {
        Self {
            dl_type,
            nw_src: None,
            nw_dst: None,
            in_port: Some(in_port),
        }
    }
}

/// Flow table command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowModCommand {
    /// Insert a new entry
    Add,
    /// Replace the actions of the entry with identical match and priority
    ModifyStrict,
    /// Remove the entry with identical match and priority
    DeleteStrict,
}

/// Flow table modification (no idle or hard timeout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowMod {
    /// Command
    pub command: FlowModCommand,
    /// Match
    pub matcher: FlowMatch,
    /// Output action
    pub out_port: PortNo,
    /// Priority
    pub priority: u16,
}

/// Command for the control-channel transport
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Port statistics request; answered by [`ControllerEvent::PortStatsReceived`]
    StatsRequest {
        /// Switch
        target: Target,
        /// Transaction id echoed in the reply
        xid: u32,
    },
    /// Raw frame emitted out of a switch port
    PacketOut {
        /// Switch
        target: Target,
        /// Output port
        out_port: PortNo,
        /// Ethernet frame
        data: Bytes,
    },
    /// Flow table modification
    FlowMod {
        /// Switch
        target: Target,
        /// Modification
        flow_mod: FlowMod,
    },
}

impl ControlCommand {
    /// Switch the command is addressed to
    pub fn target(&self) -> Target {
        match self {
            Self::StatsRequest { target, .. }
            | Self::PacketOut { target, .. }
            | Self::FlowMod { target, .. } => *target,
        }
    }

    /// Flow modification, if this is one
    pub fn as_flow_mod(&self) -> Option<(Target, &FlowMod)> {
        match self {
            Self::FlowMod { target, flow_mod } => Some((*target, flow_mod)),
            _ => None,
        }
    }
}

/// Per-port counters from a statistics reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCounters {
    /// Port number
    pub port_no: PortNo,
    /// Packets received
    pub rx_packets: u64,
    /// Packets transmitted
    pub tx_packets: u64,
}

/// Packet-in payload, already parsed by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPacket {
    /// Frame with the probe ethertype; payload follows the ethernet header
    Probe {
        /// Ethernet payload
        payload: Bytes,
    },
    /// ARP packet
    Arp {
        /// Sender protocol address
        sender_ip: Ipv4Addr,
        /// Target protocol address
        target_ip: Ipv4Addr,
    },
    /// IPv4 packet
    Ipv4 {
        /// Source address
        src: Ipv4Addr,
        /// Destination address
        dst: Ipv4Addr,
    },
    /// Anything else
    Other {
        /// Ethertype
        eth_type: u16,
    },
}

/// Event delivered to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Control channel to a switch established
    ConnectionUp {
        /// Datapath id
        dpid: Dpid,
        /// Names of the switch's ports
        port_names: Vec<String>,
    },
    /// Control channel to a switch lost
    ConnectionDown {
        /// Datapath id
        dpid: Dpid,
    },
    /// Statistics reply
    PortStatsReceived {
        /// Replying datapath
        dpid: Dpid,
        /// Transaction id of the request
        xid: u32,
        /// Counters per port
        ports: Vec<PortCounters>,
    },
    /// Packet the switch could not handle locally
    PacketIn {
        /// Datapath id
        dpid: Dpid,
        /// Ingress port on that switch
        in_port: PortNo,
        /// Parsed headers
        packet: ParsedPacket,
        /// Raw frame for packet-out
        data: Bytes,
    },
    /// Periodic scheduler timer
    Tick,
}

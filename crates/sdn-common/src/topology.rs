//! Fixed diamond topology: switch roles, hosts and the three parallel paths
//!
//! Port numbering follows the emulated fabric:
//!
//! | switch | ports 1..3 | ports 4..6 |
//! |--------|------------|------------|
//! | s1     | h1, h2, h3 | s2, s3, s4 |
//! | s5     | s2, s3, s4 | h4, h5, h6 |
//!
//! Aggregation switches use port 1 towards `s1` and port 2 towards `s5`.

use crate::{SdnError, SdnResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// OpenFlow port number
pub type PortNo = u16;

/// Logical role of a switch in the diamond
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchRole {
    /// Shared ingress edge switch (hosts h1..h3)
    S1,
    /// Aggregation switch of path A
    S2,
    /// Aggregation switch of path B
    S3,
    /// Aggregation switch of path C
    S4,
    /// Shared egress edge switch (hosts h4..h6)
    S5,
}

impl SwitchRole {
    /// All roles, ingress first
    pub const ALL: [SwitchRole; 5] = [Self::S1, Self::S2, Self::S3, Self::S4, Self::S5];

    /// Lowercase switch name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::S1 => "s1",
            Self::S2 => "s2",
            Self::S3 => "s3",
            Self::S4 => "s4",
            Self::S5 => "s5",
        }
    }

    /// Recognise the role from a port name announced on connection-up
    ///
    /// Only the first interface (`sN-eth1`) identifies a switch.
    pub fn from_port_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|role| name.strip_prefix(role.name()) == Some("-eth1"))
    }

    /// Path carried by an aggregation switch
    pub const fn aggregated_path(&self) -> Option<PathId> {
        match self {
            Self::S2 => Some(PathId::A),
            Self::S3 => Some(PathId::B),
            Self::S4 => Some(PathId::C),
            Self::S1 | Self::S5 => None,
        }
    }
}

impl fmt::Display for SwitchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the three parallel inter-switch paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathId {
    /// Path through s2
    A,
    /// Path through s3
    B,
    /// Path through s4
    C,
}

impl PathId {
    /// All paths in declaration order
    pub const ALL: [PathId; 3] = [Self::A, Self::B, Self::C];

    /// Dense index for per-path arrays
    #[inline]
    pub const fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
        }
    }

    /// Aggregation switch the path crosses (far side of the delay measurement)
    pub const fn aggregation_switch(&self) -> SwitchRole {
        match self {
            Self::A => SwitchRole::S2,
            Self::B => SwitchRole::S3,
            Self::C => SwitchRole::S4,
        }
    }

    /// Output port on the ingress switch `s1`
    pub const fn ingress_port(&self) -> PortNo {
        match self {
            Self::A => 4,
            Self::B => 5,
            Self::C => 6,
        }
    }

    /// Output port on the egress switch `s5`
    pub const fn egress_port(&self) -> PortNo {
        match self {
            Self::A => 1,
            Self::B => 2,
            Self::C => 3,
        }
    }

    /// Path whose `s1` port is `port`
    pub fn from_ingress_port(port: PortNo) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.ingress_port() == port)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A(s2)"),
            Self::B => f.write_str("B(s3)"),
            Self::C => f.write_str("C(s4)"),
        }
    }
}

/// Plain array indexed by path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerPath<T>(pub [T; 3]);

impl<T: Copy> PerPath<T> {
    /// Same value for every path
    pub const fn splat(value: T) -> Self {
        Self([value; 3])
    }

    /// Value for a path
    #[inline]
    pub fn get(&self, path: PathId) -> T {
        self.0[path.index()]
    }

    /// Overwrite the value for a path
    #[inline]
    pub fn set(&mut self, path: PathId, value: T) {
        self.0[path.index()] = value;
    }

    /// (path, value) pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (PathId, T)> + '_ {
        PathId::ALL.into_iter().map(move |p| (p, self.get(p)))
    }
}

/// Which edge switch a host hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSide {
    /// Attached to s1
    Ingress,
    /// Attached to s5
    Egress,
}

/// One of the six hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Host {
    /// 10.0.0.1 on s1 port 1
    H1,
    /// 10.0.0.2 on s1 port 2
    H2,
    /// 10.0.0.3 on s1 port 3
    H3,
    /// 10.0.0.4 on s5 port 4
    H4,
    /// 10.0.0.5 on s5 port 5
    H5,
    /// 10.0.0.6 on s5 port 6
    H6,
}

impl Host {
    /// All hosts
    pub const ALL: [Host; 6] = [Self::H1, Self::H2, Self::H3, Self::H4, Self::H5, Self::H6];

    const fn number(&self) -> u8 {
        match self {
            Self::H1 => 1,
            Self::H2 => 2,
            Self::H3 => 3,
            Self::H4 => 4,
            Self::H5 => 5,
            Self::H6 => 6,
        }
    }

    /// Host address (10.0.0.N)
    pub const fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, self.number())
    }

    /// Resolve a host from its address
    pub fn from_ip(ip: Ipv4Addr) -> Option<Self> {
        Self::ALL.into_iter().find(|h| h.ip() == ip)
    }

    /// Edge the host is attached to
    pub const fn side(&self) -> HostSide {
        match self {
            Self::H1 | Self::H2 | Self::H3 => HostSide::Ingress,
            Self::H4 | Self::H5 | Self::H6 => HostSide::Egress,
        }
    }

    /// Edge switch the host is attached to
    pub const fn edge_switch(&self) -> SwitchRole {
        match self.side() {
            HostSide::Ingress => SwitchRole::S1,
            HostSide::Egress => SwitchRole::S5,
        }
    }

    /// Port on its edge switch
    pub const fn port(&self) -> PortNo {
        self.number() as PortNo
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.number())
    }
}

impl FromStr for Host {
    type Err = SdnError;

    fn from_str(s: &str) -> SdnResult<Self> {
        Self::ALL
            .into_iter()
            .find(|h| h.to_string() == s)
            .ok_or_else(|| SdnError::UnknownHost(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_port_name() {
        assert_eq!(SwitchRole::from_port_name("s3-eth1"), Some(SwitchRole::S3));
        assert_eq!(SwitchRole::from_port_name("s3-eth2"), None);
        assert_eq!(SwitchRole::from_port_name("s33-eth1"), None);
        assert_eq!(SwitchRole::from_port_name("lo"), None);
    }

    #[test]
    fn test_path_bindings() {
        for path in PathId::ALL {
            assert_eq!(PathId::from_ingress_port(path.ingress_port()), Some(path));
            assert_eq!(path.aggregation_switch().aggregated_path(), Some(path));
        }
        assert_eq!(PathId::B.ingress_port(), 5);
        assert_eq!(PathId::B.egress_port(), 2);
    }

    #[test]
    fn test_host_addressing() {
        assert_eq!(Host::H5.ip(), Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(Host::from_ip(Ipv4Addr::new(10, 0, 0, 2)), Some(Host::H2));
        assert_eq!(Host::from_ip(Ipv4Addr::new(10, 0, 0, 9)), None);
        assert_eq!(Host::H2.edge_switch(), SwitchRole::S1);
        assert_eq!(Host::H6.port(), 6);
        assert_eq!("h4".parse::<Host>().unwrap(), Host::H4);
        assert!("h7".parse::<Host>().is_err());
    }

    #[test]
    fn test_per_path() {
        let mut delays = PerPath::splat(0.0);
        delays.set(PathId::C, 10.0);
        assert_eq!(delays.get(PathId::C), 10.0);
        assert_eq!(delays.iter().count(), 3);
    }
}

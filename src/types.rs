use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::ops::Add;

use crate::error::ConfigError;

/// Every node carries a single-letter label, so the network tops out at `A..=Z`.
pub const MAX_NODES: usize = 26;

/// Largest cost that is still finite. The wire reserves `i32::MAX` for Infinity.
pub const MAX_FINITE_COST: u32 = i32::MAX as u32 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }

    /// Display letter: 0 is `A`, 1 is `B`, ...
    pub fn label(self) -> char {
        debug_assert!(self.0 < MAX_NODES);
        (b'A' + self.0 as u8) as char
    }

    pub fn from_label(label: char) -> Option<Self> {
        if label.is_ascii_uppercase() {
            Some(NodeId((label as u8 - b'A') as usize))
        } else {
            None
        }
    }

    /// Accepts either a letter (`C`, `c`) or an index (`2`).
    pub fn parse(raw: &str, node_count: usize) -> Option<Self> {
        let raw = raw.trim();
        let id = match raw.parse::<usize>() {
            Ok(index) => NodeId(index),
            Err(_) => {
                let mut chars = raw.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => NodeId::from_label(c.to_ascii_uppercase())?,
                    _ => return None,
                }
            }
        };
        (id.0 < node_count).then_some(id)
    }

    pub fn all(node_count: usize) -> impl Iterator<Item = NodeId> {
        (0..node_count).map(NodeId)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < MAX_NODES {
            write!(f, "{}", self.label())
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// A node's endpoint port. Doubles as routing metadata in the tables
/// (outgoing and destination interface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub u16);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps node identifiers to `base + id` addresses and back. A plan always
/// fits inside the port range, for every node it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPlan {
    base: u16,
    node_count: usize,
}

impl AddressPlan {
    pub const REFERENCE_BASE: u16 = 10000;

    pub fn new(base: u16, node_count: usize) -> Result<Self, ConfigError> {
        let last = base as usize + node_count.saturating_sub(1);
        if base == 0 || last > u16::MAX as usize {
            return Err(ConfigError::BasePort { base, node_count });
        }
        Ok(Self { base, node_count })
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    /// Number of nodes the plan hands out addresses for.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// `None` for nodes the plan does not cover.
    pub fn address_of(&self, node: NodeId) -> Option<Address> {
        (node.0 < self.node_count).then(|| Address(self.base + node.0 as u16))
    }

    pub fn node_of(&self, address: Address, node_count: usize) -> Option<NodeId> {
        let offset = address.0.checked_sub(self.base)? as usize;
        (offset < node_count.min(self.node_count)).then_some(NodeId(offset))
    }

    pub fn socket_addr(&self, host: IpAddr, node: NodeId) -> Option<SocketAddr> {
        self.address_of(node).map(|address| SocketAddr::new(host, address.0))
    }
}

impl Default for AddressPlan {
    /// Reference base, room for the largest network.
    fn default() -> Self {
        Self {
            base: Self::REFERENCE_BASE,
            node_count: MAX_NODES,
        }
    }
}

/// Path cost. `Infinity` sorts above every finite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Cost {
    Finite(u32),
    Infinity,
}

impl Cost {
    pub const ZERO: Cost = Cost::Finite(0);

    pub fn is_infinite(self) -> bool {
        matches!(self, Cost::Infinity)
    }

    /// Whether the cost survives the wire unchanged: Infinity, or a finite
    /// value no larger than [`MAX_FINITE_COST`].
    pub fn is_representable(self) -> bool {
        match self {
            Cost::Finite(value) => value <= MAX_FINITE_COST,
            Cost::Infinity => true,
        }
    }

    pub fn finite(self) -> Option<u32> {
        match self {
            Cost::Finite(value) => Some(value),
            Cost::Infinity => None,
        }
    }
}

impl Add for Cost {
    type Output = Cost;

    /// Sums that would leave the finite range become Infinity.
    fn add(self, rhs: Cost) -> Cost {
        match (self, rhs) {
            (Cost::Finite(a), Cost::Finite(b)) => match a.checked_add(b) {
                Some(sum) if sum <= MAX_FINITE_COST => Cost::Finite(sum),
                _ => Cost::Infinity,
            },
            _ => Cost::Infinity,
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cost::Finite(value) => write!(f, "{}", value),
            Cost::Infinity => write!(f, "inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for node in NodeId::all(MAX_NODES) {
            assert_eq!(NodeId::from_label(node.label()), Some(node));
        }
        assert_eq!(NodeId(0).to_string(), "A");
        assert_eq!(NodeId::from_label('a'), None);
    }

    #[test]
    fn test_parse_label_or_index() {
        assert_eq!(NodeId::parse("C", 6), Some(NodeId(2)));
        assert_eq!(NodeId::parse("c", 6), Some(NodeId(2)));
        assert_eq!(NodeId::parse("5", 6), Some(NodeId(5)));
        assert_eq!(NodeId::parse("6", 6), None);
        assert_eq!(NodeId::parse("G", 6), None);
        assert_eq!(NodeId::parse("AB", 6), None);
        assert_eq!(NodeId::parse("", 6), None);
    }

    #[test]
    fn test_address_plan() {
        let plan = AddressPlan::new(10000, 6).unwrap();
        assert_eq!(plan.address_of(NodeId(3)), Some(Address(10003)));
        assert_eq!(plan.address_of(NodeId(6)), None);
        assert_eq!(plan.node_of(Address(10005), 6), Some(NodeId(5)));
        assert_eq!(plan.node_of(Address(10006), 6), None);
        assert_eq!(plan.node_of(Address(9999), 6), None);
        assert_eq!(AddressPlan::default().address_of(NodeId(25)), Some(Address(10025)));
    }

    #[test]
    fn test_address_plan_must_fit_port_range() {
        assert!(AddressPlan::new(u16::MAX, 1).is_ok());
        assert!(matches!(
            AddressPlan::new(u16::MAX, 2),
            Err(ConfigError::BasePort { base: u16::MAX, node_count: 2 })
        ));
        assert!(matches!(AddressPlan::new(0, 1), Err(ConfigError::BasePort { .. })));

        let plan = AddressPlan::new(u16::MAX, 1).unwrap();
        assert_eq!(plan.address_of(NodeId(0)), Some(Address(u16::MAX)));
        assert_eq!(plan.address_of(NodeId(1)), None);
    }

    #[test]
    fn test_cost_addition_never_overflows() {
        assert_eq!(Cost::Finite(2) + Cost::Finite(3), Cost::Finite(5));
        assert_eq!(Cost::Infinity + Cost::Finite(1), Cost::Infinity);
        assert_eq!(Cost::Finite(1) + Cost::Infinity, Cost::Infinity);
        assert_eq!(Cost::Finite(MAX_FINITE_COST) + Cost::Finite(1), Cost::Infinity);
        assert_eq!(Cost::Finite(u32::MAX) + Cost::Finite(u32::MAX), Cost::Infinity);
    }

    #[test]
    fn test_representable_costs() {
        assert!(Cost::Finite(MAX_FINITE_COST).is_representable());
        assert!(!Cost::Finite(MAX_FINITE_COST + 1).is_representable());
        assert!(Cost::Infinity.is_representable());
    }

    #[test]
    fn test_cost_ordering() {
        assert!(Cost::Finite(u32::MAX) < Cost::Infinity);
        assert!(Cost::ZERO < Cost::Finite(1));
    }
}

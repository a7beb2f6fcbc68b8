use log::warn;
use std::fmt;

use crate::types::{Address, AddressPlan, Cost, NodeId};

/// One destination row of a node's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingEntry {
    /// Label the row was learned with. Unset until a route is known.
    pub via: Option<NodeId>,
    pub cost: Cost,
    pub outgoing: Option<Address>,
    pub destination: Option<Address>,
}

impl RoutingEntry {
    pub const UNREACHABLE: RoutingEntry = RoutingEntry {
        via: None,
        cost: Cost::Infinity,
        outgoing: None,
        destination: None,
    };

    pub fn is_reachable(&self) -> bool {
        !self.cost.is_infinite()
    }
}

/// Per-node distance vector: exactly one row per destination in `[0, N)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    owner: NodeId,
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    /// Fresh table: cost 0 to itself, Infinity everywhere else.
    pub fn new(owner: NodeId, node_count: usize, addresses: &AddressPlan) -> Self {
        let mut entries = vec![RoutingEntry::UNREACHABLE; node_count];
        let own = addresses.address_of(owner);
        entries[owner.index()] = RoutingEntry {
            via: Some(owner),
            cost: Cost::ZERO,
            outgoing: own,
            destination: own,
        };
        Self { owner, entries }
    }

    /// Builds a table from raw rows, as received off the wire.
    pub(crate) fn from_entries(owner: NodeId, entries: Vec<RoutingEntry>) -> Self {
        Self { owner, entries }
    }

    /// Installs a direct link. Used only while building the initial tables.
    /// Costs the wire cannot carry are refused.
    pub fn add_link(&mut self, neighbor: NodeId, cost: Cost, addresses: &AddressPlan) {
        if neighbor == self.owner || neighbor.index() >= self.entries.len() {
            return;
        }
        if !cost.is_representable() {
            warn!("{}: refusing link to {} with cost {}", self.owner, neighbor, cost);
            return;
        }
        let address = addresses.address_of(neighbor);
        self.entries[neighbor.index()] = RoutingEntry {
            via: Some(neighbor),
            cost,
            outgoing: address,
            destination: address,
        };
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn node_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_route(&self, destination: NodeId) -> &RoutingEntry {
        &self.entries[destination.index()]
    }

    pub fn cost(&self, destination: NodeId) -> Cost {
        self.entries[destination.index()].cost
    }

    /// Replaces a row. The owner's own row is fixed and never replaced.
    pub(crate) fn set_route(&mut self, destination: NodeId, entry: RoutingEntry) {
        if destination != self.owner {
            self.entries[destination.index()] = entry;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &RoutingEntry)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (NodeId(index), entry))
    }

    /// Row-by-row comparison of every field. The owner is not part of it.
    pub fn same_routes(&self, other: &RoutingTable) -> bool {
        self.entries == other.entries
    }
}

fn or_dash<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Routing table of {}", self.owner)?;
        writeln!(f, "Dest\tVia\tCost\tOutgoing\tDestination")?;
        for (destination, entry) in self.iter() {
            writeln!(
                f,
                "{}\t{}\t{}\t{}\t\t{}",
                destination,
                or_dash(entry.via),
                entry.cost,
                or_dash(entry.outgoing),
                or_dash(entry.destination),
            )?;
        }
        Ok(())
    }
}

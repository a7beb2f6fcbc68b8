use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::protocol::{NetworkState, RoutingTable};
use crate::types::{Address, AddressPlan, Cost, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub neighbor: NodeId,
    pub cost: Cost,
}

/// Static link map: for every node, its direct neighbors and link costs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    links: Vec<Vec<Link>>,
}

impl Topology {
    pub fn new(node_count: usize) -> Self {
        Self {
            links: vec![Vec::new(); node_count],
        }
    }

    /// Builds a topology from `(a, b, cost)` triples, installing both directions.
    pub fn undirected(node_count: usize, links: &[(usize, usize, u32)]) -> Self {
        let mut topology = Self::new(node_count);
        for &(a, b, cost) in links {
            topology.add_link(NodeId(a), NodeId(b), Cost::Finite(cost));
            topology.add_link(NodeId(b), NodeId(a), Cost::Finite(cost));
        }
        topology
    }

    /// Adds or overwrites the directed link `from -> to`. Self links, unknown
    /// nodes and costs the wire cannot carry are ignored.
    pub fn add_link(&mut self, from: NodeId, to: NodeId, cost: Cost) {
        let node_count = self.node_count();
        if from == to || from.index() >= node_count || to.index() >= node_count {
            return;
        }
        if !cost.is_representable() {
            warn!("Ignoring link {} -> {}: cost {} is out of range", from, to, cost);
            return;
        }
        let links = &mut self.links[from.index()];
        match links.binary_search_by_key(&to, |link| link.neighbor) {
            Ok(pos) => links[pos].cost = cost,
            Err(pos) => links.insert(pos, Link { neighbor: to, cost }),
        }
    }

    pub fn node_count(&self) -> usize {
        self.links.len()
    }

    pub fn links(&self, node: NodeId) -> &[Link] {
        &self.links[node.index()]
    }

    /// Neighbor Set of `node`, in ascending identifier order.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.links[node.index()].iter().map(|link| link.neighbor)
    }

    pub fn is_empty(&self, node: NodeId) -> bool {
        self.links[node.index()].is_empty()
    }

    /// Parses `label,source address,neighbor address,cost` records. Anything
    /// unrecognised is skipped rather than treated as fatal.
    pub fn parse(text: &str, node_count: usize, addresses: &AddressPlan) -> Self {
        let mut topology = Self::new(node_count);

        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_record(line, node_count, addresses) {
                Some((from, to, cost)) => {
                    debug!("Link {} -> {} cost {}", from, to, cost);
                    topology.add_link(from, to, cost);
                }
                None => warn!("Ignoring topology record {}: {:?}", number + 1, line),
            }
        }

        topology
    }

    pub fn load(path: impl AsRef<Path>, node_count: usize, addresses: &AddressPlan) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content, node_count, addresses))
    }

    /// Start-of-run tables: self at 0, direct neighbors at their link cost,
    /// everything else unreachable.
    pub fn initial_state(&self, addresses: &AddressPlan) -> NetworkState {
        let tables = NodeId::all(self.node_count())
            .map(|node| {
                let mut table = RoutingTable::new(node, self.node_count(), addresses);
                for link in self.links(node) {
                    table.add_link(link.neighbor, link.cost, addresses);
                }
                table
            })
            .collect();
        NetworkState::new(tables)
    }
}

fn parse_record(line: &str, node_count: usize, addresses: &AddressPlan) -> Option<(NodeId, NodeId, Cost)> {
    let mut fields = line.split(',').map(str::trim);
    let (label, _source, neighbor, cost) = (fields.next()?, fields.next()?, fields.next()?, fields.next()?);

    let mut chars = label.chars();
    let from = match (chars.next(), chars.next()) {
        (Some(c), None) => NodeId::from_label(c)?,
        _ => return None,
    };
    if from.index() >= node_count {
        return None;
    }

    let to = addresses.node_of(Address(neighbor.parse().ok()?), node_count)?;
    if to == from {
        return None;
    }

    let cost = Cost::Finite(cost.parse().ok()?);
    cost.is_representable().then_some((from, to, cost))
}

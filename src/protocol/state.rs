use crate::protocol::routing_table::RoutingTable;
use crate::types::NodeId;

/// The ordered collection of every node's table, indexed by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkState {
    tables: Vec<RoutingTable>,
}

impl NetworkState {
    pub fn new(tables: Vec<RoutingTable>) -> Self {
        debug_assert!(tables.iter().enumerate().all(|(i, t)| t.owner() == NodeId(i)));
        Self { tables }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table(&self, node: NodeId) -> &RoutingTable {
        &self.tables[node.index()]
    }

    pub fn table_mut(&mut self, node: NodeId) -> &mut RoutingTable {
        &mut self.tables[node.index()]
    }

    pub fn tables(&self) -> &[RoutingTable] {
        &self.tables
    }
}

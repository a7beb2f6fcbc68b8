use crate::protocol::routing_table::RoutingTable;
use crate::protocol::state::NetworkState;

/// Strict row-by-row equality: label, cost, outgoing and destination address
/// must all match for every destination.
pub fn tables_equal(a: &RoutingTable, b: &RoutingTable) -> bool {
    a.same_routes(b)
}

/// True when every table is identical to table 0.
///
/// This is structural agreement, not cost agreement: tables that have
/// settled on the same shortest costs but carry different metadata still
/// count as unstable.
pub fn is_stable(network: &NetworkState) -> bool {
    match network.tables().split_first() {
        Some((first, rest)) => rest.iter().all(|table| tables_equal(first, table)),
        None => true,
    }
}

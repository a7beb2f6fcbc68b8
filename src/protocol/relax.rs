use log::debug;

use crate::protocol::routing_table::{RoutingEntry, RoutingTable};
use crate::types::{AddressPlan, NodeId};

/// Asynchronous Bellman-Ford step: folds one neighbor's table into `current`.
///
/// A row is replaced only on a strict improvement, so replays and stale
/// tables are no-ops. Rows the sender advertises at Infinity are skipped
/// outright; a withdrawn route is therefore never learned, even when it
/// would raise a cost that was routed through the sender.
///
/// Returns whether any row changed.
pub fn relax(current: &mut RoutingTable, received: &RoutingTable, addresses: &AddressPlan) -> bool {
    let sender = received.owner();
    if sender.index() >= current.node_count() || received.node_count() != current.node_count() {
        return false;
    }

    let via_cost = current.cost(sender);
    let mut changed = false;

    for destination in NodeId::all(current.node_count()) {
        if destination == current.owner() {
            continue;
        }

        let advertised = received.get_route(destination);
        if advertised.cost.is_infinite() {
            continue;
        }

        let candidate = advertised.cost + via_cost;
        if current.cost(destination) > candidate {
            debug!(
                "{}: route to {} via {} improves {} -> {}",
                current.owner(),
                destination,
                sender,
                current.cost(destination),
                candidate
            );
            current.set_route(
                destination,
                RoutingEntry {
                    via: advertised.via,
                    cost: candidate,
                    outgoing: addresses.address_of(sender),
                    destination: advertised.destination,
                },
            );
            changed = true;
        }
    }

    changed
}

//! Fixed-layout wire format for routing tables.
//!
//! A message is `1 + 4 * N` little-endian `i32` words:
//!
//! ```text
//! [0]            sender identifier
//! [1 ..= N]      label per destination ('A' + id, 0 when unset)
//! [N+1 ..= 2N]   cost per destination (i32::MAX for Infinity)
//! [2N+1 ..= 3N]  outgoing address per destination (0 when unset)
//! [3N+1 ..= 4N]  destination address per destination (0 when unset)
//! ```

use crate::error::MalformedMessage;
use crate::protocol::routing_table::{RoutingEntry, RoutingTable};
use crate::types::{Address, Cost, NodeId};

pub const WORD_SIZE: usize = std::mem::size_of::<i32>();

/// Wire value standing in for an unreachable destination.
pub const INFINITY: i32 = i32::MAX;

const UNSET: i32 = 0;
const LABEL_BASE: i32 = b'A' as i32;

/// Number of words in a message for a network of `node_count` nodes.
pub fn message_words(node_count: usize) -> usize {
    1 + 4 * node_count
}

/// Size in bytes of a message for a network of `node_count` nodes.
pub fn message_len(node_count: usize) -> usize {
    message_words(node_count) * WORD_SIZE
}

pub fn encode(table: &RoutingTable) -> Vec<u8> {
    let n = table.node_count();
    let mut words = vec![UNSET; message_words(n)];
    words[0] = table.owner().index() as i32;

    for (destination, entry) in table.iter() {
        let i = destination.index();
        words[1 + i] = entry.via.map_or(UNSET, |via| LABEL_BASE + via.index() as i32);
        words[1 + n + i] = encode_cost(entry.cost);
        words[1 + 2 * n + i] = entry.outgoing.map_or(UNSET, |a| a.0 as i32);
        words[1 + 3 * n + i] = entry.destination.map_or(UNSET, |a| a.0 as i32);
    }

    words.into_iter().flat_map(i32::to_le_bytes).collect()
}

pub fn decode(bytes: &[u8], node_count: usize) -> Result<RoutingTable, MalformedMessage> {
    let expected = message_len(node_count);
    if bytes.len() != expected {
        return Err(MalformedMessage::Length {
            expected,
            actual: bytes.len(),
        });
    }

    let words: Vec<i32> = bytes
        .chunks_exact(WORD_SIZE)
        .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    let n = node_count;
    let owner = node_in_range(words[0], n).ok_or(MalformedMessage::NodeOutOfRange(words[0]))?;

    let mut entries = Vec::with_capacity(n);
    for i in 0..n {
        entries.push(RoutingEntry {
            via: decode_label(words[1 + i], i, n)?,
            cost: decode_cost(words[1 + n + i], i)?,
            outgoing: decode_address(words[1 + 2 * n + i], i)?,
            destination: decode_address(words[1 + 3 * n + i], i)?,
        });
    }

    Ok(RoutingTable::from_entries(owner, entries))
}

fn node_in_range(raw: i32, node_count: usize) -> Option<NodeId> {
    usize::try_from(raw)
        .ok()
        .filter(|index| *index < node_count)
        .map(NodeId)
}

fn encode_cost(cost: Cost) -> i32 {
    match cost {
        Cost::Finite(value) => i32::try_from(value)
            .ok()
            .filter(|v| *v != INFINITY)
            .unwrap_or(INFINITY),
        Cost::Infinity => INFINITY,
    }
}

fn decode_cost(raw: i32, destination: usize) -> Result<Cost, MalformedMessage> {
    match raw {
        INFINITY => Ok(Cost::Infinity),
        v if v < 0 => Err(MalformedMessage::NegativeCost(v, destination)),
        v => Ok(Cost::Finite(v as u32)),
    }
}

fn decode_label(raw: i32, destination: usize, node_count: usize) -> Result<Option<NodeId>, MalformedMessage> {
    if raw == UNSET {
        return Ok(None);
    }
    node_in_range(raw - LABEL_BASE, node_count)
        .map(Some)
        .ok_or(MalformedMessage::InvalidLabel(raw, destination))
}

fn decode_address(raw: i32, destination: usize) -> Result<Option<Address>, MalformedMessage> {
    if raw == UNSET {
        return Ok(None);
    }
    u16::try_from(raw)
        .map(|port| Some(Address(port)))
        .map_err(|_| MalformedMessage::InvalidAddress(raw, destination))
}

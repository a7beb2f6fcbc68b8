//! Error types for the distance-vector simulation.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::NodeId;

/// A datagram that could not be turned back into a routing table.
///
/// Recovered locally: the message is dropped and the node keeps running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("node identifier {0} is outside the network")]
    NodeOutOfRange(i32),

    #[error("invalid node label {0} at destination {1}")]
    InvalidLabel(i32, usize),

    #[error("negative cost {0} at destination {1}")]
    NegativeCost(i32, usize),

    #[error("invalid address {0} at destination {1}")]
    InvalidAddress(i32, usize),
}

/// Send, receive or bind failure at the transport boundary. Always fatal.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind endpoint for node {node}: {source}")]
    Bind {
        node: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to send from {from} to {to}: {source}")]
    Send {
        from: NodeId,
        to: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to receive on node {node}: {source}")]
    Receive {
        node: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("transport closed")]
    Closed,
}

/// Invalid topology or identity selection, detected before any node starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid node identity {0:?}")]
    InvalidNode(String),

    #[error("node count must be between 1 and {max}, got {actual}")]
    NodeCount { max: usize, actual: usize },

    #[error("root node {0} is outside the network")]
    InvalidRoot(usize),

    #[error("base port {base} leaves no room for {node_count} nodes")]
    BasePort { base: u16, node_count: usize },
}

/// Anything that aborts a whole simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no convergence after {0} rounds")]
    RoundLimit(u64),

    #[error("failed to write routing snapshot: {0}")]
    Snapshot(#[source] std::io::Error),
}

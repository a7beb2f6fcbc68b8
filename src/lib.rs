pub mod config;
pub mod error;
pub mod network;
pub mod protocol;
pub mod snapshot;
pub mod types;

pub use config::{SimulationConfig, TransportKind};
pub use error::{ConfigError, MalformedMessage, SimulationError, TransportError};
pub use network::{MemoryTransport, Topology, Transport, UdpTransport};
pub use protocol::{NetworkState, Outcome, RoutingEntry, RoutingTable, Simulation, SimulationReport};
pub use types::{Address, AddressPlan, Cost, NodeId};

pub mod memory;
pub mod topology;
pub mod transport;

pub use memory::MemoryTransport;
pub use topology::{Link, Topology};
pub use transport::{Datagram, Transport, UdpTransport};

pub mod codec;
pub mod convergence;
pub mod dispatch;
pub mod relax;
pub mod routing_table;
pub mod state;

pub use convergence::{is_stable, tables_equal};
pub use dispatch::{Outcome, Simulation, SimulationReport};
pub use relax::relax;
pub use routing_table::{RoutingEntry, RoutingTable};
pub use state::NetworkState;

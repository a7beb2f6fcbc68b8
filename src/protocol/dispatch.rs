use log::{debug, info, warn};
use std::collections::VecDeque;
use tokio::sync::broadcast;

use crate::error::{ConfigError, SimulationError};
use crate::network::{Datagram, Topology, Transport};
use crate::protocol::codec;
use crate::protocol::convergence::is_stable;
use crate::protocol::relax::relax;
use crate::protocol::state::NetworkState;
use crate::snapshot::SnapshotWriter;
use crate::types::{AddressPlan, NodeId};

/// Why the dispatch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every table is structurally identical to table 0.
    Stable,
    /// Nothing in flight and no mailbox holds a message: no further
    /// processing can change any table.
    Quiescent,
    /// Shutdown was requested while waiting for input.
    Cancelled,
}

impl Outcome {
    pub fn is_converged(self) -> bool {
        matches!(self, Outcome::Stable | Outcome::Quiescent)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub outcome: Outcome,
    pub rounds: u64,
    pub messages_sent: u64,
    pub messages_processed: u64,
    pub dropped: u64,
    pub network: NetworkState,
}

/// Drives every node's table to a fixed point over a [`Transport`].
///
/// Node state lives in vectors indexed by identifier; a single handler serves
/// whichever node has input. Each batch takes at most one message per ready
/// node, then convergence is evaluated.
pub struct Simulation<T: Transport> {
    topology: Topology,
    addresses: AddressPlan,
    network: NetworkState,
    transport: T,
    root: NodeId,
    mailboxes: Vec<VecDeque<Vec<u8>>>,
    advertised: Vec<bool>,
    max_rounds: Option<u64>,
    snapshots: Option<SnapshotWriter>,
    rounds: u64,
    messages_sent: u64,
    /// Datagrams taken off the transport that one of our nodes sent.
    messages_received: u64,
    messages_processed: u64,
    dropped: u64,
}

impl<T: Transport> Simulation<T> {
    pub fn new(topology: Topology, addresses: AddressPlan, transport: T) -> Self {
        let node_count = topology.node_count();
        let network = topology.initial_state(&addresses);
        Self {
            topology,
            addresses,
            network,
            transport,
            root: NodeId(0),
            mailboxes: vec![VecDeque::new(); node_count],
            advertised: vec![false; node_count],
            max_rounds: None,
            snapshots: None,
            rounds: 0,
            messages_sent: 0,
            messages_received: 0,
            messages_processed: 0,
            dropped: 0,
        }
    }

    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = root;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: Option<u64>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_snapshots(mut self, snapshots: SnapshotWriter) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Runs without an external shutdown signal.
    pub async fn run_to_convergence(self) -> Result<SimulationReport, SimulationError> {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        self.run(shutdown_rx).await
    }

    /// Runs until convergence, a fatal transport error, or a message on
    /// `shutdown`. Dropping every sender of `shutdown` also cancels.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<SimulationReport, SimulationError> {
        self.validate()?;

        if let Some(snapshots) = &self.snapshots {
            snapshots
                .initialize(&self.network)
                .map_err(SimulationError::Snapshot)?;
        }

        self.bootstrap().await?;

        loop {
            if let Some(outcome) = self.check_convergence() {
                info!(
                    "Simulation finished ({:?}) after {} rounds, {} messages sent",
                    outcome, self.rounds, self.messages_sent
                );
                return Ok(self.into_report(outcome));
            }

            if let Some(limit) = self.max_rounds {
                if self.rounds >= limit {
                    return Err(SimulationError::RoundLimit(limit));
                }
            }

            if self.mailboxes_empty() {
                let inbound = tokio::select! {
                    _ = shutdown.recv() => None,
                    inbound = self.transport.recv() => Some(inbound?),
                };
                match inbound {
                    Some(datagram) => self.enqueue(datagram),
                    None => {
                        info!("Shutdown requested, stopping after {} rounds", self.rounds);
                        return Ok(self.into_report(Outcome::Cancelled));
                    }
                }
            }

            while let Some(datagram) = self.transport.try_recv()? {
                self.enqueue(datagram);
            }

            self.process_batch().await?;
            self.rounds += 1;
        }
    }

    /// Rejects a root outside the network or an address plan too small for it.
    fn validate(&self) -> Result<(), ConfigError> {
        let node_count = self.topology.node_count();
        if self.root.index() >= node_count {
            return Err(ConfigError::InvalidRoot(self.root.index()));
        }
        if self.addresses.node_count() < node_count {
            return Err(ConfigError::BasePort {
                base: self.addresses.base(),
                node_count,
            });
        }
        Ok(())
    }

    /// The root hands its starting table to its first neighbor; everyone
    /// else stays passive until spoken to.
    async fn bootstrap(&mut self) -> Result<(), SimulationError> {
        let root = self.root;
        let Some(first) = self.topology.neighbors(root).next() else {
            info!("Root {} has no neighbors, nothing to propagate", root);
            return Ok(());
        };

        let payload = codec::encode(self.network.table(root));
        self.transport.send(root, first, &payload).await?;
        self.messages_sent += 1;
        info!("Root {} seeded its table to {}", root, first);
        Ok(())
    }

    fn check_convergence(&self) -> Option<Outcome> {
        if is_stable(&self.network) {
            Some(Outcome::Stable)
        } else if self.messages_received >= self.messages_sent && self.mailboxes_empty() {
            Some(Outcome::Quiescent)
        } else {
            None
        }
    }

    fn mailboxes_empty(&self) -> bool {
        self.mailboxes.iter().all(VecDeque::is_empty)
    }

    fn enqueue(&mut self, datagram: Datagram) {
        if datagram.from.is_some() {
            self.messages_received += 1;
        }
        match self.mailboxes.get_mut(datagram.to.index()) {
            Some(mailbox) => mailbox.push_back(datagram.payload),
            None => warn!("Dropping datagram for unknown node {}", datagram.to),
        }
    }

    async fn process_batch(&mut self) -> Result<(), SimulationError> {
        for node in NodeId::all(self.mailboxes.len()) {
            if let Some(payload) = self.mailboxes[node.index()].pop_front() {
                self.handle_message(node, &payload).await?;
            }
        }
        Ok(())
    }

    /// Idle -> Processing -> Idle for one node: decode, relax, and advertise
    /// when the table changed or the node has never advertised before.
    async fn handle_message(&mut self, node: NodeId, payload: &[u8]) -> Result<(), SimulationError> {
        self.messages_processed += 1;

        let received = match codec::decode(payload, self.network.len()) {
            Ok(table) => table,
            Err(e) => {
                warn!("Node {} dropped malformed message: {}", node, e);
                self.dropped += 1;
                return Ok(());
            }
        };
        debug!("Node {} processing table from {}", node, received.owner());

        let changed = relax(self.network.table_mut(node), &received, &self.addresses);
        if changed {
            info!("Node {} updated its table from {}", node, received.owner());
            if let Some(snapshots) = &self.snapshots {
                snapshots
                    .append(self.network.table(node))
                    .map_err(SimulationError::Snapshot)?;
            }
        }

        let first_contact = !self.advertised[node.index()];
        if changed || first_contact {
            self.broadcast(node).await?;
            self.advertised[node.index()] = true;
        }
        Ok(())
    }

    async fn broadcast(&mut self, node: NodeId) -> Result<(), SimulationError> {
        let payload = codec::encode(self.network.table(node));
        for neighbor in self.topology.neighbors(node) {
            self.transport.send(node, neighbor, &payload).await?;
            self.messages_sent += 1;
            debug!("Node {} advertised its table to {}", node, neighbor);
        }
        Ok(())
    }

    fn into_report(self, outcome: Outcome) -> SimulationReport {
        SimulationReport {
            outcome,
            rounds: self.rounds,
            messages_sent: self.messages_sent,
            messages_processed: self.messages_processed,
            dropped: self.dropped,
            network: self.network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;
    use crate::protocol::RoutingTable;
    use crate::types::Cost;

    fn simulation(topology: Topology) -> Simulation<MemoryTransport> {
        let transport = MemoryTransport::new(topology.node_count());
        Simulation::new(topology, AddressPlan::default(), transport)
    }

    #[tokio::test]
    async fn test_single_node_is_immediately_stable() {
        let report = simulation(Topology::new(1)).run_to_convergence().await.unwrap();
        assert_eq!(report.outcome, Outcome::Stable);
        assert_eq!(report.messages_sent, 0);
        assert_eq!(report.rounds, 0);
    }

    #[tokio::test]
    async fn test_isolated_root_is_quiescent() {
        let report = simulation(Topology::new(3)).run_to_convergence().await.unwrap();
        assert_eq!(report.outcome, Outcome::Quiescent);
        assert_eq!(report.messages_sent, 0);
    }

    #[tokio::test]
    async fn test_first_contact_advertises_without_change() {
        // B learns nothing from A's seed but must still tell A about C.
        let topology = Topology::undirected(3, &[(0, 1, 1), (1, 2, 1)]);
        let report = simulation(topology).run_to_convergence().await.unwrap();

        assert_eq!(report.outcome, Outcome::Quiescent);
        assert_eq!(report.network.table(NodeId(0)).cost(NodeId(2)), Cost::Finite(2));
        assert_eq!(report.network.table(NodeId(2)).cost(NodeId(0)), Cost::Finite(2));
        assert_eq!(report.messages_sent, report.messages_processed);
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let topology = Topology::undirected(2, &[(0, 1, 5)]);
        let transport = MemoryTransport::new(2);
        let injector = transport.injector();
        injector
            .send(Datagram {
                from: None,
                to: NodeId(1),
                payload: vec![0; 3],
            })
            .unwrap();

        let report = Simulation::new(topology, AddressPlan::default(), transport)
            .run_to_convergence()
            .await
            .unwrap();

        assert_eq!(report.dropped, 1);
        assert_eq!(report.messages_processed, report.messages_sent + 1);
        assert_eq!(report.outcome, Outcome::Quiescent);
        assert_eq!(report.network.table(NodeId(1)).cost(NodeId(0)), Cost::Finite(5));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_wait() {
        // The seed vanishes into a transport that never delivers, so the
        // loop can only end through shutdown.
        struct Silent;
        impl Transport for Silent {
            async fn send(&self, _: NodeId, _: NodeId, _: &[u8]) -> Result<(), crate::error::TransportError> {
                Ok(())
            }
            async fn recv(&mut self) -> Result<Datagram, crate::error::TransportError> {
                std::future::pending().await
            }
            fn try_recv(&mut self) -> Result<Option<Datagram>, crate::error::TransportError> {
                Ok(None)
            }
        }

        let topology = Topology::undirected(2, &[(0, 1, 5)]);
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let report = Simulation::new(topology, AddressPlan::default(), Silent)
            .run(rx)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::Cancelled);
        assert!(!report.outcome.is_converged());
    }

    #[tokio::test]
    async fn test_round_limit() {
        let topology = Topology::undirected(3, &[(0, 1, 1), (1, 2, 1)]);
        let err = simulation(topology)
            .with_max_rounds(Some(1))
            .run_to_convergence()
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::RoundLimit(1)));
    }

    #[tokio::test]
    async fn test_send_failure_aborts_the_run() {
        struct Broken;
        impl Transport for Broken {
            async fn send(&self, from: NodeId, to: NodeId, _: &[u8]) -> Result<(), crate::error::TransportError> {
                Err(crate::error::TransportError::Send {
                    from,
                    to,
                    source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "down"),
                })
            }
            async fn recv(&mut self) -> Result<Datagram, crate::error::TransportError> {
                Err(crate::error::TransportError::Closed)
            }
            fn try_recv(&mut self) -> Result<Option<Datagram>, crate::error::TransportError> {
                Ok(None)
            }
        }

        let topology = Topology::undirected(2, &[(0, 1, 5)]);
        let err = Simulation::new(topology, AddressPlan::default(), Broken)
            .run_to_convergence()
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::Transport(_)));
    }

    #[tokio::test]
    async fn test_receive_failure_aborts_the_run() {
        struct Deaf;
        impl Transport for Deaf {
            async fn send(&self, _: NodeId, _: NodeId, _: &[u8]) -> Result<(), crate::error::TransportError> {
                Ok(())
            }
            async fn recv(&mut self) -> Result<Datagram, crate::error::TransportError> {
                Err(crate::error::TransportError::Receive {
                    node: NodeId(1),
                    source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
                })
            }
            fn try_recv(&mut self) -> Result<Option<Datagram>, crate::error::TransportError> {
                Ok(None)
            }
        }

        let topology = Topology::undirected(2, &[(0, 1, 5)]);
        let err = Simulation::new(topology, AddressPlan::default(), Deaf)
            .run_to_convergence()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Transport(crate::error::TransportError::Receive { node: NodeId(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_root_outside_network_is_rejected() {
        let topology = Topology::undirected(2, &[(0, 1, 5)]);
        let err = simulation(topology)
            .with_root(NodeId(5))
            .run_to_convergence()
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::Config(ConfigError::InvalidRoot(5))));
    }

    #[tokio::test]
    async fn test_address_plan_must_cover_network() {
        let topology = Topology::undirected(3, &[(0, 1, 1), (1, 2, 1)]);
        let plan = AddressPlan::new(10000, 2).unwrap();
        let err = Simulation::new(topology, plan, MemoryTransport::new(3))
            .run_to_convergence()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Config(ConfigError::BasePort { base: 10000, node_count: 3 })
        ));
    }

    #[tokio::test]
    async fn test_custom_root() {
        let topology = Topology::undirected(3, &[(0, 1, 1), (1, 2, 1)]);
        let report = simulation(topology)
            .with_root(NodeId(2))
            .run_to_convergence()
            .await
            .unwrap();
        let a: &RoutingTable = report.network.table(NodeId(0));
        assert_eq!(a.cost(NodeId(2)), Cost::Finite(2));
    }
}

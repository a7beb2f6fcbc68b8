use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tokio::runtime::Builder;
use tokio::sync::broadcast;

use dv_router::config::{SimulationConfig, TransportKind};
use dv_router::error::ConfigError;
use dv_router::network::{MemoryTransport, Topology, Transport, UdpTransport};
use dv_router::protocol::{Outcome, Simulation, SimulationReport};
use dv_router::snapshot::SnapshotWriter;
use dv_router::types::NodeId;

#[derive(Parser)]
#[command(name = "dv-router", about = "Distance-vector routing simulation")]
struct Cli {
    /// Node identity running this instance (label `A` or index `0`); it seeds the network
    node: String,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    topology: Option<PathBuf>,

    #[arg(long)]
    nodes: Option<usize>,

    #[arg(long)]
    base_port: Option<u16>,

    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    max_rounds: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<(SimulationConfig, NodeId), ConfigError> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(topology) = self.topology {
            config.topology = topology;
        }
        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(base_port) = self.base_port {
            config.base_port = base_port;
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
        if self.max_rounds.is_some() {
            config.max_rounds = self.max_rounds;
        }

        let node = NodeId::parse(&self.node, config.node_count)
            .ok_or_else(|| ConfigError::InvalidNode(self.node.clone()))?;
        config.validate()?;

        Ok((config, node))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let (config, node) = cli.into_config().context("invalid startup configuration")?;
    info!(
        "Starting node {} in a {}-node network (transport {:?})",
        node, config.node_count, config.transport
    );

    let rt = Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(serve(config, node))
}

async fn serve(config: SimulationConfig, node: NodeId) -> Result<()> {
    let addresses = config.addresses()?;
    let topology = Topology::load(&config.topology, config.node_count, &addresses)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    let report = match config.transport {
        TransportKind::Udp => {
            let transport = UdpTransport::bind(config.host, config.node_count, &addresses).await?;
            run(&config, node, topology, transport, shutdown_rx).await
        }
        TransportKind::Memory => {
            let transport = MemoryTransport::new(config.node_count);
            run(&config, node, topology, transport, shutdown_rx).await
        }
    };

    let report = match report {
        Ok(report) => report,
        Err(e) => {
            error!("Simulation aborted: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Outcome {:?}: {} rounds, {} sent, {} processed, {} dropped",
        report.outcome, report.rounds, report.messages_sent, report.messages_processed, report.dropped
    );
    println!("{}", report.network.table(node));

    match report.outcome {
        Outcome::Cancelled => anyhow::bail!("simulation cancelled before convergence"),
        Outcome::Stable | Outcome::Quiescent => Ok(()),
    }
}

async fn run<T: Transport>(
    config: &SimulationConfig,
    node: NodeId,
    topology: Topology,
    transport: T,
    shutdown: broadcast::Receiver<()>,
) -> Result<SimulationReport, dv_router::SimulationError> {
    let mut simulation = Simulation::new(topology, config.addresses()?, transport)
        .with_root(node)
        .with_max_rounds(config.max_rounds);

    if let Some(dir) = &config.output_dir {
        let writer = SnapshotWriter::new(dir).map_err(dv_router::SimulationError::Snapshot)?;
        simulation = simulation.with_snapshots(writer);
    }

    simulation.run(shutdown).await
}

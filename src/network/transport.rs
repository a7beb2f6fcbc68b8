use log::{debug, info};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;

use crate::error::TransportError;
use crate::types::{Address, AddressPlan, NodeId};

/// Receive buffer per datagram. Larger than the biggest table message
/// (26 nodes), so an oversized datagram shows up as a length mismatch.
pub const RECV_BUFFER: usize = 512;

/// One inbound message, already attributed to the node that received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Sending node, when the datagram came from one of the simulated endpoints.
    pub from: Option<NodeId>,
    pub to: NodeId,
    pub payload: Vec<u8>,
}

/// Addressable per-node message channel. Delivery order is not guaranteed.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends `payload` out of `from`'s endpoint towards `to`.
    async fn send(&self, from: NodeId, to: NodeId, payload: &[u8]) -> Result<(), TransportError>;

    /// Waits until any node has an inbound datagram.
    async fn recv(&mut self) -> Result<Datagram, TransportError>;

    /// Next datagram that is already waiting, without suspending.
    fn try_recv(&mut self) -> Result<Option<Datagram>, TransportError>;
}

type Inbound = Result<Datagram, TransportError>;

/// One UDP socket per node, bound to `host:(base + id)`. Every socket feeds a
/// shared queue, which is what the dispatch loop waits on.
pub struct UdpTransport {
    sockets: Vec<Arc<UdpSocket>>,
    peers: Vec<SocketAddr>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    readers: Vec<JoinHandle<()>>,
}

impl UdpTransport {
    /// Binds every node's socket, then starts one reader per socket. Nothing
    /// is spawned unless all binds succeed.
    pub async fn bind(host: IpAddr, node_count: usize, addresses: &AddressPlan) -> Result<Self, TransportError> {
        let mut sockets = Vec::with_capacity(node_count);
        let mut peers = Vec::with_capacity(node_count);

        for node in NodeId::all(node_count) {
            let addr = addresses.socket_addr(host, node).ok_or_else(|| TransportError::Bind {
                node,
                source: std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address for node"),
            })?;
            let socket = UdpSocket::bind(addr)
                .await
                .map_err(|source| TransportError::Bind { node, source })?;
            info!("Node {} listening on {}", node, addr);
            sockets.push(Arc::new(socket));
            peers.push(addr);
        }

        let (tx, inbound) = mpsc::unbounded_channel();
        let readers = NodeId::all(node_count)
            .zip(&sockets)
            .map(|(node, socket)| {
                tokio::spawn(receive_loop(
                    node,
                    socket.clone(),
                    *addresses,
                    node_count,
                    tx.clone(),
                ))
            })
            .collect();

        Ok(Self {
            sockets,
            peers,
            inbound,
            readers,
        })
    }
}

async fn receive_loop(
    node: NodeId,
    socket: Arc<UdpSocket>,
    addresses: AddressPlan,
    node_count: usize,
    tx: mpsc::UnboundedSender<Inbound>,
) {
    let mut buf = [0u8; RECV_BUFFER];
    loop {
        // Cleared every time so a short datagram never inherits stale bytes.
        buf.fill(0);
        let inbound = match socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                debug!("Node {} received {} bytes from {}", node, len, from);
                Ok(Datagram {
                    from: addresses.node_of(Address(from.port()), node_count),
                    to: node,
                    payload: buf[..len].to_vec(),
                })
            }
            Err(source) => Err(TransportError::Receive { node, source }),
        };
        let failed = inbound.is_err();
        if tx.send(inbound).is_err() || failed {
            break;
        }
    }
}

impl Transport for UdpTransport {
    async fn send(&self, from: NodeId, to: NodeId, payload: &[u8]) -> Result<(), TransportError> {
        let (socket, peer) = match (self.sockets.get(from.index()), self.peers.get(to.index())) {
            (Some(socket), Some(peer)) => (socket, *peer),
            _ => {
                return Err(TransportError::Send {
                    from,
                    to,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "unknown endpoint"),
                });
            }
        };
        socket
            .send_to(payload, peer)
            .await
            .map(|_| ())
            .map_err(|source| TransportError::Send { from, to, source })
    }

    async fn recv(&mut self) -> Result<Datagram, TransportError> {
        match self.inbound.recv().await {
            Some(inbound) => inbound,
            None => Err(TransportError::Closed),
        }
    }

    fn try_recv(&mut self) -> Result<Option<Datagram>, TransportError> {
        match self.inbound.try_recv() {
            Ok(inbound) => inbound.map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        for reader in &self.readers {
            reader.abort();
        }
    }
}

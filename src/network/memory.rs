use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::error::TransportError;
use crate::network::transport::{Datagram, Transport};
use crate::types::NodeId;

/// In-process transport: every node's inbound traffic goes through one
/// shared channel. Delivery is FIFO across the whole network.
pub struct MemoryTransport {
    node_count: usize,
    tx: mpsc::UnboundedSender<Datagram>,
    rx: mpsc::UnboundedReceiver<Datagram>,
}

impl MemoryTransport {
    pub fn new(node_count: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { node_count, tx, rx }
    }

    /// Handle for injecting datagrams from outside the simulation.
    pub fn injector(&self) -> mpsc::UnboundedSender<Datagram> {
        self.tx.clone()
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, from: NodeId, to: NodeId, payload: &[u8]) -> Result<(), TransportError> {
        if from.index() >= self.node_count || to.index() >= self.node_count {
            return Err(TransportError::Send {
                from,
                to,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unknown endpoint"),
            });
        }
        self.tx
            .send(Datagram {
                from: Some(from),
                to,
                payload: payload.to_vec(),
            })
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Result<Datagram, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }

    fn try_recv(&mut self) -> Result<Option<Datagram>, TransportError> {
        match self.rx.try_recv() {
            Ok(datagram) => Ok(Some(datagram)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_preserves_order() {
        let mut transport = MemoryTransport::new(2);
        transport.send(NodeId(0), NodeId(1), b"one").await.unwrap();
        transport.send(NodeId(1), NodeId(0), b"two").await.unwrap();

        let first = transport.recv().await.unwrap();
        assert_eq!(
            first,
            Datagram {
                from: Some(NodeId(0)),
                to: NodeId(1),
                payload: b"one".to_vec(),
            }
        );
        let second = transport.try_recv().unwrap().unwrap();
        assert_eq!(second.to, NodeId(0));
        assert_eq!(transport.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_a_send_failure() {
        let transport = MemoryTransport::new(2);
        let err = transport.send(NodeId(0), NodeId(5), b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::Send { to: NodeId(5), .. }));
    }
}

use super::{NodeId, Segment, SegmentKind};
use fxhash::FxHashSet;
use std::net::SocketAddrV4;

///
/// A identifier of a [`PacketSink`] within a network.
///
pub type SinkId = usize;

///
/// A listener that accepts stream connections on a port and
/// discards all received data, counting it.
///
/// A sink only counts data while it is active. Connections are
/// accepted regardless.
///
#[derive(Debug, Clone)]
pub struct PacketSink {
    node: NodeId,
    port: u16,
    active: bool,

    total_rx: u64,
    rx_packets: u64,
    peers: FxHashSet<SocketAddrV4>,
}

impl PacketSink {
    pub(super) fn new(node: NodeId, port: u16) -> Self {
        Self {
            node,
            port,
            active: false,
            total_rx: 0,
            rx_packets: 0,
            peers: FxHashSet::default(),
        }
    }

    /// The node the sink listens on.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The port the sink listens on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether received data is counted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    ///
    /// The total number of payload bytes received while active.
    ///
    #[must_use]
    pub fn total_rx(&self) -> u64 {
        self.total_rx
    }

    ///
    /// The number of data segments received while active.
    ///
    #[must_use]
    pub fn rx_packets(&self) -> u64 {
        self.rx_packets
    }

    /// The number of currently open connections.
    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.peers.len()
    }

    /// Starts counting received data.
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Stops counting received data.
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub(super) fn on_segment(&mut self, segment: &Segment) {
        match &segment.kind {
            SegmentKind::Syn => {
                if self.peers.insert(segment.src) {
                    tracing::debug!(
                        "sink n{}:{} accepted connection from {}",
                        self.node,
                        self.port,
                        segment.src
                    );
                }
            }
            SegmentKind::Data(bytes) => {
                if self.active {
                    self.total_rx += bytes.len() as u64;
                    self.rx_packets += 1;
                }
            }
            SegmentKind::Fin => {
                self.peers.remove(&segment.src);
            }
        }
    }
}

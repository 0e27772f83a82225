//!
//! Wired point-to-point networks.
//!
//! A [`Network`] consists of a [`Topology`] of nodes, connected by
//! bidirectional links with a fixed [`DataRate`] and propagation delay,
//! statically routed IPv4 addressing and a minimal stream transport,
//! consisting of [`StreamSocket`]s on the sending side and
//! [`PacketSink`]s on the receiving side.
//!

use bytes::Bytes;
use std::{
    error::Error,
    fmt::{self, Display},
    net::{Ipv4Addr, SocketAddrV4},
};

mod addr;
pub use addr::*;

mod link;
pub use link::*;

mod network;
pub use network::*;

mod rate;
pub use rate::*;

mod routing;
pub use routing::*;

mod sink;
pub use sink::*;

mod socket;
pub use socket::*;

mod topology;
pub use topology::*;

///
/// The number of bytes each segment carries in addition to its payload,
/// accounting for the IPv4 and transport headers.
///
pub const HEADER_BYTES: usize = 40;

///
/// A transport segment in transit.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The address of the sending socket.
    pub src: SocketAddrV4,
    /// The address of the receiving socket.
    pub dst: SocketAddrV4,
    /// The node that emitted the segment.
    pub origin: NodeId,
    /// The contents of the segment.
    pub kind: SegmentKind,
}

///
/// The type of a [`Segment`].
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Opens a stream.
    Syn,
    /// Carries application data.
    Data(Bytes),
    /// Closes a stream.
    Fin,
}

impl Segment {
    ///
    /// The number of application bytes carried by this segment.
    ///
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match &self.kind {
            SegmentKind::Data(bytes) => bytes.len(),
            SegmentKind::Syn | SegmentKind::Fin => 0,
        }
    }

    ///
    /// The number of bytes the segment occupies on a link.
    ///
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.payload_len() + HEADER_BYTES
    }
}

///
/// An error that occured while building or using a network.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetError {
    /// The subnet has a non-contiguous mask, host bits set in the
    /// network address, or no room for hosts.
    InvalidSubnet {
        /// The network address.
        network: Ipv4Addr,
        /// The subnet mask.
        mask: Ipv4Addr,
    },
    /// All host addresses of the subnet are allready assigned.
    AddressesExhausted {
        /// The network address.
        network: Ipv4Addr,
        /// The subnet mask.
        mask: Ipv4Addr,
    },
    /// The node does not exist in the topology.
    UnknownNode(NodeId),
    /// A link was requested from a node to itself.
    SelfLink(NodeId),
    /// The node has no interfaces, thus no address.
    NoAddress(NodeId),
    /// The port is allready bound on the node.
    PortInUse {
        /// The node.
        node: NodeId,
        /// The bound port.
        port: u16,
    },
}

impl Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSubnet { network, mask } => {
                write!(f, "invalid subnet {network}/{mask}")
            }
            Self::AddressesExhausted { network, mask } => {
                write!(f, "no addresses left in subnet {network}/{mask}")
            }
            Self::UnknownNode(node) => write!(f, "unknown node n{node}"),
            Self::SelfLink(node) => write!(f, "cannot link node n{node} to itself"),
            Self::NoAddress(node) => write!(f, "node n{node} has no address"),
            Self::PortInUse { node, port } => write!(f, "port {port} is in use on node n{node}"),
        }
    }
}

impl Error for NetError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(kind: SegmentKind) -> Segment {
        Segment {
            src: SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 1), 49153),
            dst: SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 2), 8080),
            origin: 0,
            kind,
        }
    }

    #[test]
    fn segment_sizes() {
        assert_eq!(segment(SegmentKind::Syn).wire_len(), HEADER_BYTES);
        assert_eq!(segment(SegmentKind::Fin).payload_len(), 0);

        let data = segment(SegmentKind::Data(Bytes::from(vec![0u8; 1000])));
        assert_eq!(data.payload_len(), 1000);
        assert_eq!(data.wire_len(), 1040);
    }

    #[test]
    fn error_display() {
        let err = NetError::PortInUse { node: 0, port: 8080 };
        assert_eq!(err.to_string(), "port 8080 is in use on node n0");
    }
}

use super::{NodeId, Segment, SegmentKind};
use bytes::Bytes;
use std::{
    error::Error,
    fmt::{self, Display},
    net::SocketAddrV4,
    sync::mpsc::Sender,
};

///
/// An establishable transport connection.
///
/// All operations complete synchronously from the callers view. Data
/// written to a connection is handed to the network immediately and
/// transmitted at the current simulation time.
///
pub trait Connection {
    ///
    /// Binds the connection to its local address.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection was allready bound or closed.
    ///
    fn bind(&mut self) -> Result<(), SocketError>;

    ///
    /// Establishes the connection to a remote peer, binding it
    /// first if nessecary.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is allready connected or closed.
    ///
    fn connect(&mut self, peer: SocketAddrV4) -> Result<(), SocketError>;

    ///
    /// Writes a chunk of data to the connection, returning the
    /// number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not connected.
    ///
    fn send(&mut self, data: Bytes) -> Result<usize, SocketError>;

    ///
    /// Closes the connection. Closing a closed connection is a no-op.
    ///
    fn close(&mut self);
}

///
/// An error returned by a [`Connection`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    /// The socket is allready bound.
    AlreadyBound,
    /// The socket is allready connected.
    AlreadyConnected,
    /// The socket has no remote peer.
    NotConnected,
    /// The socket was closed.
    Closed,
    /// The network that created the socket no longer exists.
    NetworkGone,
}

impl Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyBound => write!(f, "socket is allready bound"),
            Self::AlreadyConnected => write!(f, "socket is allready connected"),
            Self::NotConnected => write!(f, "socket is not connected"),
            Self::Closed => write!(f, "socket is closed"),
            Self::NetworkGone => write!(f, "network is no longer reachable"),
        }
    }
}

impl Error for SocketError {}

///
/// The lifecycle state of a [`StreamSocket`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketState {
    /// Created, but not yet bound.
    Fresh,
    /// Bound to the local address.
    Bound,
    /// Connected to a remote peer.
    Connected,
    /// Closed, no further operations possible.
    Closed,
}

///
/// A stream oriented socket on a node of a [`Network`](super::Network).
///
/// Segments written by the socket are queued and injected into the
/// network on the next [`Network::flush`](super::Network::flush).
///
#[derive(Debug)]
pub struct StreamSocket {
    node: NodeId,
    local: SocketAddrV4,
    peer: Option<SocketAddrV4>,
    state: SocketState,
    tx: Sender<Segment>,

    tx_bytes: u64,
}

impl StreamSocket {
    pub(super) fn new(node: NodeId, local: SocketAddrV4, tx: Sender<Segment>) -> Self {
        Self {
            node,
            local,
            peer: None,
            state: SocketState::Fresh,
            tx,
            tx_bytes: 0,
        }
    }

    /// The node the socket lives on.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The local address of the socket.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local
    }

    /// The remote peer, if connected.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddrV4> {
        self.peer
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.state
    }

    /// The number of payload bytes written to the socket.
    #[must_use]
    pub fn tx_bytes(&self) -> u64 {
        self.tx_bytes
    }

    fn emit(&self, dst: SocketAddrV4, kind: SegmentKind) -> Result<(), SocketError> {
        self.tx
            .send(Segment {
                src: self.local,
                dst,
                origin: self.node,
                kind,
            })
            .map_err(|_| SocketError::NetworkGone)
    }
}

impl Connection for StreamSocket {
    fn bind(&mut self) -> Result<(), SocketError> {
        match self.state {
            SocketState::Fresh => {
                self.state = SocketState::Bound;
                Ok(())
            }
            SocketState::Bound | SocketState::Connected => Err(SocketError::AlreadyBound),
            SocketState::Closed => Err(SocketError::Closed),
        }
    }

    fn connect(&mut self, peer: SocketAddrV4) -> Result<(), SocketError> {
        match self.state {
            SocketState::Fresh | SocketState::Bound => {
                self.emit(peer, SegmentKind::Syn)?;
                self.peer = Some(peer);
                self.state = SocketState::Connected;
                tracing::debug!("connecting {} -> {}", self.local, peer);
                Ok(())
            }
            SocketState::Connected => Err(SocketError::AlreadyConnected),
            SocketState::Closed => Err(SocketError::Closed),
        }
    }

    fn send(&mut self, data: Bytes) -> Result<usize, SocketError> {
        let peer = match (self.state, self.peer) {
            (SocketState::Connected, Some(peer)) => peer,
            (SocketState::Closed, _) => return Err(SocketError::Closed),
            _ => return Err(SocketError::NotConnected),
        };

        let len = data.len();
        self.emit(peer, SegmentKind::Data(data))?;
        self.tx_bytes += len as u64;
        Ok(len)
    }

    fn close(&mut self) {
        if let (SocketState::Connected, Some(peer)) = (self.state, self.peer) {
            if self.emit(peer, SegmentKind::Fin).is_err() {
                tracing::warn!("could not deliver FIN from {}, network is gone", self.local);
            }
        }
        self.state = SocketState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{net::Ipv4Addr, sync::mpsc};

    fn socket() -> (StreamSocket, mpsc::Receiver<Segment>) {
        let (tx, rx) = mpsc::channel();
        let local = SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, 2), 49153);
        (StreamSocket::new(2, local, tx), rx)
    }

    fn peer() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 2), 8080)
    }

    #[test]
    fn lifecycle() {
        let (mut socket, rx) = socket();
        assert_eq!(socket.state(), SocketState::Fresh);

        socket.bind().unwrap();
        assert_eq!(socket.bind(), Err(SocketError::AlreadyBound));

        socket.connect(peer()).unwrap();
        assert_eq!(socket.state(), SocketState::Connected);
        assert_eq!(socket.connect(peer()), Err(SocketError::AlreadyConnected));
        assert_eq!(rx.try_recv().unwrap().kind, SegmentKind::Syn);

        assert_eq!(socket.send(Bytes::from_static(&[0; 100])), Ok(100));
        let seg = rx.try_recv().unwrap();
        assert_eq!(seg.dst, peer());
        assert_eq!(seg.origin, 2);
        assert_eq!(seg.payload_len(), 100);
        assert_eq!(socket.tx_bytes(), 100);

        socket.close();
        assert_eq!(rx.try_recv().unwrap().kind, SegmentKind::Fin);
        assert_eq!(socket.state(), SocketState::Closed);

        socket.close();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn connect_binds_implicitly() {
        let (mut socket, _rx) = socket();
        socket.connect(peer()).unwrap();
        assert_eq!(socket.peer_addr(), Some(peer()));
    }

    #[test]
    fn send_requires_connection() {
        let (mut socket, rx) = socket();
        assert_eq!(
            socket.send(Bytes::from_static(b"abc")),
            Err(SocketError::NotConnected)
        );

        socket.close();
        assert_eq!(
            socket.send(Bytes::from_static(b"abc")),
            Err(SocketError::Closed)
        );
        assert_eq!(socket.connect(peer()), Err(SocketError::Closed));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_network() {
        let (mut socket, rx) = socket();
        drop(rx);
        assert_eq!(socket.connect(peer()), Err(SocketError::NetworkGone));
        assert_eq!(socket.state(), SocketState::Fresh);
    }
}

use super::{NetError, NodeId, PacketSink, Segment, SinkId, StreamSocket, Topology};
use crate::runtime::Scheduler;
use fxhash::FxHashMap;
use std::{
    net::SocketAddrV4,
    sync::mpsc::{self, Receiver, Sender},
};

///
/// The first port handed out to sockets without an explicit port.
///
pub const EPHEMERAL_PORT_START: u16 = 49153;

///
/// The event of a segment arriving at a node after transversing a link.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentArrival {
    /// The node the segment arrives at.
    pub node: NodeId,
    /// The segment itself.
    pub segment: Segment,
}

///
/// A statically routed network with attached transport endpoints.
///
/// The network does not own any events. Segments in transit are
/// represented by [`SegmentArrival`] events on the simulation
/// scheduler, so the network can be embedded into any application
/// whose event set can be created from arrivals.
///
#[derive(Debug)]
pub struct Network {
    topology: Topology,

    sinks: Vec<PacketSink>,
    listeners: FxHashMap<(NodeId, u16), SinkId>,
    next_port: FxHashMap<NodeId, u16>,

    tx: Sender<Segment>,
    rx: Receiver<Segment>,

    delivered: u64,
    dropped: u64,
}

impl Network {
    ///
    /// Creates a network on top of a topology, computing
    /// the routing tables of all nodes.
    ///
    #[must_use]
    pub fn new(mut topology: Topology) -> Self {
        topology.populate_routing_tables();
        let (tx, rx) = mpsc::channel();
        Self {
            topology,
            sinks: Vec::new(),
            listeners: FxHashMap::default(),
            next_port: FxHashMap::default(),
            tx,
            rx,
            delivered: 0,
            dropped: 0,
        }
    }

    /// The underlying topology.
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The underlying topology, mutably.
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    /// The number of segments delivered to a listener.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// The number of segments dropped, due to missing routes or listeners.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    ///
    /// Creates a new stream socket on the given node, using the
    /// nodes primary address and the next free ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist or has no address.
    ///
    pub fn socket(&mut self, node: NodeId) -> Result<StreamSocket, NetError> {
        let addr = self
            .topology
            .node(node)
            .ok_or(NetError::UnknownNode(node))?
            .primary_address()
            .ok_or(NetError::NoAddress(node))?;

        let next = self.next_port.entry(node).or_insert(EPHEMERAL_PORT_START);
        while self.listeners.contains_key(&(node, *next)) {
            *next = next.checked_add(1).unwrap_or(EPHEMERAL_PORT_START);
        }
        let port = *next;
        *next = next.checked_add(1).unwrap_or(EPHEMERAL_PORT_START);

        Ok(StreamSocket::new(
            node,
            SocketAddrV4::new(addr, port),
            self.tx.clone(),
        ))
    }

    ///
    /// Installs a new [`PacketSink`] listening on all addresses of a node.
    /// The sink is initally inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the node does not exist or the port is
    /// allready in use.
    ///
    pub fn listen(&mut self, node: NodeId, port: u16) -> Result<SinkId, NetError> {
        if self.topology.node(node).is_none() {
            return Err(NetError::UnknownNode(node));
        }
        if self.listeners.contains_key(&(node, port)) {
            return Err(NetError::PortInUse { node, port });
        }

        let id = self.sinks.len();
        self.sinks.push(PacketSink::new(node, port));
        self.listeners.insert((node, port), id);
        Ok(id)
    }

    /// The sink with the given id.
    #[must_use]
    pub fn sink(&self, id: SinkId) -> Option<&PacketSink> {
        self.sinks.get(id)
    }

    /// The sink with the given id, mutably.
    pub fn sink_mut(&mut self, id: SinkId) -> Option<&mut PacketSink> {
        self.sinks.get_mut(id)
    }

    /// All sinks, indexed by their id.
    #[must_use]
    pub fn sinks(&self) -> &[PacketSink] {
        &self.sinks
    }

    ///
    /// Injects all segments written by sockets since the last flush
    /// into the network, at the current simulation time.
    ///
    pub fn flush<E>(&mut self, scheduler: &mut Scheduler<E>)
    where
        E: From<SegmentArrival>,
    {
        while let Ok(segment) = self.rx.try_recv() {
            self.receive(segment.origin, segment, scheduler);
        }
    }

    ///
    /// Handles a segment arriving at a node, either delivering it
    /// locally or forwarding it towards its destination.
    ///
    pub fn handle_arrival<E>(&mut self, arrival: SegmentArrival, scheduler: &mut Scheduler<E>)
    where
        E: From<SegmentArrival>,
    {
        self.receive(arrival.node, arrival.segment, scheduler);
    }

    fn receive<E>(&mut self, node: NodeId, segment: Segment, scheduler: &mut Scheduler<E>)
    where
        E: From<SegmentArrival>,
    {
        let is_local = self
            .topology
            .node(node)
            .is_some_and(|n| n.owns(*segment.dst.ip()));

        if is_local {
            self.deliver(node, &segment);
        } else {
            self.forward(node, segment, scheduler);
        }
    }

    fn forward<E>(&mut self, node: NodeId, segment: Segment, scheduler: &mut Scheduler<E>)
    where
        E: From<SegmentArrival>,
    {
        let Some(channel_id) = self.topology.route(node, *segment.dst.ip()) else {
            tracing::warn!(
                "n{node} has no route to {}, dropping segment from {}",
                segment.dst.ip(),
                segment.src
            );
            self.dropped += 1;
            return;
        };
        let Some(channel) = self.topology.channel_mut(channel_id) else {
            self.dropped += 1;
            return;
        };

        let now = scheduler.now();
        let arrival = channel.transmit(now, segment.wire_len(), scheduler.rng());
        let next = channel.to();

        tracing::trace!(
            "n{node} -> n{next}: {} bytes for {} arriving at {arrival}",
            segment.wire_len(),
            segment.dst
        );
        scheduler.schedule_at(
            arrival,
            SegmentArrival {
                node: next,
                segment,
            },
        );
    }

    fn deliver(&mut self, node: NodeId, segment: &Segment) {
        let Some(&id) = self.listeners.get(&(node, segment.dst.port())) else {
            tracing::warn!(
                "n{node} has no listener on port {}, dropping segment from {}",
                segment.dst.port(),
                segment.src
            );
            self.dropped += 1;
            return;
        };

        self.sinks[id].on_segment(segment);
        self.delivered += 1;
    }
}

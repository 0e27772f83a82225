use super::{
    addr::subnet_of, Channel, ChannelId, Ipv4AddressAssigner, LinkMetrics, NetError, RouteEntry,
    RoutingTable,
};
use std::{collections::VecDeque, net::Ipv4Addr};

///
/// A identifier of a node within a topology.
///
pub type NodeId = usize;

///
/// A network interface of a node, attached to one end of a
/// point-to-point link.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// The address of the interface.
    pub addr: Ipv4Addr,
    /// The mask of the attached subnet.
    pub mask: Ipv4Addr,
    /// The outgoing channel of the link.
    pub channel: ChannelId,
    /// The node on the other end of the link.
    pub peer: NodeId,
}

///
/// A node in the topology.
///
#[derive(Debug, Clone, Default)]
pub struct Node {
    interfaces: Vec<Interface>,
    routes: RoutingTable,
}

impl Node {
    /// All interfaces of the node, in the order they were attached.
    #[must_use]
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    /// The routing table of the node.
    #[must_use]
    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    /// The address of the first interface, if any.
    #[must_use]
    pub fn primary_address(&self) -> Option<Ipv4Addr> {
        self.interfaces.first().map(|iface| iface.addr)
    }

    /// Indicates whether the address belongs to one of the interfaces.
    #[must_use]
    pub fn owns(&self, addr: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|iface| iface.addr == addr)
    }
}

///
/// A wired network of nodes, connected by bidirectional
/// point-to-point links.
///
#[derive(Debug, Default)]
pub struct Topology {
    nodes: Vec<Node>,
    channels: Vec<Channel>,
}

impl Topology {
    ///
    /// Creates a topology with `n` unconnected nodes.
    ///
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            nodes: vec![Node::default(); n],
            channels: Vec::new(),
        }
    }

    ///
    /// Adds a new unconnected node.
    ///
    pub fn add_node(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    /// The number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The node with the given id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All nodes, indexed by their id.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The channel with the given id.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    /// The channel with the given id, mutably.
    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    /// All channels.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    ///
    /// The channel transmitting from `from` to `to`, if the two
    /// nodes are directly connected.
    ///
    #[must_use]
    pub fn channel_between(&self, from: NodeId, to: NodeId) -> Option<ChannelId> {
        self.nodes
            .get(from)?
            .interfaces
            .iter()
            .find(|iface| iface.peer == to)
            .map(|iface| iface.channel)
    }

    ///
    /// The first address of a node.
    ///
    #[must_use]
    pub fn primary_address(&self, node: NodeId) -> Option<Ipv4Addr> {
        self.nodes.get(node)?.primary_address()
    }

    ///
    /// The node owning the given address.
    ///
    #[must_use]
    pub fn node_by_address(&self, addr: Ipv4Addr) -> Option<NodeId> {
        self.nodes.iter().position(|node| node.owns(addr))
    }

    ///
    /// Connects two nodes by a point-to-point link, assigning one address
    /// to each end. Returns the addresses of `a` and `b`.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the nodes does not exists, if `a == b`
    /// or if the assigner is out of addresses.
    ///
    pub fn connect(
        &mut self,
        a: NodeId,
        b: NodeId,
        metrics: LinkMetrics,
        assigner: &mut Ipv4AddressAssigner,
    ) -> Result<(Ipv4Addr, Ipv4Addr), NetError> {
        for node in [a, b] {
            if node >= self.nodes.len() {
                return Err(NetError::UnknownNode(node));
            }
        }
        if a == b {
            return Err(NetError::SelfLink(a));
        }

        let addr_a = assigner.next_address()?;
        let addr_b = assigner.next_address()?;
        let mask = assigner.mask();

        let ab = self.channels.len();
        self.channels.push(Channel::new(a, b, metrics));
        let ba = self.channels.len();
        self.channels.push(Channel::new(b, a, metrics));

        self.nodes[a].interfaces.push(Interface {
            addr: addr_a,
            mask,
            channel: ab,
            peer: b,
        });
        self.nodes[b].interfaces.push(Interface {
            addr: addr_b,
            mask,
            channel: ba,
            peer: a,
        });

        tracing::debug!("link n{a} ({addr_a}) <-> n{b} ({addr_b}) with {metrics}");
        Ok((addr_a, addr_b))
    }

    ///
    /// Computes static routes for all nodes, using hop count shortest paths.
    ///
    /// Every node gets one entry per link subnet. Subnets of attached links
    /// are directly connected, all others are reached through the first hop
    /// towards the nearer end of the link. Ties are broken towards the
    /// lower node id.
    ///
    pub fn populate_routing_tables(&mut self) {
        let subnets: Vec<(Ipv4Addr, Ipv4Addr, NodeId, NodeId)> = self
            .nodes
            .iter()
            .enumerate()
            .flat_map(|(id, node)| {
                node.interfaces
                    .iter()
                    .filter(move |iface| id < iface.peer)
                    .map(move |iface| (subnet_of(iface.addr, iface.mask), iface.mask, id, iface.peer))
            })
            .collect();

        for source in 0..self.nodes.len() {
            let (dist, first_iface) = self.shortest_paths(source);

            let mut table = RoutingTable::new();
            for &(destination, mask, a, b) in &subnets {
                if a == source || b == source {
                    let peer = if a == source { b } else { a };
                    let Some(iface) = self.nodes[source]
                        .interfaces
                        .iter()
                        .position(|iface| iface.peer == peer)
                    else {
                        continue;
                    };
                    table.add(RouteEntry {
                        destination,
                        mask,
                        gateway: None,
                        iface,
                        metric: 0,
                    });
                    continue;
                }

                let target = match (dist[a], dist[b]) {
                    (Some(da), Some(db)) if db < da => b,
                    (Some(_), _) => a,
                    (None, Some(_)) => b,
                    (None, None) => continue,
                };
                let (Some(metric), Some(iface)) = (dist[target], first_iface[target]) else {
                    continue;
                };

                let out = &self.nodes[source].interfaces[iface];
                let gateway = self.nodes[out.peer]
                    .interfaces
                    .iter()
                    .find(|peer_iface| peer_iface.peer == source)
                    .map(|peer_iface| peer_iface.addr);

                table.add(RouteEntry {
                    destination,
                    mask,
                    gateway,
                    iface,
                    metric,
                });
            }

            self.nodes[source].routes = table;
        }
    }

    // BFS returning hop distances and the interface index of the first hop.
    fn shortest_paths(&self, source: NodeId) -> (Vec<Option<u32>>, Vec<Option<usize>>) {
        let n = self.nodes.len();
        let mut dist = vec![None; n];
        let mut first_iface = vec![None; n];
        let mut queue = VecDeque::new();

        dist[source] = Some(0);
        queue.push_back(source);

        while let Some(node) = queue.pop_front() {
            let d = dist[node].unwrap_or(0);

            let mut neighbours: Vec<(NodeId, usize)> = self.nodes[node]
                .interfaces
                .iter()
                .enumerate()
                .map(|(i, iface)| (iface.peer, i))
                .collect();
            neighbours.sort_unstable();

            for (peer, iface) in neighbours {
                if dist[peer].is_some() {
                    continue;
                }
                dist[peer] = Some(d + 1);
                first_iface[peer] = if node == source {
                    Some(iface)
                } else {
                    first_iface[node]
                };
                queue.push_back(peer);
            }
        }

        (dist, first_iface)
    }

    ///
    /// The outgoing channel a node uses to reach `dst`.
    ///
    #[must_use]
    pub fn route(&self, node: NodeId, dst: Ipv4Addr) -> Option<ChannelId> {
        let node = self.nodes.get(node)?;
        let entry = node.routes.lookup(dst)?;
        node.interfaces.get(entry.iface).map(|iface| iface.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{net::DataRate, time::Duration};

    fn metrics() -> LinkMetrics {
        LinkMetrics::new(DataRate::from_mbps(2), Duration::from_millis(10))
    }

    fn subnet(third: u8) -> Ipv4AddressAssigner {
        Ipv4AddressAssigner::new(
            Ipv4Addr::new(10, 1, third, 0),
            Ipv4Addr::new(255, 255, 255, 0),
        )
        .unwrap()
    }

    // n0 - n1 - n2 - n3
    fn chain() -> Topology {
        let mut topo = Topology::new(4);
        topo.connect(0, 1, metrics(), &mut subnet(1)).unwrap();
        topo.connect(1, 2, metrics(), &mut subnet(2)).unwrap();
        topo.connect(2, 3, metrics(), &mut subnet(3)).unwrap();
        topo.populate_routing_tables();
        topo
    }

    #[test]
    fn connect_assigns_addresses() {
        let mut topo = Topology::new(2);
        let (a, b) = topo.connect(1, 0, metrics(), &mut subnet(1)).unwrap();
        assert_eq!(a, Ipv4Addr::new(10, 1, 1, 1));
        assert_eq!(b, Ipv4Addr::new(10, 1, 1, 2));
        assert_eq!(topo.primary_address(0), Some(b));
        assert_eq!(topo.node_by_address(a), Some(1));
        assert_eq!(topo.channels().len(), 2);

        let ch = topo.channel_between(1, 0).unwrap();
        assert_eq!(topo.channel(ch).unwrap().to(), 0);

        assert!(matches!(
            topo.connect(0, 5, metrics(), &mut subnet(2)),
            Err(NetError::UnknownNode(5))
        ));
        assert!(matches!(
            topo.connect(1, 1, metrics(), &mut subnet(2)),
            Err(NetError::SelfLink(1))
        ));
    }

    #[test]
    fn routes_follow_shortest_path() {
        let topo = chain();

        // n0 reaches every subnet through n1
        let routes = topo.node(0).unwrap().routes();
        assert_eq!(routes.len(), 3);
        let far = routes.lookup(Ipv4Addr::new(10, 1, 3, 2)).unwrap();
        assert_eq!(far.gateway, Some(Ipv4Addr::new(10, 1, 1, 2)));
        assert_eq!(far.metric, 2);

        let near = routes.lookup(Ipv4Addr::new(10, 1, 1, 2)).unwrap();
        assert_eq!(near.gateway, None);
        assert_eq!(near.metric, 0);

        // n2 reaches 10.1.1.0/24 via n1 and 10.1.3.0/24 directly
        let ch = topo.route(2, Ipv4Addr::new(10, 1, 1, 1)).unwrap();
        assert_eq!(topo.channel(ch).unwrap().to(), 1);
        let ch = topo.route(2, Ipv4Addr::new(10, 1, 3, 2)).unwrap();
        assert_eq!(topo.channel(ch).unwrap().to(), 3);
    }

    #[test]
    fn unreachable_subnets_have_no_routes() {
        let mut topo = Topology::new(4);
        topo.connect(0, 1, metrics(), &mut subnet(1)).unwrap();
        topo.connect(2, 3, metrics(), &mut subnet(2)).unwrap();
        topo.populate_routing_tables();

        assert_eq!(topo.node(0).unwrap().routes().len(), 1);
        assert!(topo.route(0, Ipv4Addr::new(10, 1, 2, 1)).is_none());
    }
}

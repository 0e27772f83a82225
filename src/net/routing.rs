use super::addr::in_subnet;
use std::{fmt::Display, net::Ipv4Addr};

///
/// A single entry of a [`RoutingTable`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// The destination network.
    pub destination: Ipv4Addr,
    /// The mask of the destination network.
    pub mask: Ipv4Addr,
    /// The next hop, or `None` for directly connected networks.
    pub gateway: Option<Ipv4Addr>,
    /// The outgoing interface.
    pub iface: usize,
    /// The number of hops to reach the destination network.
    pub metric: u32,
}

impl RouteEntry {
    ///
    /// Indicates whether this entry covers the given address.
    ///
    #[must_use]
    pub fn matches(&self, addr: Ipv4Addr) -> bool {
        in_subnet(addr, self.destination, self.mask)
    }

    fn prefix_len(&self) -> u32 {
        u32::from(self.mask).leading_ones()
    }
}

///
/// A static IPv4 routing table with longest prefix matching.
///
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<RouteEntry>,
}

impl RoutingTable {
    ///
    /// Creates an empty routing table.
    ///
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Adds a new entry.
    ///
    pub fn add(&mut self, entry: RouteEntry) {
        self.entries.push(entry);
    }

    ///
    /// Removes all entries.
    ///
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    ///
    /// All entries in insertion order.
    ///
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// The number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Indicates an empty table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    ///
    /// Finds the most specific route to the given address. Among equally
    /// specific routes the one with the lowest metric wins, then the one
    /// that was added first.
    ///
    #[must_use]
    pub fn lookup(&self, addr: Ipv4Addr) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(addr))
            .fold(None, |best: Option<&RouteEntry>, entry| match best {
                Some(best)
                    if (best.prefix_len(), u32::MAX - best.metric)
                        >= (entry.prefix_len(), u32::MAX - entry.metric) =>
                {
                    Some(best)
                }
                _ => Some(entry),
            })
    }
}

impl Display for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<16}{:<16}{:<16}{:<6}{:<7}Iface",
            "Destination", "Gateway", "Genmask", "Flags", "Metric"
        )?;
        for entry in &self.entries {
            let (gateway, flags) = match entry.gateway {
                Some(gateway) => (gateway, "UG"),
                None => (Ipv4Addr::UNSPECIFIED, "U"),
            };
            writeln!(
                f,
                "{:<16}{:<16}{:<16}{:<6}{:<7}{}",
                entry.destination.to_string(),
                gateway.to_string(),
                entry.mask.to_string(),
                flags,
                entry.metric,
                entry.iface
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(dest: [u8; 4], mask: [u8; 4], iface: usize, metric: u32) -> RouteEntry {
        RouteEntry {
            destination: Ipv4Addr::from(dest),
            mask: Ipv4Addr::from(mask),
            gateway: None,
            iface,
            metric,
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let mut table = RoutingTable::new();
        table.add(entry([10, 0, 0, 0], [255, 0, 0, 0], 0, 1));
        table.add(entry([10, 1, 2, 0], [255, 255, 255, 0], 1, 3));
        table.add(entry([10, 1, 2, 0], [255, 255, 255, 0], 2, 2));

        assert_eq!(table.lookup(Ipv4Addr::new(10, 1, 2, 5)).unwrap().iface, 2);
        assert_eq!(table.lookup(Ipv4Addr::new(10, 9, 2, 5)).unwrap().iface, 0);
        assert!(table.lookup(Ipv4Addr::new(192, 168, 0, 1)).is_none());
    }

    #[test]
    fn display_layout() {
        let mut table = RoutingTable::new();
        table.add(entry([10, 1, 1, 0], [255, 255, 255, 0], 0, 0));
        table.add(RouteEntry {
            gateway: Some(Ipv4Addr::new(10, 1, 1, 1)),
            ..entry([10, 1, 2, 0], [255, 255, 255, 0], 0, 1)
        });

        let s = table.to_string();
        let lines: Vec<&str> = s.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Destination     Gateway"));
        assert!(lines[1].starts_with("10.1.1.0        0.0.0.0         255.255.255.0   U "));
        assert!(lines[2].starts_with("10.1.2.0        10.1.1.1        255.255.255.0   UG"));
    }
}

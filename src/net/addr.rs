use super::NetError;
use std::net::Ipv4Addr;

///
/// Assigns consecutive host addresses out of an IPv4 subnet.
///
/// ```
/// # use pacesim::net::Ipv4AddressAssigner;
/// # use std::net::Ipv4Addr;
/// let mut assigner = Ipv4AddressAssigner::new(
///     Ipv4Addr::new(10, 1, 1, 0),
///     Ipv4Addr::new(255, 255, 255, 0),
/// ).unwrap();
/// assert_eq!(assigner.next_address().unwrap(), Ipv4Addr::new(10, 1, 1, 1));
/// assert_eq!(assigner.next_address().unwrap(), Ipv4Addr::new(10, 1, 1, 2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4AddressAssigner {
    network: u32,
    mask: u32,
    next_host: u32,
}

impl Ipv4AddressAssigner {
    ///
    /// Creates a new assigner for the given subnet.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask is not contiguous or the
    /// network address has host bits set.
    ///
    pub fn new(network: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, NetError> {
        let mut this = Self {
            network: 0,
            mask: 0,
            next_host: 1,
        };
        this.set_base(network, mask)?;
        Ok(this)
    }

    ///
    /// Moves the assigner to a new subnet, restarting at the first host.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask is not contiguous or the
    /// network address has host bits set.
    ///
    pub fn set_base(&mut self, network: Ipv4Addr, mask: Ipv4Addr) -> Result<(), NetError> {
        let net = u32::from(network);
        let m = u32::from(mask);

        if m.leading_ones() + m.trailing_zeros() != 32 || m.leading_ones() > 30 {
            return Err(NetError::InvalidSubnet { network, mask });
        }
        if net & !m != 0 {
            return Err(NetError::InvalidSubnet { network, mask });
        }

        self.network = net;
        self.mask = m;
        self.next_host = 1;
        Ok(())
    }

    ///
    /// The current network address.
    ///
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    ///
    /// The current subnet mask.
    ///
    #[must_use]
    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.mask)
    }

    ///
    /// Assigns the next free host address.
    ///
    /// # Errors
    ///
    /// Returns an error if the subnet has no free host addresses left.
    ///
    pub fn next_address(&mut self) -> Result<Ipv4Addr, NetError> {
        let broadcast = !self.mask;
        if self.next_host >= broadcast {
            return Err(NetError::AddressesExhausted {
                network: self.network(),
                mask: self.mask(),
            });
        }

        let addr = self.network | self.next_host;
        self.next_host += 1;
        Ok(Ipv4Addr::from(addr))
    }
}

///
/// Indicates whether `addr` lies within the subnet `network/mask`.
///
#[must_use]
pub fn in_subnet(addr: Ipv4Addr, network: Ipv4Addr, mask: Ipv4Addr) -> bool {
    u32::from(addr) & u32::from(mask) == u32::from(network) & u32::from(mask)
}

///
/// The subnet of `addr` under the given mask.
///
#[must_use]
pub fn subnet_of(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) & u32::from(mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_subnets() {
        assert!(Ipv4AddressAssigner::new(
            Ipv4Addr::new(10, 1, 1, 0),
            Ipv4Addr::new(255, 0, 255, 0)
        )
        .is_err());
        assert!(Ipv4AddressAssigner::new(
            Ipv4Addr::new(10, 1, 1, 7),
            Ipv4Addr::new(255, 255, 255, 0)
        )
        .is_err());
    }

    #[test]
    fn exhausts_small_subnets() {
        let mut assigner =
            Ipv4AddressAssigner::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 252))
                .unwrap();
        assert_eq!(assigner.next_address().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(assigner.next_address().unwrap(), Ipv4Addr::new(10, 0, 0, 2));
        assert!(matches!(
            assigner.next_address(),
            Err(NetError::AddressesExhausted { .. })
        ));

        assigner
            .set_base(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 0, 0, 0))
            .unwrap();
        assert_eq!(assigner.next_address().unwrap(), Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn subnet_helpers() {
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert!(in_subnet(Ipv4Addr::new(10, 1, 2, 9), Ipv4Addr::new(10, 1, 2, 0), mask));
        assert!(!in_subnet(Ipv4Addr::new(10, 1, 3, 9), Ipv4Addr::new(10, 1, 2, 0), mask));
        assert_eq!(subnet_of(Ipv4Addr::new(10, 1, 2, 9), mask), Ipv4Addr::new(10, 1, 2, 0));
    }
}

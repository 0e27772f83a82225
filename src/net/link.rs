use super::{DataRate, NodeId};
use crate::{
    time::{Duration, SimTime},
    trace::TracedValue,
};
use rand::{Rng, RngCore};
use std::fmt::Display;

///
/// Metrics that define a links capabilitites.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkMetrics {
    /// The maximum throughput of the link.
    pub rate: DataRate,
    /// The latency a packet endures while transversing the link.
    pub delay: Duration,
    /// The maximum additional random latency.
    pub jitter: Duration,
}

impl LinkMetrics {
    ///
    /// Creates a new instance of link metrics without jitter.
    ///
    #[must_use]
    pub const fn new(rate: DataRate, delay: Duration) -> Self {
        Self {
            rate,
            delay,
            jitter: Duration::ZERO,
        }
    }

    ///
    /// Adds a uniformly distributed jitter to the propagation delay.
    ///
    #[must_use]
    pub const fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    ///
    /// Calculate the duration the link is busy transmitting
    /// `bytes` bytes onto the medium.
    ///
    #[must_use]
    pub fn transmission_time(&self, bytes: usize) -> Duration {
        self.rate.transmission_time(bytes)
    }

    ///
    /// Calcualtes the duration a bit travels on the link after
    /// beeing put on the medium.
    ///
    pub fn propagation_delay(&self, rng: &mut dyn RngCore) -> Duration {
        if self.jitter.is_zero() {
            self.delay
        } else {
            let nanos = u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
            self.delay + Duration::from_nanos(rng.random_range(0..=nanos))
        }
    }
}

impl Display for LinkMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkMetrics")
            .field("rate", &self.rate)
            .field("delay", &self.delay)
            .field("jitter", &self.jitter)
            .finish()
    }
}

///
/// A identifier of a [`Channel`] within a topology.
///
pub type ChannelId = usize;

///
/// A representation of a one directional delayed link.
///
/// Packets are serialized onto the medium in FIFO order. A packet
/// that is enqueued while the channel is still busy starts transmitting
/// once all previous packets are on the medium. Arrival order equals
/// transmission order, even with jitter.
///
#[derive(Debug)]
pub struct Channel {
    from: NodeId,
    to: NodeId,
    metrics: LinkMetrics,

    busy_until: SimTime,
    last_arrival: SimTime,
    backlog: TracedValue<u64>,

    tx_packets: u64,
    tx_bytes: u64,
}

impl Channel {
    ///
    /// Creates a new channel using the given metrics,
    /// with an initially unbusy state.
    ///
    #[must_use]
    pub fn new(from: NodeId, to: NodeId, metrics: LinkMetrics) -> Self {
        Self {
            from,
            to,
            metrics,

            busy_until: SimTime::ZERO,
            last_arrival: SimTime::ZERO,
            backlog: TracedValue::new(0),

            tx_packets: 0,
            tx_bytes: 0,
        }
    }

    /// The transmitting node.
    #[must_use]
    pub fn from(&self) -> NodeId {
        self.from
    }

    /// The receiving node.
    #[must_use]
    pub fn to(&self) -> NodeId {
        self.to
    }

    ///
    /// A description of the channels capabilities,
    /// independent from its current state.
    ///
    #[must_use]
    pub fn metrics(&self) -> &LinkMetrics {
        &self.metrics
    }

    ///
    /// Indicates whether the channel is still transmitting at the given time.
    ///
    #[must_use]
    pub fn is_busy(&self, now: SimTime) -> bool {
        self.busy_until > now
    }

    ///
    /// The time the last enqueued packet will be fully transmitted onto the medium.
    ///
    #[must_use]
    pub fn transmission_finish_time(&self) -> SimTime {
        self.busy_until
    }

    /// The number of packets transmitted on this channel.
    #[must_use]
    pub fn tx_packets(&self) -> u64 {
        self.tx_packets
    }

    /// The number of bytes transmitted on this channel, including headers.
    #[must_use]
    pub fn tx_bytes(&self) -> u64 {
        self.tx_bytes
    }

    ///
    /// The number of bytes waiting for transmission, as traced value. The value
    /// is updated whenever a packet is enqueued.
    ///
    pub fn backlog(&mut self) -> &mut TracedValue<u64> {
        &mut self.backlog
    }

    ///
    /// Enqueues a packet of `bytes` bytes at time `now` and returns the
    /// time it arrives at the receiving node.
    ///
    pub fn transmit(&mut self, now: SimTime, bytes: usize, rng: &mut dyn RngCore) -> SimTime {
        let start = self.busy_until.max(now);
        self.busy_until = start + self.metrics.transmission_time(bytes);

        let backlog = self.metrics.rate.bytes_in(self.busy_until - now);
        self.backlog.set(now, backlog);

        let arrival = self.busy_until + self.metrics.propagation_delay(rng);
        self.last_arrival = arrival.max(self.last_arrival);

        self.tx_packets += 1;
        self.tx_bytes += bytes as u64;

        self.last_arrival
    }
}

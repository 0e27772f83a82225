use crate::{
    net::{Connection, DataRate, SocketError},
    runtime::{EventHandle, Scheduler},
    time::Duration,
};
use bytes::Bytes;
use std::{
    error::Error,
    fmt::{self, Display},
    net::SocketAddrV4,
};

///
/// A identifier of a traffic flow, used to route timer events
/// to their sender.
///
pub type FlowId = usize;

///
/// The event that triggers the next emission of a [`PacedSender`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendTimer {
    /// The flow of the sender that scheduled the timer.
    pub flow: FlowId,
}

///
/// The parameters of a [`PacedSender`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderConfig {
    /// The remote peer packets are sent to.
    pub destination: SocketAddrV4,
    /// The number of bytes per packet.
    pub packet_size: usize,
    /// The maximum number of packets emitted per run.
    pub packet_limit: u64,
    /// The target sending rate.
    pub rate: DataRate,
}

impl SenderConfig {
    ///
    /// Checks that the parameters describe a valid sender.
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::InvalidConfig`] for a zero rate
    /// or a zero packet size.
    ///
    pub fn validate(&self) -> Result<(), SenderError> {
        if self.rate.is_zero() {
            return Err(SenderError::InvalidConfig("target rate must be positive"));
        }
        if self.packet_size == 0 {
            return Err(SenderError::InvalidConfig("packet size must be positive"));
        }
        Ok(())
    }

    ///
    /// The time between the starts of two consecutive emissions,
    /// `packet_size * 8 / rate`.
    ///
    #[must_use]
    pub fn inter_packet_delay(&self) -> Duration {
        self.rate.transmission_time(self.packet_size)
    }
}

///
/// An error returned by a [`PacedSender`].
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderError {
    /// The sender was started without a connection.
    NotConfigured,
    /// The sender parameters are invalid.
    InvalidConfig(&'static str),
    /// The sender is allready running.
    AlreadyRunning,
    /// The underlying connection failed.
    Socket(SocketError),
}

impl Display for SenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "sender is not configured"),
            Self::InvalidConfig(reason) => write!(f, "invalid sender config: {reason}"),
            Self::AlreadyRunning => write!(f, "sender is allready running"),
            Self::Socket(e) => write!(f, "connection failed: {e}"),
        }
    }
}

impl Error for SenderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Socket(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SocketError> for SenderError {
    fn from(value: SocketError) -> Self {
        Self::Socket(value)
    }
}

///
/// The lifecycle state of a [`PacedSender`].
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SenderState {
    /// No connection or parameters were provided.
    Unconfigured,
    /// Ready to start.
    Configured,
    /// Started and not yet stopped. A running sender may have
    /// reached its packet limit.
    Running,
    /// Stopped after running.
    Stopped,
}

///
/// A traffic source that emits packets of a fixed size at a
/// constant rate over an owned connection.
///
/// On start the sender connects to its destination and emits the first
/// packet immediatly. Every further emission is scheduled
/// [`SenderConfig::inter_packet_delay`] after the previous one, until
/// either the packet limit is reached or the sender is stopped.
/// Stopping cancels the pending emission, so no packet is emitted after
/// a stop.
///
/// # Examples
///
/// ```
/// # use pacesim::prelude::*;
/// # use std::net::{Ipv4Addr, SocketAddrV4};
/// let config = SenderConfig {
///     destination: SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 2), 8080),
///     packet_size: 1000,
///     packet_limit: 3,
///     rate: DataRate::from_bps(8000),
/// };
/// assert_eq!(config.inter_packet_delay(), Duration::from_secs(1));
/// ```
#[derive(Debug)]
pub struct PacedSender<C> {
    flow: FlowId,
    connection: Option<C>,
    config: Option<SenderConfig>,

    running: bool,
    stopped: bool,
    packets_sent: u64,
    pending: Option<EventHandle>,
}

impl<C: Connection> PacedSender<C> {
    ///
    /// Creates a new unconfigured sender for the given flow.
    ///
    #[must_use]
    pub fn new(flow: FlowId) -> Self {
        Self {
            flow,
            connection: None,
            config: None,
            running: false,
            stopped: false,
            packets_sent: 0,
            pending: None,
        }
    }

    /// The flow of this sender.
    #[must_use]
    pub fn flow(&self) -> FlowId {
        self.flow
    }

    /// The current parameters.
    #[must_use]
    pub fn config(&self) -> Option<&SenderConfig> {
        self.config.as_ref()
    }

    /// The owned connection.
    #[must_use]
    pub fn connection(&self) -> Option<&C> {
        self.connection.as_ref()
    }

    /// The number of packets emitted since the last start.
    #[must_use]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Indicates whether the sender was started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    ///
    /// Indicates whether the sender has emitted all packets
    /// of its limit.
    ///
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.config
            .is_some_and(|config| self.packets_sent >= config.packet_limit)
    }

    /// The handle of the next scheduled emission.
    #[must_use]
    pub fn pending(&self) -> Option<EventHandle> {
        self.pending
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SenderState {
        if self.running {
            SenderState::Running
        } else if self.stopped {
            SenderState::Stopped
        } else if self.connection.is_some() {
            SenderState::Configured
        } else {
            SenderState::Unconfigured
        }
    }

    ///
    /// The time between two emissions, if configured.
    ///
    #[must_use]
    pub fn inter_packet_delay(&self) -> Option<Duration> {
        self.config.as_ref().map(SenderConfig::inter_packet_delay)
    }

    ///
    /// Provides the connection and parameters. The sender takes
    /// ownership of the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid or the sender
    /// is currently running. The sender remains unchanged in that case.
    ///
    pub fn configure(&mut self, connection: C, config: SenderConfig) -> Result<(), SenderError> {
        if self.running {
            return Err(SenderError::AlreadyRunning);
        }
        config.validate()?;

        self.connection = Some(connection);
        self.config = Some(config);
        Ok(())
    }

    ///
    /// Starts the sender, connecting to the destination and emitting
    /// the first packet at the current simulation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender is not configured, allready running
    /// or if the connection could not be established.
    ///
    pub fn start<E>(&mut self, scheduler: &mut Scheduler<E>) -> Result<(), SenderError>
    where
        E: From<SendTimer>,
    {
        if self.running {
            return Err(SenderError::AlreadyRunning);
        }
        let (Some(connection), Some(config)) = (self.connection.as_mut(), self.config) else {
            return Err(SenderError::NotConfigured);
        };

        match connection.bind() {
            Ok(()) | Err(SocketError::AlreadyBound) => {}
            Err(e) => return Err(e.into()),
        }
        connection.connect(config.destination)?;

        self.running = true;
        self.stopped = false;
        self.packets_sent = 0;

        tracing::info!(
            "flow {} started towards {} ({} packets of {} bytes at {})",
            self.flow,
            config.destination,
            config.packet_limit,
            config.packet_size,
            config.rate
        );

        if config.packet_limit > 0 {
            if let Err(e) = self.emit(scheduler) {
                // back to configured, nothing was emitted
                self.running = false;
                return Err(e);
            }
        }
        Ok(())
    }

    ///
    /// Stops the sender, cancelling the next emission and closing the
    /// connection. Stopping a stopped or never started sender only
    /// clears the running flag.
    ///
    pub fn stop<E>(&mut self, scheduler: &mut Scheduler<E>) {
        let was_running = std::mem::replace(&mut self.running, false);

        if let Some(handle) = self.pending.take() {
            scheduler.cancel(handle);
        }

        if was_running {
            self.stopped = true;
            if let Some(connection) = self.connection.as_mut() {
                connection.close();
            }
            tracing::info!(
                "flow {} stopped after {} packets",
                self.flow,
                self.packets_sent
            );
        }
    }

    ///
    /// Handles a [`SendTimer`] of this sender, emitting the next packet.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection rejected the packet. No further
    /// emissions are scheduled in that case.
    ///
    pub fn handle_timer<E>(&mut self, scheduler: &mut Scheduler<E>) -> Result<(), SenderError>
    where
        E: From<SendTimer>,
    {
        self.pending = None;
        if !self.running {
            return Ok(());
        }
        self.emit(scheduler)
    }

    fn emit<E>(&mut self, scheduler: &mut Scheduler<E>) -> Result<(), SenderError>
    where
        E: From<SendTimer>,
    {
        let (Some(connection), Some(config)) = (self.connection.as_mut(), self.config) else {
            return Err(SenderError::NotConfigured);
        };
        if self.packets_sent >= config.packet_limit {
            return Ok(());
        }

        let payload = Bytes::from(vec![0u8; config.packet_size]);
        connection.send(payload)?;
        self.packets_sent += 1;

        if self.packets_sent < config.packet_limit {
            self.schedule_next(scheduler, config.inter_packet_delay());
        } else {
            tracing::debug!("flow {} reached its limit", self.flow);
        }
        Ok(())
    }

    fn schedule_next<E>(&mut self, scheduler: &mut Scheduler<E>, delay: Duration)
    where
        E: From<SendTimer>,
    {
        if self.running {
            self.pending = Some(scheduler.schedule_in(delay, SendTimer { flow: self.flow }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::SimTime;
    use rand::{rngs::StdRng, SeedableRng};
    use std::net::Ipv4Addr;

    #[derive(Debug, Default)]
    struct MockConnection {
        bound: bool,
        peer: Option<SocketAddrV4>,
        closed: bool,
        sent: Vec<usize>,
        refuse: bool,
    }

    impl Connection for MockConnection {
        fn bind(&mut self) -> Result<(), SocketError> {
            if self.closed {
                return Err(SocketError::Closed);
            }
            self.bound = true;
            Ok(())
        }

        fn connect(&mut self, peer: SocketAddrV4) -> Result<(), SocketError> {
            if self.closed {
                return Err(SocketError::Closed);
            }
            self.peer = Some(peer);
            Ok(())
        }

        fn send(&mut self, data: Bytes) -> Result<usize, SocketError> {
            if self.refuse {
                return Err(SocketError::NotConnected);
            }
            self.sent.push(data.len());
            Ok(data.len())
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn config(limit: u64, rate: u64) -> SenderConfig {
        SenderConfig {
            destination: SocketAddrV4::new(Ipv4Addr::new(10, 1, 1, 2), 8080),
            packet_size: 1000,
            packet_limit: limit,
            rate: DataRate::from_bps(rate),
        }
    }

    fn sender(limit: u64, rate: u64) -> PacedSender<MockConnection> {
        let mut sender = PacedSender::new(0);
        sender
            .configure(MockConnection::default(), config(limit, rate))
            .unwrap();
        sender
    }

    fn scheduler() -> Scheduler<SendTimer> {
        Scheduler::new(SimTime::ZERO, StdRng::seed_from_u64(0))
    }

    // Dispatches timers until `until`, returning the emission times.
    fn drive(
        sender: &mut PacedSender<MockConnection>,
        sched: &mut Scheduler<SendTimer>,
        until: SimTime,
    ) -> Vec<SimTime> {
        let mut emissions = Vec::new();
        while sched.peek_time().is_some_and(|t| t <= until) {
            let (timer, time) = sched.pop_next().unwrap();
            assert_eq!(timer.flow, 0);

            let before = sender.packets_sent();
            sender.handle_timer(sched).unwrap();
            if sender.packets_sent() > before {
                emissions.push(time);
            }
        }
        emissions
    }

    #[test]
    fn emits_at_constant_rate_until_limit() {
        let mut sender = sender(3, 8000);
        let mut sched = scheduler();

        sender.start(&mut sched).unwrap();
        assert_eq!(sender.packets_sent(), 1);

        let emissions = drive(&mut sender, &mut sched, SimTime::MAX);
        assert_eq!(emissions, vec![SimTime::from(1.0), SimTime::from(2.0)]);
        assert_eq!(sender.packets_sent(), 3);
        assert_eq!(sender.connection().unwrap().sent, vec![1000; 3]);

        assert!(sched.is_empty());
        assert!(sender.is_exhausted());
        assert!(sender.is_running());
        assert_eq!(sender.pending(), None);
    }

    #[test]
    fn inter_packet_delay_is_exact() {
        let sender = sender(10, 3_000_000);
        // 8000 bits at 3Mbit/s are 2666666.66..ns
        assert_eq!(
            sender.inter_packet_delay(),
            Some(Duration::from_nanos(2_666_666))
        );
    }

    #[test]
    fn stop_cancels_pending_emission() {
        let mut sender = sender(100, 8000);
        let mut sched = scheduler();

        sender.start(&mut sched).unwrap();
        let emissions = drive(&mut sender, &mut sched, SimTime::from(2.5));
        assert_eq!(emissions.len(), 2);

        let handle = sender.pending().unwrap();
        sender.stop(&mut sched);
        assert!(!sched.is_pending(handle));
        assert!(sched.is_empty());
        assert_eq!(sender.state(), SenderState::Stopped);
        assert!(sender.connection().unwrap().closed);

        assert!(drive(&mut sender, &mut sched, SimTime::MAX).is_empty());
        assert_eq!(sender.packets_sent(), 3);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut sched = scheduler();

        let mut sender = sender(5, 8000);
        sender.stop(&mut sched);
        assert_eq!(sender.state(), SenderState::Configured);
        assert!(!sender.connection().unwrap().closed);

        sender.start(&mut sched).unwrap();
        sender.stop(&mut sched);
        sender.stop(&mut sched);
        assert_eq!(sender.state(), SenderState::Stopped);
        assert_eq!(sender.packets_sent(), 1);
        assert!(sched.is_empty());
    }

    #[test]
    fn zero_limit_emits_nothing() {
        let mut sender = sender(0, 8000);
        let mut sched = scheduler();

        sender.start(&mut sched).unwrap();
        assert_eq!(sender.packets_sent(), 0);
        assert!(sched.is_empty());
        assert!(sender.is_exhausted());
    }

    #[test]
    fn start_requires_configuration() {
        let mut sched = scheduler();
        let mut sender = PacedSender::<MockConnection>::new(0);
        assert_eq!(sender.state(), SenderState::Unconfigured);
        assert_eq!(sender.start(&mut sched), Err(SenderError::NotConfigured));

        let mut sender = self::sender(5, 8000);
        sender.start(&mut sched).unwrap();
        assert_eq!(sender.start(&mut sched), Err(SenderError::AlreadyRunning));
        assert_eq!(
            sender.configure(MockConnection::default(), config(5, 8000)),
            Err(SenderError::AlreadyRunning)
        );
    }

    #[test]
    fn configure_rejects_invalid_parameters() {
        let mut sender = PacedSender::new(0);
        assert!(matches!(
            sender.configure(MockConnection::default(), config(5, 0)),
            Err(SenderError::InvalidConfig(_))
        ));

        let mut zero_size = config(5, 8000);
        zero_size.packet_size = 0;
        assert!(matches!(
            sender.configure(MockConnection::default(), zero_size),
            Err(SenderError::InvalidConfig(_))
        ));
        assert_eq!(sender.state(), SenderState::Unconfigured);
    }

    #[test]
    fn restart_after_stop_surfaces_socket_error() {
        let mut sender = sender(5, 8000);
        let mut sched = scheduler();

        sender.start(&mut sched).unwrap();
        sender.stop(&mut sched);
        assert_eq!(
            sender.start(&mut sched),
            Err(SenderError::Socket(SocketError::Closed))
        );
        assert!(!sender.is_running());
    }

    #[test]
    fn failed_send_ends_pacing() {
        let mut sched = scheduler();
        let mut sender = PacedSender::new(0);
        let connection = MockConnection {
            refuse: true,
            ..Default::default()
        };
        sender.configure(connection, config(5, 8000)).unwrap();

        assert_eq!(
            sender.start(&mut sched),
            Err(SenderError::Socket(SocketError::NotConnected))
        );
        assert_eq!(sender.packets_sent(), 0);
        assert!(sched.is_empty());
        assert!(!sender.is_running());
        assert_eq!(sender.state(), SenderState::Configured);
        assert_eq!(sender.pending(), None);

        // a stop after the failed start does not close the connection
        sender.stop(&mut sched);
        assert_eq!(sender.state(), SenderState::Configured);
        assert!(!sender.connection().unwrap().closed);
    }
}

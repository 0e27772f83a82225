//!
//! Declarative simulation scenarios.
//!
//! A [`ScenarioConfig`] describes a wired topology, the packet sinks and
//! paced flows on top of it, and the traces to record. [`Scenario`] is the
//! [`Application`] that executes such a description on a [`Runtime`].
//!

use crate::{
    app::{FlowId, PacedSender, SendTimer, SenderError},
    net::{
        Ipv4AddressAssigner, LinkMetrics, NetError, Network, SegmentArrival, SinkId,
        StreamSocket, Topology,
    },
    runtime::{Application, Builder, Event, Runtime, RuntimeError, Scheduler},
    time::SimTime,
    trace::{ThroughputMonitor, TraceWriter},
};
use serde::Serialize;
use std::{
    cell::RefCell,
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
    rc::Rc,
};

mod config;
pub use config::*;

///
/// The event set of a [`Scenario`].
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioEvent {
    /// A sink starts counting received data.
    StartSink(SinkId),
    /// A sink stops counting received data.
    StopSink(SinkId),
    /// A flow starts sending.
    StartFlow(FlowId),
    /// A flow stops sending.
    StopFlow(FlowId),
    /// A flow emits its next packet.
    Emit(SendTimer),
    /// A segment arrives at a node.
    Arrival(SegmentArrival),
    /// The throughput of all sinks is sampled.
    SampleThroughput,
    /// The routing tables are written to a file.
    PrintRoutes,
}

impl From<SendTimer> for ScenarioEvent {
    fn from(value: SendTimer) -> Self {
        Self::Emit(value)
    }
}

impl From<SegmentArrival> for ScenarioEvent {
    fn from(value: SegmentArrival) -> Self {
        Self::Arrival(value)
    }
}

impl Event<Scenario> for ScenarioEvent {
    fn handle(self, runtime: &mut Runtime<Scenario>) {
        let (app, sched) = runtime.split();
        match self {
            Self::StartSink(id) => {
                if let Some(sink) = app.network.sink_mut(id) {
                    sink.start();
                }
            }
            Self::StopSink(id) => {
                if let Some(sink) = app.network.sink_mut(id) {
                    sink.stop();
                }
            }
            Self::StartFlow(id) => {
                if let Some(flow) = app.flows.get_mut(id) {
                    if let Err(e) = flow.start(sched) {
                        tracing::error!("flow {id} failed to start: {e}");
                    }
                }
            }
            Self::StopFlow(id) => {
                if let Some(flow) = app.flows.get_mut(id) {
                    flow.stop(sched);
                }
            }
            Self::Emit(timer) => {
                if let Some(flow) = app.flows.get_mut(timer.flow) {
                    if let Err(e) = flow.handle_timer(sched) {
                        tracing::error!("flow {} failed to send: {e}", timer.flow);
                    }
                }
            }
            Self::Arrival(arrival) => app.network.handle_arrival(arrival, sched),
            Self::SampleThroughput => app.sample_throughput(sched),
            Self::PrintRoutes => app.print_routes(sched.now()),
        }

        app.network.flush(sched);
    }
}

///
/// An application executing a [`ScenarioConfig`].
///
#[derive(Debug)]
pub struct Scenario {
    config: ScenarioConfig,
    network: Network,
    flows: Vec<PacedSender<StreamSocket>>,

    throughput: Option<ThroughputMonitor>,
    queue_traces: Vec<Rc<RefCell<TraceWriter>>>,
    io_error: Option<io::Error>,
}

impl Scenario {
    ///
    /// Builds the network, senders and traces of a scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario is inconsistent or a trace
    /// file could not be created.
    ///
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;

        let mut topology = Topology::new(config.nodes);
        for link in &config.links {
            let mut assigner = Ipv4AddressAssigner::new(link.network, link.mask)?;
            let metrics = LinkMetrics::new(link.rate, link.delay).with_jitter(link.jitter);
            topology.connect(link.a, link.b, metrics, &mut assigner)?;
        }
        let mut network = Network::new(topology);

        let sinks = config
            .sinks
            .iter()
            .map(|sink| network.listen(sink.node, sink.port))
            .collect::<Result<Vec<_>, _>>()?;

        let mut flows = Vec::with_capacity(config.flows.len());
        for (id, flow) in config.flows.iter().enumerate() {
            let sink = &config.sinks[flow.sink];
            let addr = network
                .topology()
                .primary_address(sink.node)
                .ok_or(NetError::NoAddress(sink.node))?;

            let socket = network.socket(flow.node)?;
            let mut sender = PacedSender::new(id);
            sender
                .configure(socket, config.sender_config(id, addr))
                .map_err(|source| ScenarioError::InvalidFlow { flow: id, source })?;
            flows.push(sender);
        }

        let output = |file: &PathBuf| config.output_dir.join(file);
        let create = |path: PathBuf| {
            TraceWriter::create(&path).map_err(|source| ScenarioError::Io { path, source })
        };

        let throughput = match &config.throughput {
            Some(tp) => {
                let path = output(&tp.file);
                let monitor = ThroughputMonitor::new(&path, sinks, tp.interval)
                    .map_err(|source| ScenarioError::Io { path, source })?;
                Some(monitor)
            }
            None => None,
        };

        let mut queue_traces = Vec::with_capacity(config.queue_traces.len());
        for trace in &config.queue_traces {
            let channel = network
                .topology()
                .channel_between(trace.from, trace.to)
                .ok_or(ScenarioError::NoLink {
                    from: trace.from,
                    to: trace.to,
                })?;

            let writer = Rc::new(RefCell::new(create(output(&trace.file))?));
            let sink = Rc::clone(&writer);
            if let Some(channel) = network.topology_mut().channel_mut(channel) {
                channel.backlog().connect(move |time, old, new| {
                    if let Err(e) = sink.borrow_mut().record(time, &[&old, &new]) {
                        tracing::warn!("failed to record backlog: {e}");
                    }
                });
            }
            queue_traces.push(writer);
        }

        Ok(Self {
            config,
            network,
            flows,
            throughput,
            queue_traces,
            io_error: None,
        })
    }

    ///
    /// Creates a runtime executing the scenario, limited to the
    /// scenarios stop time.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario could not be created.
    ///
    pub fn build(config: ScenarioConfig, builder: Builder) -> Result<Runtime<Self>, ScenarioError> {
        let stop_time = config.stop_time;
        let app = Self::new(config)?;
        Ok(builder.max_time(stop_time).build(app))
    }

    ///
    /// Builds and executes a scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario could not be created or
    /// the traces could not be written.
    ///
    pub fn run(config: ScenarioConfig, builder: Builder) -> Result<ScenarioReport, ScenarioError> {
        let runtime = Self::build(config, builder)?;
        let (app, end_time, profiler) = runtime.run().map_err(ScenarioError::Runtime)?;
        Ok(app.report(end_time, profiler.event_count))
    }

    /// The scenario description.
    #[must_use]
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// The simulated network.
    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The paced senders, indexed by their flow id.
    #[must_use]
    pub fn flows(&self) -> &[PacedSender<StreamSocket>] {
        &self.flows
    }

    ///
    /// Summarizes the state of all flows and sinks.
    ///
    #[must_use]
    pub fn report(&self, end_time: SimTime, events: usize) -> ScenarioReport {
        ScenarioReport {
            end_time,
            events,
            delivered: self.network.delivered(),
            dropped: self.network.dropped(),
            flows: self
                .flows
                .iter()
                .zip(&self.config.flows)
                .map(|(sender, flow)| FlowReport {
                    node: flow.node,
                    destination: sender
                        .config()
                        .map(|config| config.destination.to_string())
                        .unwrap_or_default(),
                    packets_sent: sender.packets_sent(),
                })
                .collect(),
            sinks: self
                .network
                .sinks()
                .iter()
                .map(|sink| SinkReport {
                    node: sink.node(),
                    port: sink.port(),
                    total_rx: sink.total_rx(),
                    rx_packets: sink.rx_packets(),
                })
                .collect(),
        }
    }

    fn sample_throughput(&mut self, sched: &mut Scheduler<ScenarioEvent>) {
        let Some(monitor) = self.throughput.as_mut() else {
            return;
        };
        if let Err(e) = monitor.sample(sched.now(), &self.network) {
            tracing::error!("failed to sample throughput: {e}");
            self.io_error.get_or_insert(e);
            return;
        }
        sched.schedule_in(monitor.interval(), ScenarioEvent::SampleThroughput);
    }

    fn print_routes(&mut self, now: SimTime) {
        let Some(routes) = &self.config.routes else {
            return;
        };
        let path = self.config.output_dir.join(&routes.file);

        let result = TraceWriter::create(&path).and_then(|mut writer| {
            for (id, node) in self.network.topology().nodes().iter().enumerate() {
                writer.line(format_args!("Node: n{id}, Time: {now}"))?;
                writer.line(node.routes())?;
            }
            writer.flush()
        });

        match result {
            Ok(()) => tracing::info!("routing tables written to {}", path.display()),
            Err(e) => {
                tracing::error!("failed to write routing tables: {e}");
                self.io_error.get_or_insert(e);
            }
        }
    }
}

impl Application for Scenario {
    type EventSet = ScenarioEvent;

    fn at_sim_start(runtime: &mut Runtime<Self>) {
        let (app, sched) = runtime.split();
        let config = &app.config;

        // times before a custom start time happen at the start
        let now = sched.now();
        let at = |time: SimTime| time.max(now);

        for (id, sink) in config.sinks.iter().enumerate() {
            sched.schedule_at(at(sink.start), ScenarioEvent::StartSink(id));
            sched.schedule_at(at(sink.stop), ScenarioEvent::StopSink(id));
        }
        for (id, flow) in config.flows.iter().enumerate() {
            sched.schedule_at(at(flow.start), ScenarioEvent::StartFlow(id));
            sched.schedule_at(at(flow.stop), ScenarioEvent::StopFlow(id));
        }
        if let Some(throughput) = &config.throughput {
            sched.schedule_at(at(throughput.start), ScenarioEvent::SampleThroughput);
        }
        if let Some(routes) = &config.routes {
            sched.schedule_at(at(routes.at), ScenarioEvent::PrintRoutes);
        }

        tracing::info!(
            "scenario with {} nodes, {} links and {} flows",
            config.nodes,
            config.links.len(),
            config.flows.len()
        );
    }

    fn at_sim_end(runtime: &mut Runtime<Self>) -> Result<(), RuntimeError> {
        let app = &mut runtime.app;

        if let Some(monitor) = app.throughput.as_mut() {
            monitor.writer().flush()?;
        }
        for writer in &app.queue_traces {
            writer.borrow_mut().flush()?;
        }

        match app.io_error.take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

///
/// A summary of an executed scenario.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioReport {
    /// The time of the last dispatched event.
    pub end_time: SimTime,
    /// The number of dispatched events.
    pub events: usize,
    /// The number of segments delivered to sinks.
    pub delivered: u64,
    /// The number of segments dropped.
    pub dropped: u64,
    /// Per flow results, indexed by flow id.
    pub flows: Vec<FlowReport>,
    /// Per sink results, indexed by sink id.
    pub sinks: Vec<SinkReport>,
}

/// The results of a single flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowReport {
    /// The sending node.
    pub node: usize,
    /// The destination socket address.
    pub destination: String,
    /// The number of emitted packets.
    pub packets_sent: u64,
}

/// The results of a single sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    /// The listening node.
    pub node: usize,
    /// The listening port.
    pub port: u16,
    /// The number of payload bytes counted.
    pub total_rx: u64,
    /// The number of data segments counted.
    pub rx_packets: u64,
}

impl Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "ended at {} after {} events ({} delivered, {} dropped)",
            self.end_time, self.events, self.delivered, self.dropped
        )?;
        for (id, flow) in self.flows.iter().enumerate() {
            writeln!(
                f,
                "  flow {id}: n{} -> {} sent {} packets",
                flow.node, flow.destination, flow.packets_sent
            )?;
        }
        for (id, sink) in self.sinks.iter().enumerate() {
            writeln!(
                f,
                "  sink {id}: n{}:{} received {} bytes in {} packets",
                sink.node, sink.port, sink.total_rx, sink.rx_packets
            )?;
        }
        Ok(())
    }
}

///
/// An error that prevents a scenario from being built or executed.
///
#[derive(Debug)]
pub enum ScenarioError {
    /// A file could not be read or written.
    Io {
        /// The file in question.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The scenario description is malformed.
    Parse(serde_yml::Error),
    /// A node index is out of range.
    UnknownNode {
        /// The referencing item.
        what: &'static str,
        /// The node index.
        node: usize,
    },
    /// A flow references a sink that does not exist.
    UnknownSink {
        /// The flow index.
        flow: usize,
        /// The sink index.
        sink: usize,
    },
    /// A trace references two nodes that are not directly linked.
    NoLink {
        /// The transmitting node.
        from: usize,
        /// The receiving node.
        to: usize,
    },
    /// A flow has invalid sender parameters.
    InvalidFlow {
        /// The flow index.
        flow: usize,
        /// The rejection reason.
        source: SenderError,
    },
    /// The topology could not be built.
    Net(NetError),
    /// Any other inconsistency.
    Invalid(String),
    /// The simulation reported a failure at its end.
    Runtime(RuntimeError),
}

impl Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Parse(e) => write!(f, "malformed scenario: {e}"),
            Self::UnknownNode { what, node } => write!(f, "{what} references unknown node n{node}"),
            Self::UnknownSink { flow, sink } => {
                write!(f, "flow {flow} references unknown sink {sink}")
            }
            Self::NoLink { from, to } => write!(f, "no link from n{from} to n{to}"),
            Self::InvalidFlow { flow, source } => write!(f, "flow {flow}: {source}"),
            Self::Net(e) => write!(f, "invalid topology: {e}"),
            Self::Invalid(reason) => write!(f, "invalid scenario: {reason}"),
            Self::Runtime(e) => write!(f, "simulation failed: {e}"),
        }
    }
}

impl Error for ScenarioError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::InvalidFlow { source, .. } => Some(source),
            Self::Net(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_yml::Error> for ScenarioError {
    fn from(value: serde_yml::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<NetError> for ScenarioError {
    fn from(value: NetError) -> Self {
        Self::Net(value)
    }
}

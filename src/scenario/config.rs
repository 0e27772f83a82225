use super::ScenarioError;
use crate::{
    app::SenderConfig,
    net::{DataRate, NodeId, SinkId},
    runtime::Builder,
    time::{Duration, SimTime},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{Ipv4Addr, SocketAddrV4},
    path::{Path, PathBuf},
};

///
/// A complete description of a simulation scenario.
///
/// Scenarios are usually loaded from YAML files. Times are given in
/// seconds, link delays and intervals as human readable durations
/// like `10ms`.
///
/// ```yaml
/// seed: 42
/// stop_time: 10.0
/// nodes: 2
/// links:
///   - { a: 1, b: 0, rate: 2Mbps, delay: 10ms, network: 10.1.1.0 }
/// sinks:
///   - { node: 0, port: 8080, start: 0.0, stop: 10.0 }
/// flows:
///   - { node: 1, sink: 0, packet_size: 1000, packets: 100, rate: 1Mbps, start: 1.0, stop: 10.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// The seed of the simulation RNG. Seeded by the OS if absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// The last point in time events are dispatched at.
    pub stop_time: SimTime,
    /// The directory all trace files are created in.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// The number of nodes.
    pub nodes: usize,
    /// The point-to-point links between nodes.
    pub links: Vec<LinkConfig>,
    /// The packet sinks.
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
    /// The paced traffic flows.
    #[serde(default)]
    pub flows: Vec<FlowConfig>,

    /// Periodic throughput sampling of all sinks.
    #[serde(default)]
    pub throughput: Option<ThroughputConfig>,
    /// Backlog traces of individual channels.
    #[serde(default)]
    pub queue_traces: Vec<QueueTraceConfig>,
    /// A dump of all routing tables.
    #[serde(default)]
    pub routes: Option<RoutesConfig>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_mask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 0)
}

///
/// A bidirectional point-to-point link.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// The first end, receiving the first address of the subnet.
    pub a: NodeId,
    /// The second end.
    pub b: NodeId,
    /// The data rate in both directions.
    pub rate: DataRate,
    /// The propagation delay.
    #[serde(with = "human_duration")]
    pub delay: Duration,
    /// The maximum additional random delay.
    #[serde(default, with = "human_duration")]
    pub jitter: Duration,
    /// The subnet the link addresses are assigned from.
    pub network: Ipv4Addr,
    /// The subnet mask.
    #[serde(default = "default_mask")]
    pub mask: Ipv4Addr,
}

///
/// A packet sink listening on a node.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// The listening node.
    pub node: NodeId,
    /// The listening port.
    pub port: u16,
    /// The time the sink starts counting.
    #[serde(default)]
    pub start: SimTime,
    /// The time the sink stops counting.
    pub stop: SimTime,
}

///
/// A paced flow from a node to one of the sinks.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowConfig {
    /// The sending node.
    pub node: NodeId,
    /// The index of the receiving sink.
    pub sink: SinkId,
    /// The number of bytes per packet.
    pub packet_size: usize,
    /// The maximum number of packets.
    pub packets: u64,
    /// The target sending rate.
    pub rate: DataRate,
    /// The time the sender starts.
    pub start: SimTime,
    /// The time the sender stops.
    pub stop: SimTime,
}

///
/// Periodic throughput sampling.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThroughputConfig {
    /// The trace file, relative to the output directory.
    pub file: PathBuf,
    /// The time of the first sample.
    pub start: SimTime,
    /// The time between two samples.
    #[serde(with = "human_duration")]
    pub interval: Duration,
}

///
/// A backlog trace of the channel from one node to another.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueTraceConfig {
    /// The transmitting node.
    pub from: NodeId,
    /// The receiving node.
    pub to: NodeId,
    /// The trace file, relative to the output directory.
    pub file: PathBuf,
}

///
/// A dump of all routing tables at a given time.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// The output file, relative to the output directory.
    pub file: PathBuf,
    /// The time the tables are written.
    pub at: SimTime,
}

impl ScenarioConfig {
    ///
    /// Loads and validates a scenario from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a valid
    /// scenario description or fails validation.
    ///
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    ///
    /// Parses and validates a scenario from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid scenario description
    /// or fails validation.
    ///
    pub fn from_yaml(raw: &str) -> Result<Self, ScenarioError> {
        let config: Self = serde_yml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    ///
    /// Serializes the scenario as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    ///
    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        Ok(serde_yml::to_string(self)?)
    }

    ///
    /// Checks all cross references and parameters of the scenario.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    ///
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let node = |what: &'static str, node: NodeId| {
            if node < self.nodes {
                Ok(())
            } else {
                Err(ScenarioError::UnknownNode { what, node })
            }
        };

        for link in &self.links {
            node("link", link.a)?;
            node("link", link.b)?;
        }
        for sink in &self.sinks {
            node("sink", sink.node)?;
            if sink.stop < sink.start {
                return Err(ScenarioError::Invalid(format!(
                    "sink on n{}:{} stops before it starts",
                    sink.node, sink.port
                )));
            }
        }
        for (i, flow) in self.flows.iter().enumerate() {
            node("flow", flow.node)?;
            if flow.sink >= self.sinks.len() {
                return Err(ScenarioError::UnknownSink {
                    flow: i,
                    sink: flow.sink,
                });
            }
            if flow.stop < flow.start {
                return Err(ScenarioError::Invalid(format!(
                    "flow {i} stops before it starts"
                )));
            }
            self.sender_config(i, Ipv4Addr::UNSPECIFIED)
                .validate()
                .map_err(|source| ScenarioError::InvalidFlow { flow: i, source })?;
        }
        for trace in &self.queue_traces {
            node("queue trace", trace.from)?;
            node("queue trace", trace.to)?;
        }
        if let Some(throughput) = &self.throughput {
            if throughput.interval.is_zero() {
                return Err(ScenarioError::Invalid(
                    "throughput interval must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    ///
    /// A runtime builder seeded by the scenario seed.
    ///
    pub fn builder(&self) -> Builder {
        match self.seed {
            Some(seed) => Builder::seeded(seed),
            None => Builder::new(),
        }
    }

    pub(super) fn sender_config(&self, flow: usize, addr: Ipv4Addr) -> SenderConfig {
        let flow = &self.flows[flow];
        let port = self.sinks.get(flow.sink).map_or(0, |sink| sink.port);
        SenderConfig {
            destination: SocketAddrV4::new(addr, port),
            packet_size: flow.packet_size,
            packet_limit: flow.packets,
            rate: flow.rate,
        }
    }

    ///
    /// A star shaped scenario of five nodes, with three paced flows
    /// competing for the link towards node 0.
    ///
    /// ```text
    ///  n2 --- 2Mbps ---\
    ///  n3 --- 5Mbps --- n1 --- 2Mbps --- n0
    ///  n4 --- 1Mbps ---/
    /// ```
    ///
    #[must_use]
    pub fn star() -> Self {
        let link = |a, b, mbps, third| LinkConfig {
            a,
            b,
            rate: DataRate::from_mbps(mbps),
            delay: Duration::from_millis(10),
            jitter: Duration::ZERO,
            network: Ipv4Addr::new(10, 1, third, 0),
            mask: default_mask(),
        };
        let sink = |port| SinkConfig {
            node: 0,
            port,
            start: SimTime::ZERO,
            stop: SimTime::from(120.0),
        };
        let flow = |node, sink, packets, mbps, start: f64| FlowConfig {
            node,
            sink,
            packet_size: 1000,
            packets,
            rate: DataRate::from_mbps(mbps),
            start: SimTime::from(start),
            stop: SimTime::from(120.0),
        };
        let queue = |from, to, file: &str| QueueTraceConfig {
            from,
            to,
            file: PathBuf::from(file),
        };

        Self {
            seed: Some(1),
            stop_time: SimTime::from(120.0),
            output_dir: default_output_dir(),
            nodes: 5,
            links: vec![
                link(1, 0, 2, 1),
                link(2, 1, 2, 2),
                link(3, 1, 5, 3),
                link(4, 1, 1, 4),
            ],
            sinks: vec![sink(8080), sink(8081), sink(8082)],
            flows: vec![
                flow(2, 0, 25_000, 2, 1.0),
                flow(3, 1, 25_000, 5, 15.0),
                flow(4, 2, 5_000, 1, 30.0),
            ],
            throughput: Some(ThroughputConfig {
                file: PathBuf::from("star_throughput.rx"),
                start: SimTime::from(1.1),
                interval: Duration::from_millis(100),
            }),
            queue_traces: vec![
                queue(2, 1, "star_flow1.backlog"),
                queue(3, 1, "star_flow2.backlog"),
                queue(4, 1, "star_flow3.backlog"),
                queue(1, 0, "star_bottleneck.backlog"),
            ],
            routes: Some(RoutesConfig {
                file: PathBuf::from("star.routes"),
                at: SimTime::from(2.0),
            }),
        }
    }
}

mod human_duration {
    use crate::time::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

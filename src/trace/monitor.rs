use super::TraceWriter;
use crate::{
    net::{Network, SinkId},
    time::{Duration, SimTime},
};
use std::{fmt::Display, io, path::Path};

///
/// A periodic sampler of the throughput observed by a set of sinks.
///
/// Each sample records the simulation time, followed by the throughput
/// in Mbit/s since the last sample and the cumulative number of received
/// bytes, for every observed sink. The monitor does not schedule itself,
/// the owning application calls [`ThroughputMonitor::sample`] every
/// [`ThroughputMonitor::interval`].
///
#[derive(Debug)]
pub struct ThroughputMonitor {
    sinks: Vec<SinkId>,
    last: Vec<u64>,
    interval: Duration,
    writer: TraceWriter,
}

impl ThroughputMonitor {
    ///
    /// Creates a new monitor observing the given sinks, writing into
    /// a new trace file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trace file could not be created.
    ///
    pub fn new(path: impl AsRef<Path>, sinks: Vec<SinkId>, interval: Duration) -> io::Result<Self> {
        Ok(Self {
            last: vec![0; sinks.len()],
            sinks,
            interval,
            writer: TraceWriter::create(path)?,
        })
    }

    /// The sampling interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The observed sinks.
    #[must_use]
    pub fn sinks(&self) -> &[SinkId] {
        &self.sinks
    }

    /// The underlying trace file.
    pub fn writer(&mut self) -> &mut TraceWriter {
        &mut self.writer
    }

    ///
    /// Records a sample of all observed sinks.
    ///
    /// # Errors
    ///
    /// Returns an error if writing the trace failed.
    ///
    pub fn sample(&mut self, now: SimTime, network: &Network) -> io::Result<()> {
        let secs = self.interval.as_secs_f64();
        let mut values: Vec<Box<dyn Display>> = Vec::with_capacity(2 * self.sinks.len());

        for (sink, last) in self.sinks.iter().zip(self.last.iter_mut()) {
            let total = network.sink(*sink).map_or(0, |s| s.total_rx());
            let delta = total.saturating_sub(*last);
            *last = total;

            let mbps = if secs > 0.0 {
                delta as f64 * 8.0 / secs * 1e-6
            } else {
                0.0
            };
            values.push(Box::new(mbps));
            values.push(Box::new(total));
        }

        let refs = values.iter().map(|v| &**v).collect::<Vec<&dyn Display>>();
        self.writer.record(now, &refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Topology;
    use std::fs;

    #[test]
    fn samples_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("throughput.rx");

        let mut network = Network::new(Topology::new(1));
        let a = network.listen(0, 8080).unwrap();
        let b = network.listen(0, 8081).unwrap();

        let mut monitor =
            ThroughputMonitor::new(&path, vec![a, b], Duration::from_millis(100)).unwrap();
        monitor.sample(SimTime::from(1.0), &network).unwrap();
        monitor.writer().flush().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "1\t0\t0\t0\t0\n");
    }
}

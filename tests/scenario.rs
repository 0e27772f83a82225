use pacesim::{prelude::*, scenario::LinkConfig};

const STAR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/star.yml");

#[test]
fn star_file_matches_builtin() {
    let config = ScenarioConfig::load(STAR).unwrap();
    assert_eq!(config, ScenarioConfig::star());
}

#[test]
fn star_runs_until_stop_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ScenarioConfig::star();
    config.output_dir = dir.path().to_path_buf();
    config.stop_time = SimTime::from(40.0);

    let report = Scenario::run(config, Builder::seeded(1).quiet()).unwrap();
    assert_eq!(report.end_time, SimTime::from(40.0));

    // One packet every 4ms from 1s, 1.6ms from 15s and 8ms from 30s,
    // up to and including 40s.
    let sent = report
        .flows
        .iter()
        .map(|flow| flow.packets_sent)
        .collect::<Vec<_>>();
    assert_eq!(sent, vec![9751, 15626, 1251]);

    for (flow, sink) in report.flows.iter().zip(&report.sinks) {
        assert!(sink.total_rx <= flow.packets_sent * 1000);
    }
    // The third flow queues behind the backlog of the bottleneck
    // link, which builds up while the first two flows overload it.
    assert!(report.sinks[0].total_rx > 0);
    assert!(report.sinks[1].total_rx > 0);
    assert_eq!(report.dropped, 0);

    for file in [
        "star_throughput.rx",
        "star_flow1.backlog",
        "star_bottleneck.backlog",
        "star.routes",
    ] {
        assert!(dir.path().join(file).exists(), "missing {file}");
    }

    let throughput = std::fs::read_to_string(dir.path().join("star_throughput.rx")).unwrap();
    let first = throughput.lines().next().unwrap();
    assert!(first.starts_with("1.1\t"));
    assert_eq!(first.split('\t').count(), 7);
}

#[test]
fn packet_limit_bounds_emissions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ScenarioConfig::star();
    config.output_dir = dir.path().to_path_buf();
    config.stop_time = SimTime::from(40.0);
    config.flows[0].packets = 100;

    let report = Scenario::run(config, Builder::seeded(1).quiet()).unwrap();
    assert_eq!(report.flows[0].packets_sent, 100);
    assert_eq!(report.sinks[0].total_rx, 100_000);
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ScenarioConfig::star();
        config.output_dir = dir.path().to_path_buf();
        config.stop_time = SimTime::from(20.0);
        config.throughput = None;
        config.queue_traces.clear();
        config.routes = None;
        for link in &mut config.links {
            *link = LinkConfig {
                jitter: Duration::from_millis(2),
                ..link.clone()
            };
        }
        Scenario::run(config, Builder::seeded(42).quiet()).unwrap()
    };

    assert_eq!(run(), run());
}

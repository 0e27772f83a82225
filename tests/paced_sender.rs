use pacesim::{
    net::{Ipv4AddressAssigner, SinkId},
    prelude::*,
};
use std::net::{Ipv4Addr, SocketAddrV4};

/// A single flow from n1 to a sink on n0.
struct App {
    network: Network,
    sender: PacedSender<StreamSocket>,
    sink: SinkId,
    emissions: Vec<SimTime>,
}

#[derive(Debug)]
enum Events {
    Start,
    Stop,
    Emit(SendTimer),
    Arrival(SegmentArrival),
}

impl From<SendTimer> for Events {
    fn from(value: SendTimer) -> Self {
        Self::Emit(value)
    }
}

impl From<SegmentArrival> for Events {
    fn from(value: SegmentArrival) -> Self {
        Self::Arrival(value)
    }
}

impl Event<App> for Events {
    fn handle(self, rt: &mut Runtime<App>) {
        let (app, sched) = rt.split();
        let before = app.sender.packets_sent();
        match self {
            Self::Start => app.sender.start(sched).unwrap(),
            Self::Stop => app.sender.stop(sched),
            Self::Emit(_) => app.sender.handle_timer(sched).unwrap(),
            Self::Arrival(arrival) => app.network.handle_arrival(arrival, sched),
        }
        if app.sender.packets_sent() > before {
            app.emissions.push(sched.now());
        }
        app.network.flush(sched);
    }
}

impl Application for App {
    type EventSet = Events;
}

fn app(packet_limit: u64, rate: DataRate) -> App {
    let mut topology = Topology::new(2);
    let mut assigner =
        Ipv4AddressAssigner::new(Ipv4Addr::new(10, 1, 1, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
    topology
        .connect(
            1,
            0,
            LinkMetrics::new(DataRate::from_mbps(10), Duration::from_millis(5)),
            &mut assigner,
        )
        .unwrap();

    let mut network = Network::new(topology);
    let sink = network.listen(0, 8080).unwrap();
    network.sink_mut(sink).unwrap().start();

    let destination = SocketAddrV4::new(network.topology().primary_address(0).unwrap(), 8080);
    let mut sender = PacedSender::new(0);
    sender
        .configure(
            network.socket(1).unwrap(),
            SenderConfig {
                destination,
                packet_size: 1000,
                packet_limit,
                rate,
            },
        )
        .unwrap();

    App {
        network,
        sender,
        sink,
        emissions: Vec::new(),
    }
}

#[test]
fn emissions_follow_the_target_rate() {
    let mut rt = Builder::seeded(1)
        .quiet()
        .build(app(3, DataRate::from_bps(8000)));
    rt.add_event(Events::Start, SimTime::ZERO);

    let (app, _, _) = rt.run().unwrap();
    assert_eq!(
        app.emissions,
        vec![SimTime::ZERO, SimTime::from(1.0), SimTime::from(2.0)]
    );
    assert_eq!(app.sender.packets_sent(), 3);
    assert!(app.sender.is_exhausted());

    let sink = app.network.sink(app.sink).unwrap();
    assert_eq!(sink.total_rx(), 3000);
    assert_eq!(sink.num_connections(), 1);
}

#[test]
fn stop_prevents_further_emissions() {
    let mut rt = Builder::seeded(1)
        .quiet()
        .build(app(1000, DataRate::from_bps(8000)));
    rt.add_event(Events::Start, SimTime::from(1.0));
    rt.add_event(Events::Stop, SimTime::from(3.5));
    rt.add_event(Events::Stop, SimTime::from(4.0));

    let (app, time, _) = rt.run().unwrap();
    assert_eq!(app.sender.packets_sent(), 3);
    assert_eq!(app.emissions.last(), Some(&SimTime::from(3.0)));
    assert!(!app.sender.is_running());

    // The FIN closes the connection at the sink.
    let sink = app.network.sink(app.sink).unwrap();
    assert_eq!(sink.num_connections(), 0);
    assert_eq!(time, SimTime::from(4.0));
}

#[test]
fn restart_after_stop_fails_on_closed_socket() {
    let mut rt = Builder::seeded(1)
        .quiet()
        .build(app(10, DataRate::from_bps(8000)));
    rt.start();
    {
        let (app, sched) = rt.split();
        app.sender.start(sched).unwrap();
        app.sender.stop(sched);
        assert_eq!(
            app.sender.start(sched),
            Err(SenderError::Socket(pacesim::net::SocketError::Closed))
        );
    }
    rt.dispatch_all();

    let (app, _, _) = rt.finish().unwrap();
    assert_eq!(app.sender.packets_sent(), 1);
}

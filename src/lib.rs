#![allow(clippy::needless_doctest_main)]
//!
//! A discrete event simulation of paced traffic sources on wired networks.
//!
//! pacesim provides a small discrete event [`runtime`] with a cancellable,
//! deterministic timer queue, a statically routed point-to-point network
//! model in [`net`], and [`PacedSender`](crate::app::PacedSender)s that emit
//! fixed size packets at a constant rate over a stream connection.
//!
//! # Building a simple event simulation
//!
//! At its core pacesim provides the tools to build an event simulation with
//! completely custom events.
//!
//! ```
//! use pacesim::prelude::*;
//!
//! enum MyEventSet {
//!     Tick(usize),
//! }
//!
//! impl Event<MyApp> for MyEventSet {
//!     fn handle(self, rt: &mut Runtime<MyApp>) {
//!         let MyEventSet::Tick(n) = self;
//!         let (app, sched) = rt.split();
//!         app.ticks += 1;
//!         if n > 0 {
//!             sched.schedule_in(Duration::from_secs(1), MyEventSet::Tick(n - 1));
//!         }
//!     }
//! }
//!
//! #[derive(Default)]
//! struct MyApp {
//!     ticks: usize,
//! }
//!
//! impl Application for MyApp {
//!     type EventSet = MyEventSet;
//!     fn at_sim_start(rt: &mut Runtime<Self>) {
//!         rt.add_event(MyEventSet::Tick(3), SimTime::ZERO);
//!     }
//! }
//!
//! fn main() {
//!     let rt = Builder::seeded(123).quiet().build(MyApp::default());
//!     let (app, time, _) = rt.run().unwrap();
//!     assert_eq!(app.ticks, 4);
//!     assert_eq!(time, SimTime::from(3.0));
//! }
//! ```
//!
//! The [Application](crate::runtime::Application) object is the global state
//! of the simulation, stored inside the runtime. Events receive the whole
//! runtime and may use [`Runtime::split`](crate::runtime::Runtime::split) to
//! mutate the application while scheduling further events. There is no global
//! clock, the current time is owned by the runtimes
//! [`Scheduler`](crate::runtime::Scheduler).
//!
//! # Simulating paced traffic
//!
//! The [`scenario`] module combines network, senders and traces into a
//! ready to use application, driven by a [`ScenarioConfig`](crate::scenario::ScenarioConfig)
//! that is usually loaded from a YAML file.
//!
//! ```no_run
//! use pacesim::prelude::*;
//!
//! let config = ScenarioConfig::star();
//! let report = Scenario::run(config, Builder::seeded(1)).unwrap();
//! println!("{report}");
//! ```
//!

pub mod prelude;

pub mod app;
pub mod logger;
pub mod net;
pub mod runtime;
pub mod scenario;
pub mod time;
pub mod trace;

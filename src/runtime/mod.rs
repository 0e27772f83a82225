//!
//! Central primitives for running a discrete event simulation.
//!
//! A [`Runtime`] owns an [`Application`], the global state of a
//! simulation, and a [`Scheduler`], the future event set together
//! with the simulation clock. Events are dispatched strictly in
//! deadline order, events with equal deadlines in the order they
//! were scheduled.
//!

use crate::time::{Duration, SimTime};
use std::{
    any::type_name,
    fmt::{Debug, Display},
};

mod bench;
pub use bench::*;

mod builder;
pub use builder::*;

mod error;
pub use error::*;

mod event;
pub use event::*;

mod limit;
pub use limit::*;

mod scheduler;
pub use scheduler::*;

pub(crate) const SYM_CHECKMARK: char = '\u{2713}';

///
/// The central managment point for a generic
/// instance of a discrete event based simulation.
///
/// # Generic usage
///
/// - Create an 'App' struct that implements the trait [`Application`].
///   This struct will hold the systems state and define the event set used in the simulation.
/// - Create an event set, usually an enum, that implements [`Event`] for 'App'.
/// - Build the runtime using a [`Builder`] and schedule the initial events,
///   either directly or in [`Application::at_sim_start`].
///
/// Event handlers receive the whole runtime. Use [`Runtime::split`] to
/// mutate the application while scheduling new events.
pub struct Runtime<App>
where
    App: Application,
{
    /// The contained runtime application, defining globals and the used event set.
    pub app: App,

    scheduler: Scheduler<App::EventSet>,
    state: State,

    // Rt limits
    limit: RuntimeLimit,
    itr: usize,

    // Misc
    quiet: bool,
    profiler: Profiler,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum State {
    Ready,
    Running,
}

impl<A> Runtime<A>
where
    A: Application,
{
    ///
    /// Returns the number of events that were scheduled on this [`Runtime`] instance.
    ///
    #[inline]
    pub fn num_events_scheduled(&self) -> u64 {
        self.scheduler.num_scheduled()
    }

    ///
    /// Returns the number of events that were recieved & handled on this [`Runtime`] instance.
    ///
    pub fn num_events_dispatched(&self) -> usize {
        self.itr
    }

    ///
    /// Returns the current simulation time.
    ///
    pub fn sim_time(&self) -> SimTime {
        self.scheduler.now()
    }

    ///
    /// Returns the future event set of this runtime.
    ///
    pub fn scheduler(&mut self) -> &mut Scheduler<A::EventSet> {
        &mut self.scheduler
    }

    ///
    /// Borrows the application and the future event set at the same time.
    ///
    pub fn split(&mut self) -> (&mut A, &mut Scheduler<A::EventSet>) {
        (&mut self.app, &mut self.scheduler)
    }

    ///
    /// Adds and event to the furtue event heap that will be handled at the given time.
    /// Note that this time must not lie in the past, or this
    /// function will panic.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacesim::prelude::*;
    ///
    /// # struct MyApp();
    /// # impl Application for MyApp {
    /// #     type EventSet = MyEventSet;
    /// # }
    /// #
    /// # enum MyEventSet {
    /// #     EventA,
    /// #     EventB
    /// # }
    /// # impl Event<MyApp> for MyEventSet {
    /// #     fn handle(self, rt: &mut Runtime<MyApp>) {}
    /// # }
    /// #
    /// let mut runtime = Builder::seeded(1)
    ///     .quiet()
    ///     .start_time(10.0.into())
    ///     .build(MyApp());
    /// runtime.add_event(MyEventSet::EventA, SimTime::from(12.0));
    ///
    /// let (_, time, profiler) = runtime.run().unwrap();
    /// assert_eq!(time, SimTime::from(12.0)); // 12 not 10+12 = 22
    /// assert_eq!(profiler.event_count, 1);
    /// ```
    ///
    pub fn add_event(&mut self, event: impl Into<A::EventSet>, time: SimTime) -> EventHandle {
        self.scheduler.schedule_at(time, event)
    }

    ///
    /// Adds and event to the future event heap, that will be handled in 'duration'
    /// time units.
    ///
    pub fn add_event_in(
        &mut self,
        event: impl Into<A::EventSet>,
        duration: impl Into<Duration>,
    ) -> EventHandle {
        self.scheduler.schedule_in(duration.into(), event)
    }

    ///
    /// Cancels a scheduled event. Returns whether the event was still pending.
    ///
    pub fn cancel_event(&mut self, handle: EventHandle) -> bool {
        self.scheduler.cancel(handle)
    }
}

impl<A> Runtime<A>
where
    A: Application,
{
    /// Runs the application until it terminates or a breaking condition
    /// is reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the application has determined that a simulation critical
    /// failure has occurred.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation was allready started.
    pub fn run(mut self) -> Result<(A, SimTime, Profiler), RuntimeError> {
        assert_eq!(
            self.state,
            State::Ready,
            "Runtime::run can only be used for simulations in the ready state"
        );
        // (0) Start sim-start
        self.start();

        // (1) Event main loop
        self.dispatch_all();

        // (2) Finish sim-end
        self.finish()
    }

    /// Starts the simulation manually. If `Runtime::run` is not used, use the combination
    /// of start, dispatch and finish to complete a full execution cycle.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation was allready started.
    pub fn start(&mut self) {
        assert_eq!(
            self.state,
            State::Ready,
            "only a ready simulation can be started"
        );

        // (0) Publish sim-start message
        if !self.quiet {
            println!("\u{23A1}");
            println!("\u{23A2} Simulation starting {SYM_CHECKMARK}");
            println!("\u{23A2}  Executor := {}", self.scheduler);
            println!("\u{23A2}  Event limit := {}", self.limit);
            println!("\u{23A3}");
        }

        // (1) Start profiler
        self.profiler.start();

        // (2) sim-starting on application object
        A::at_sim_start(self);

        self.state = State::Running;
    }

    /// Executes the next n events in the runtime queue.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_n_events(&mut self, n: usize) {
        self.dispatch_with_limit(RuntimeLimit::events(self.num_events_dispatched() + n));
    }

    /// Executes runtime events until the runtime reaches the designated time.
    /// The configured limits of the runtime still apply.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_events_until(&mut self, t: SimTime) {
        self.dispatch_with_limit(RuntimeLimit::until(t));
    }

    fn dispatch_with_limit(&mut self, limit: RuntimeLimit) {
        let configured = self.limit;
        self.limit.merge(limit);
        self.dispatch_all();
        self.limit = configured;
    }

    /// Executes runtime events until the event set is empty or the
    /// limit is reached.
    ///
    /// # Panics
    ///
    /// This function panics if the simulation has not been started.
    pub fn dispatch_all(&mut self) {
        assert_eq!(
            self.state,
            State::Running,
            "dispatching is only allowed for running simulations"
        );
        while !self.dispatch_event() {}
    }

    /// Decontructs the runtime and returns the application and the final `sim_time`.
    ///
    /// # Errors
    ///
    /// Returns an error if the application has determined that a simulation critical
    /// failure has occurred.
    ///
    /// # Panics
    ///
    /// This function panics if the runtime is has not yet been started.
    pub fn finish(mut self) -> Result<(A, SimTime, Profiler), RuntimeError> {
        assert_eq!(
            self.state,
            State::Running,
            "only a running simulation can be finished"
        );

        // Call the fin-handler on the allocated application
        A::at_sim_end(&mut self)?;
        self.profiler.finish(self.itr);

        let time = self.sim_time();
        if !self.quiet {
            println!("\u{23A1}");
            if self.scheduler.is_empty() && self.itr == 0 {
                println!("\u{23A2} Empty simulation");
                println!("\u{23A2}  Ended at event #0 after 0s");
            } else if self.scheduler.is_empty() {
                println!("\u{23A2} Simulation ended");
                println!("\u{23A2}  Ended at event #{} after {}", self.itr, time);
            } else {
                println!("\u{23A2} Simulation ended prematurly");
                println!(
                    "\u{23A2}  Ended at event #{} with {} active events after {}",
                    self.itr,
                    self.scheduler.len(),
                    time
                );
            }
            println!("\u{23A3}");
        }

        Ok((self.app, time, self.profiler))
    }

    /// Processes the next event in the future event list by calling its handler.
    /// Returns `true` if the simulation should stop.
    fn dispatch_event(&mut self) -> bool {
        let Some(time) = self.scheduler.peek_time() else {
            return true;
        };

        if self.limit.reached(self.itr + 1, time) {
            return true;
        }

        let Some((event, time)) = self.scheduler.pop_next() else {
            return true;
        };
        self.itr += 1;

        let span = tracing::info_span!("event", t = %time);
        let _guard = span.enter();
        event.handle(self);

        false
    }
}

impl<A> Debug for Runtime<A>
where
    A: Application,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl<A> Display for Runtime<A>
where
    A: Application,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runtime<{}> {{ sim_time: {} (itr {} / {}) dispached: {} enqueued: {} }}",
            type_name::<A>(),
            self.sim_time(),
            self.num_events_dispatched(),
            self.limit,
            self.num_events_scheduled(),
            self.scheduler.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Events {
        Record(u32),
        Repeat { left: usize, delay: Duration },
        CancelOther(EventHandle),
    }

    impl Event<App> for Events {
        fn handle(self, rt: &mut Runtime<App>) {
            match self {
                Events::Record(id) => {
                    let now = rt.sim_time();
                    rt.app.log.push((now, id));
                }
                Events::Repeat { left, delay } => {
                    let now = rt.sim_time();
                    rt.app.log.push((now, 0));
                    if left > 0 {
                        rt.add_event_in(
                            Events::Repeat {
                                left: left - 1,
                                delay,
                            },
                            delay,
                        );
                    }
                }
                Events::CancelOther(handle) => {
                    rt.app.cancelled = rt.cancel_event(handle);
                }
            }
        }
    }

    #[derive(Default)]
    struct App {
        log: Vec<(SimTime, u32)>,
        cancelled: bool,
    }

    impl Application for App {
        type EventSet = Events;
    }

    #[test]
    fn empty_runtime() {
        let rt = Builder::seeded(1).quiet().build(App::default());
        let (app, time, profiler) = rt.run().unwrap();
        assert!(app.log.is_empty());
        assert_eq!(time, SimTime::ZERO);
        assert_eq!(profiler.event_count, 0);
    }

    #[test]
    fn repeated_event() {
        let mut rt = Builder::seeded(1).quiet().build(App::default());
        rt.add_event(
            Events::Repeat {
                left: 15,
                delay: Duration::from_secs(1),
            },
            SimTime::ZERO,
        );

        let (app, time, profiler) = rt.run().unwrap();
        assert_eq!(time, SimTime::from(15.0));
        assert_eq!(profiler.event_count, 16);
        assert_eq!(app.log.len(), 16);
    }

    #[test]
    fn time_limit_is_inclusive() {
        let mut rt = Builder::seeded(1)
            .quiet()
            .max_time(5.0.into())
            .build(App::default());
        rt.add_event(
            Events::Repeat {
                left: 100,
                delay: Duration::from_secs(1),
            },
            SimTime::ZERO,
        );

        let (app, time, _) = rt.run().unwrap();
        assert_eq!(time, SimTime::from(5.0));
        assert_eq!(app.log.len(), 6);
    }

    #[test]
    fn manual_dispatch_respects_configured_limit() {
        let mut rt = Builder::seeded(1)
            .quiet()
            .max_time(3.0.into())
            .build(App::default());
        for i in 0..10 {
            rt.add_event(Events::Record(i), SimTime::from(f64::from(i)));
        }
        rt.start();

        rt.dispatch_events_until(6.0.into());
        assert_eq!(rt.num_events_dispatched(), 4);
        assert_eq!(rt.sim_time(), SimTime::from(3.0));
    }

    #[test]
    fn cancel_from_within_handler() {
        let mut rt = Builder::seeded(1).quiet().build(App::default());
        let victim = rt.add_event(Events::Record(1), SimTime::from(2.0));
        rt.add_event(Events::CancelOther(victim), SimTime::from(1.0));
        rt.add_event(Events::Record(2), SimTime::from(3.0));

        let (app, time, _) = rt.run().unwrap();
        assert!(app.cancelled);
        assert_eq!(app.log, vec![(SimTime::from(3.0), 2)]);
        assert_eq!(time, SimTime::from(3.0));
    }

    #[test]
    fn manual_dispatch() {
        let mut rt = Builder::seeded(1).quiet().build(App::default());
        for i in 0..10 {
            rt.add_event(Events::Record(i), SimTime::from(f64::from(i)));
        }
        rt.start();

        rt.dispatch_n_events(3);
        assert_eq!(rt.num_events_dispatched(), 3);
        assert_eq!(rt.sim_time(), SimTime::from(2.0));

        rt.dispatch_events_until(6.0.into());
        assert_eq!(rt.num_events_dispatched(), 7);

        let (app, time, _) = rt.finish().unwrap();
        assert_eq!(app.log.len(), 7);
        assert_eq!(time, SimTime::from(6.0));
    }
}

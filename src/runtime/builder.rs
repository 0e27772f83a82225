use std::fmt::Debug;

use rand::{rngs::StdRng, SeedableRng};

use crate::time::SimTime;

use super::{Application, Profiler, Runtime, RuntimeLimit, Scheduler, State};

/// A builder for a runtime instance.
#[must_use]
pub struct Builder {
    pub(super) quiet: bool,
    pub(super) rng: StdRng,
    pub(super) limit: RuntimeLimit,
    pub(super) start_time: SimTime,
}

impl Builder {
    /// Creates a new unconfigured builder, with an RNG seeded
    /// by the operating system.
    pub fn new() -> Builder {
        Builder {
            quiet: false,
            rng: StdRng::from_os_rng(),
            limit: RuntimeLimit::NONE,

            start_time: SimTime::MIN,
        }
    }

    /// Creates a `Builder` with a static seeded RNG.
    pub fn seeded(seed: u64) -> Builder {
        Builder {
            quiet: false,
            rng: StdRng::seed_from_u64(seed),
            limit: RuntimeLimit::NONE,

            start_time: SimTime::MIN,
        }
    }

    ///
    /// Suppressed runtime messages from the simulation framework.
    ///
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    ///
    /// Changes the time the simulation starts at (default: 0).
    ///
    pub fn start_time(mut self, time: SimTime) -> Self {
        self.start_time = time;
        self
    }

    ///
    /// Changes the maximum iteration number of a runtime.
    ///
    pub fn max_itr(mut self, max_itr: usize) -> Self {
        self.limit.merge(RuntimeLimit::events(max_itr));
        self
    }

    ///
    /// Changes the maximum time of the runtime (default: inf).
    ///
    pub fn max_time(mut self, max_time: SimTime) -> Self {
        self.limit.merge(RuntimeLimit::until(max_time));
        self
    }

    ///
    /// Adds the bounds of a limit. The runtime ends at whichever bound
    /// is reached first.
    ///
    pub fn limit(mut self, limit: RuntimeLimit) -> Self {
        self.limit.merge(limit);
        self
    }

    ///
    /// Builds a new [`Runtime`] instance, using an application as core,
    /// and accepting events of type [`Application::EventSet`].
    ///
    /// # Examples
    ///
    /// ```
    /// use pacesim::prelude::*;
    ///
    /// #[derive(Debug)]
    /// struct App(usize,  String);
    /// # impl Application for App {
    /// #   type EventSet = ();
    /// # }
    ///
    /// let app = App(42, String::from("Hello there!"));
    /// let rt = Builder::seeded(1).build(app);
    /// ```
    pub fn build<A: Application>(self, app: A) -> Runtime<A> {
        Runtime {
            app,
            scheduler: Scheduler::new(self.start_time, self.rng),

            state: State::Ready,
            limit: self.limit,
            itr: 0,

            quiet: self.quiet,
            profiler: Profiler::default(),
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("quiet", &self.quiet)
            .field("limit", &self.limit)
            .field("start_time", &self.start_time)
            .finish()
    }
}

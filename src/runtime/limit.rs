use crate::time::SimTime;
use std::fmt::Display;

///
/// The bounds that end the event dispatching of a runtime.
///
/// A limit holds at most one event count bound and one time bound. The
/// runtime stops as soon as either of them is reached. Adding a bound of
/// the same kind keeps the tighter of the two, so a scenario `stop_time`
/// can never be extended by a later, larger time limit.
///
/// The time bound is inclusive: events scheduled at exactly the bound
/// are still dispatched.
///
/// # Examples
///
/// ```
/// # use pacesim::prelude::*;
/// let limit = RuntimeLimit::until(10.0.into()).with_events(500);
/// assert_eq!(limit.max_time(), Some(SimTime::from(10.0)));
/// assert_eq!(limit.to_string(), "MaxEventCount(500) or MaxSimTime(10s)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeLimit {
    max_events: Option<usize>,
    max_time: Option<SimTime>,
}

impl RuntimeLimit {
    /// No bound at all. The runtime runs until its event set is empty.
    pub const NONE: RuntimeLimit = RuntimeLimit {
        max_events: None,
        max_time: None,
    };

    /// A limit of at most `n` dispatched events.
    #[must_use]
    pub const fn events(n: usize) -> Self {
        Self {
            max_events: Some(n),
            max_time: None,
        }
    }

    /// A limit that stops after all events at or before `t` were handled.
    #[must_use]
    pub const fn until(t: SimTime) -> Self {
        Self {
            max_events: None,
            max_time: Some(t),
        }
    }

    /// Adds an event count bound, keeping the smaller one.
    #[must_use]
    pub fn with_events(mut self, n: usize) -> Self {
        self.merge(Self::events(n));
        self
    }

    /// Adds a time bound, keeping the earlier one.
    #[must_use]
    pub fn with_time(mut self, t: SimTime) -> Self {
        self.merge(Self::until(t));
        self
    }

    /// The maximum number of dispatched events, if bounded.
    #[must_use]
    pub fn max_events(&self) -> Option<usize> {
        self.max_events
    }

    /// The last simulation time at which events are dispatched, if bounded.
    #[must_use]
    pub fn max_time(&self) -> Option<SimTime> {
        self.max_time
    }

    /// Indicates whether neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.max_events.is_none() && self.max_time.is_none()
    }

    ///
    /// Whether dispatching the `itr_count`-th event, scheduled at `time`,
    /// would exceed this limit.
    ///
    pub(crate) fn reached(&self, itr_count: usize, time: SimTime) -> bool {
        self.max_events.is_some_and(|max| itr_count > max)
            || self.max_time.is_some_and(|max| time > max)
    }

    pub(crate) fn merge(&mut self, other: RuntimeLimit) {
        self.max_events = tighter(self.max_events, other.max_events);
        self.max_time = tighter(self.max_time, other.max_time);
    }
}

fn tighter<T: Ord>(lhs: Option<T>, rhs: Option<T>) -> Option<T> {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => Some(lhs.min(rhs)),
        (lhs, rhs) => lhs.or(rhs),
    }
}

impl Display for RuntimeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.max_events, self.max_time) {
            (None, None) => write!(f, "None"),
            (Some(e), None) => write!(f, "MaxEventCount({e})"),
            (None, Some(t)) => write!(f, "MaxSimTime({t})"),
            (Some(e), Some(t)) => write!(f, "MaxEventCount({e}) or MaxSimTime({t})"),
        }
    }
}

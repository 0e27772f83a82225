use crate::time::{Duration, SimTime};
use fxhash::FxHashSet;
use rand::rngs::StdRng;
use std::{
    cmp,
    collections::BinaryHeap,
    fmt::{Debug, Display},
};

///
/// A runtime unqiue identifier for a event.
///
pub(crate) type EventId = u64;

///
/// A handle to a scheduled event, that can be used to cancel
/// the event before it is dispatched.
///
/// Handles are cheap to copy. A handle stays valid after the event
/// was dispatched or cancelled, but all operations on it become
/// no-ops.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle {
    id: EventId,
    time: SimTime,
}

impl EventHandle {
    ///
    /// The deadline of the referenced event.
    ///
    #[must_use]
    pub fn time(&self) -> SimTime {
        self.time
    }
}

///
/// A bin-heap node of a scheduled event.
///
/// Nodes are ordered by deadline first and by insertion order second,
/// so that events with the same deadline are dispatched FIFO.
///
struct EventNode<E> {
    time: SimTime,
    id: EventId,
    event: E,
}

impl<E> cmp::PartialEq for EventNode<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> cmp::Eq for EventNode<E> {}

impl<E> cmp::PartialOrd for EventNode<E> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> cmp::Ord for EventNode<E> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        // Inverted call should act as reverse, since BinaryHeap is a max-heap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

///
/// The future event set of a runtime, together with the simulation
/// clock and the random source.
///
/// Scheduling and dispatching are `O(log n)`. Cancellation is `O(1)`,
/// the cancelled node stays in the heap and is discarded once it
/// reaches the top.
///
pub struct Scheduler<E> {
    now: SimTime,
    heap: BinaryHeap<EventNode<E>>,
    pending: FxHashSet<EventId>,
    next_id: EventId,
    rng: StdRng,
}

impl<E> Scheduler<E> {
    pub(crate) fn new(start_time: SimTime, rng: StdRng) -> Self {
        Self {
            now: start_time,
            heap: BinaryHeap::with_capacity(64),
            pending: FxHashSet::default(),
            next_id: 0,
            rng,
        }
    }

    ///
    /// Returns the current simulation time.
    ///
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    ///
    /// Returns the random number generator of this simulation.
    ///
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    ///
    /// The number of events that are still pending.
    ///
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    ///
    /// Indicates whether no events are pending.
    ///
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    ///
    /// The total number of events that were scheduled on this instance.
    ///
    #[must_use]
    pub fn num_scheduled(&self) -> u64 {
        self.next_id
    }

    ///
    /// Adds an event to the future event set, that will be dispatched at the
    /// given time.
    ///
    /// # Panics
    ///
    /// Panics if `time` lies before the current simulation time.
    ///
    pub fn schedule_at(&mut self, time: SimTime, event: impl Into<E>) -> EventHandle {
        assert!(time >= self.now, "Sorry we cannot timetravel yet");

        let id = self.next_id;
        self.next_id += 1;

        self.heap.push(EventNode {
            time,
            id,
            event: event.into(),
        });
        self.pending.insert(id);

        EventHandle { id, time }
    }

    ///
    /// Adds an event to the future event set, that will be dispatched in
    /// `delay` time units.
    ///
    pub fn schedule_in(&mut self, delay: Duration, event: impl Into<E>) -> EventHandle {
        self.schedule_at(self.now + delay, event)
    }

    ///
    /// Cancels a pending event. Returns `true` if the event was still pending,
    /// `false` if it was allready dispatched or cancelled.
    ///
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.pending.remove(&handle.id)
    }

    ///
    /// Indicates whether the referenced event will still be dispatched.
    ///
    #[must_use]
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains(&handle.id)
    }

    ///
    /// The deadline of the next live event.
    ///
    pub(crate) fn peek_time(&mut self) -> Option<SimTime> {
        self.discard_cancelled();
        self.heap.peek().map(|node| node.time)
    }

    ///
    /// Removes the next live event and advances the clock to its deadline.
    ///
    pub(crate) fn pop_next(&mut self) -> Option<(E, SimTime)> {
        self.discard_cancelled();
        let node = self.heap.pop()?;
        self.pending.remove(&node.id);

        // Let this be the only position where the clock is changed
        self.now = node.time;
        Some((node.event, node.time))
    }

    fn discard_cancelled(&mut self) {
        while let Some(node) = self.heap.peek() {
            if self.pending.contains(&node.id) {
                return;
            }
            self.heap.pop();
        }
    }
}

impl<E> Debug for Scheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .field("scheduled", &self.next_id)
            .finish()
    }
}

impl<E> Display for Scheduler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scheduler::BinaryHeap(pending: {})", self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn scheduler() -> Scheduler<u32> {
        Scheduler::new(SimTime::ZERO, StdRng::seed_from_u64(1))
    }

    fn drain(s: &mut Scheduler<u32>) -> Vec<(u32, SimTime)> {
        std::iter::from_fn(|| s.pop_next()).collect()
    }

    #[test]
    fn dispatch_in_time_order() {
        let mut s = scheduler();
        s.schedule_at(3.0.into(), 3u32);
        s.schedule_at(1.0.into(), 1u32);
        s.schedule_at(2.0.into(), 2u32);

        let order = drain(&mut s);
        assert_eq!(
            order,
            vec![
                (1, SimTime::from(1.0)),
                (2, SimTime::from(2.0)),
                (3, SimTime::from(3.0))
            ]
        );
        assert_eq!(s.now(), SimTime::from(3.0));
        assert!(s.is_empty());
    }

    #[test]
    fn ties_are_fifo() {
        let mut s = scheduler();
        for i in 0..50u32 {
            s.schedule_at(5.0.into(), i);
        }
        s.schedule_at(1.0.into(), 100u32);

        let order: Vec<u32> = drain(&mut s).into_iter().map(|(e, _)| e).collect();
        assert_eq!(order[0], 100);
        assert_eq!(order[1..].to_vec(), (0..50u32).collect::<Vec<u32>>());
    }

    #[test]
    fn cancelled_events_never_fire() {
        let mut s = scheduler();
        let a = s.schedule_at(1.0.into(), 1u32);
        let b = s.schedule_at(2.0.into(), 2u32);
        let c = s.schedule_at(3.0.into(), 3u32);
        assert_eq!(s.len(), 3);

        assert!(s.cancel(b));
        assert!(!s.cancel(b));
        assert!(!s.is_pending(b));
        assert!(s.is_pending(a));
        assert_eq!(s.len(), 2);

        assert!(s.cancel(a));
        assert_eq!(s.peek_time(), Some(SimTime::from(3.0)));

        assert_eq!(drain(&mut s), vec![(3, SimTime::from(3.0))]);
        assert!(!s.cancel(c));
    }

    #[test]
    fn schedule_relative_to_now() {
        let mut s = scheduler();
        s.schedule_at(2.0.into(), 1u32);
        assert_eq!(s.pop_next(), Some((1, SimTime::from(2.0))));

        let h = s.schedule_in(Duration::from_millis(500), 2u32);
        assert_eq!(h.time(), SimTime::from(2.5));
        assert_eq!(s.num_scheduled(), 2);
    }

    #[test]
    #[should_panic(expected = "timetravel")]
    fn scheduling_into_the_past_panics() {
        let mut s = scheduler();
        s.schedule_at(2.0.into(), 1u32);
        s.pop_next();
        s.schedule_at(1.0.into(), 2u32);
    }
}

use crate::time::SimTime;
use std::fmt::Debug;

type TraceCallback<T> = Box<dyn FnMut(SimTime, T, T)>;

///
/// A value that notifies connected callbacks, whenever it changes.
///
/// Callbacks are called with the time of the change, the old value and
/// the new value. Setting a value equal to the current one is not
/// considered a change.
///
/// # Examples
///
/// ```
/// # use pacesim::{trace::TracedValue, time::SimTime};
/// # use std::{cell::RefCell, rc::Rc};
/// let changes = Rc::new(RefCell::new(Vec::new()));
/// let mut value = TracedValue::new(0u64);
///
/// let log = changes.clone();
/// value.connect(move |time, old, new| log.borrow_mut().push((time, old, new)));
///
/// value.set(SimTime::from(1.0), 4);
/// value.set(SimTime::from(2.0), 4);
/// assert_eq!(*changes.borrow(), vec![(SimTime::from(1.0), 0, 4)]);
/// ```
pub struct TracedValue<T> {
    value: T,
    callbacks: Vec<TraceCallback<T>>,
}

impl<T> TracedValue<T>
where
    T: Copy + PartialEq,
{
    ///
    /// Creates a new traced value without any callbacks.
    ///
    pub fn new(value: T) -> Self {
        Self {
            value,
            callbacks: Vec::new(),
        }
    }

    ///
    /// The current value.
    ///
    pub fn get(&self) -> T {
        self.value
    }

    ///
    /// Connects a new callback that will be notified on all future changes.
    ///
    pub fn connect(&mut self, callback: impl FnMut(SimTime, T, T) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    ///
    /// Indicates whether any callbacks are connected.
    ///
    pub fn is_traced(&self) -> bool {
        !self.callbacks.is_empty()
    }

    ///
    /// Updates the value at the given time.
    ///
    pub fn set(&mut self, time: SimTime, value: T) {
        if self.value == value {
            return;
        }

        let old = std::mem::replace(&mut self.value, value);
        for callback in &mut self.callbacks {
            callback(time, old, value);
        }
    }
}

impl<T: Copy + PartialEq + Default> Default for TracedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Debug> Debug for TracedValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedValue")
            .field("value", &self.value)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

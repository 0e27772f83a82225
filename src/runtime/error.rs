use std::{any::Any, error::Error as StdError, fmt::Display};

/// An error that occurred during the simulation.
#[derive(Debug)]
pub struct RuntimeError {
    inner: Box<dyn StdErrorAny>,
}

impl RuntimeError {
    /// As any
    pub fn as_any(&self) -> &dyn Any {
        self.inner.as_any()
    }

    /// Tries to downcast the error into its original type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T: StdError + Any + Send + Sync + 'static> From<T> for RuntimeError {
    fn from(err: T) -> Self {
        RuntimeError {
            inner: Box::new(err),
        }
    }
}

trait StdErrorAny: StdError + Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}
impl<T: StdError + Any + Send + Sync + 'static> StdErrorAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

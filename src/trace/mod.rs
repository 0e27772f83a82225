//!
//! File based instrumentation of a running simulation.
//!
//! All tracing state lives in explicit context objects, that are owned
//! by the simulation application or captured by trace callbacks. Trace
//! files contain one tab separated record per line, starting with the
//! simulation time in seconds.
//!

mod monitor;
pub use monitor::*;

mod value;
pub use value::*;

mod writer;
pub use writer::*;

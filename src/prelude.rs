//!
//! Convenience re-export of common members.
//!

//
// # Generic core exports
//

pub use crate::runtime::Application;
pub use crate::runtime::Builder;
pub use crate::runtime::Event;
pub use crate::runtime::EventHandle;
pub use crate::runtime::Runtime;
pub use crate::runtime::RuntimeError;
pub use crate::runtime::RuntimeLimit;
pub use crate::runtime::Scheduler;

pub use crate::time::Duration;
pub use crate::time::SimTime;

//
// # Network
//

pub use crate::net::Connection;
pub use crate::net::DataRate;
pub use crate::net::LinkMetrics;
pub use crate::net::Network;
pub use crate::net::SegmentArrival;
pub use crate::net::StreamSocket;
pub use crate::net::Topology;

//
// # Applications
//

pub use crate::app::PacedSender;
pub use crate::app::SendTimer;
pub use crate::app::SenderConfig;
pub use crate::app::SenderError;

pub use crate::scenario::Scenario;
pub use crate::scenario::ScenarioConfig;
pub use crate::scenario::ScenarioReport;

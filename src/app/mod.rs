//!
//! Traffic generating applications.
//!
//! A [`PacedSender`] emits fixed size packets over a [`Connection`](crate::net::Connection)
//! at a constant target rate, until a packet limit is reached or the
//! sender is stopped. Pacing is driven by [`SendTimer`] events on the
//! simulation scheduler.
//!

mod sender;
pub use sender::*;

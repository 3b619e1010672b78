//! # CueClock Timing Daemon (cueclock-td)
//!
//! Computes the complete timing state of a live broadcast rundown once per
//! tick and fans the resulting snapshot out to subscribers on two refresh
//! cadences. The resolver is the hard core; the scheduler and subscription
//! hub deliver its output without wasted recomputation.

pub mod error;
pub mod resolver;
pub mod scheduler;
pub mod server;
pub mod sources;
pub mod sse;
pub mod subscription;

pub use error::{Error, Result};

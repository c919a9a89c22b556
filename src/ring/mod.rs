//! Call-ring detection
//!
//! Turns the client's `CALL_UPDATE` stream into clean start/stop signals for
//! the local user.

pub mod context;
pub mod tracker;
pub mod transition;

pub use tracker::{RingPolicy, RingTracker};
pub use transition::{RingSink, RingStarted, RingStopped, RingTransition};

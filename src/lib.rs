#![warn(missing_docs)]
//! Defer a callback to one of two points in an event loop's task ordering:
//! "this tick" runs once the current synchronous code returns, ahead of all
//! pending deferred and timer work, while "later tick" runs after the
//! current phase but still ahead of timers. The loop is passed in as a
//! [scheduler::Scheduler] capability rather than reached through a global,
//! so tests can substitute a fake that records submission order.
pub mod defer;
pub mod event_loop;
pub mod scheduler;

pub use defer::{later_iteration, later_tick, this_iteration, this_tick};

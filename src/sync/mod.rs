//! # Mutual exclusion primitives.
//!
//! - [`Mutex`] non-reentrant async lock
//! - [`SingleFlight`] one shared in-flight computation for many callers
//! - [`RaceCounter`] shared counter with racy and guarded increments

mod counter;
mod mutex;
mod single_flight;

pub use counter::RaceCounter;
pub use mutex::Mutex;
pub use single_flight::SingleFlight;

//! # Channels: hot, point-to-point value queues between tasks.
//!
//! - [`Channel`] with a [`Capacity`] and an [`Overflow`] policy
//! - [`produce`] spawns a producer task owning the sending side
//! - error types in [`error`]
//!
//! A channel is *hot*: values exist independently of receivers and each value
//! is received by exactly one receiver. Contrast with [`Flow`](crate::Flow),
//! which re-runs its producer for every collector.

mod chan;
pub mod error;
mod produce;

pub use chan::{Capacity, Channel, Overflow};
pub use error::{RecvError, SendError, TryRecvError, TrySendError};
pub use produce::produce;

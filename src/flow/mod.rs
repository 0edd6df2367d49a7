//! # Flows: cold streams and hot state.
//!
//! - [`Flow`] is cold: a definition re-run per collection, with operators
//!   (`map`, `filter`, `take`, `debounce`, `buffer`, ...) and terminals
//!   (`collect`, `to_vec`, `reduce`, `launch_in`).
//! - [`Flow::from_callback`] bridges callback APIs through a [`CallbackSink`].
//! - [`StateFlow`] holds one current value; [`SharedFlow`] multicasts with replay.

mod callback;
mod cold;
mod emitter;
mod operators;
mod shared;
mod state;

pub use callback::CallbackSink;
pub use cold::Flow;
pub use emitter::Emitter;
pub use shared::SharedFlow;
pub use state::{StateFlow, StateSubscription};

//! Channel error types. Rejected values are handed back to the caller.

use std::fmt;
use thiserror::Error;

/// `send` on a closed channel.
#[derive(Error, PartialEq, Eq, Clone)]
pub enum SendError<T> {
    #[error("channel closed")]
    Closed(T),
}

/// Non-suspending send was rejected.
#[derive(Error, PartialEq, Eq, Clone)]
pub enum TrySendError<T> {
    /// No room (or, for a rendezvous channel, no waiting receiver).
    #[error("channel full")]
    Full(T),
    #[error("channel closed")]
    Closed(T),
}

/// `recv` on a closed and drained channel.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvError {
    #[error("channel closed")]
    Closed,
}

/// Non-suspending receive found nothing.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
    #[error("channel empty")]
    Empty,
    #[error("channel closed")]
    Closed,
}

impl<T> SendError<T> {
    /// Takes back the value that was not sent.
    pub fn into_inner(self) -> T {
        match self {
            SendError::Closed(v) => v,
        }
    }
}

impl<T> TrySendError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TrySendError::Full(v) | TrySendError::Closed(v) => v,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, TrySendError::Full(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, TrySendError::Closed(_))
    }
}

// Values need not be `Debug`.
impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SendError::Closed(..)")
    }
}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(_) => f.write_str("TrySendError::Full(..)"),
            TrySendError::Closed(_) => f.write_str("TrySendError::Closed(..)"),
        }
    }
}

//! # Point-to-point channel with capacity and overflow policy.
//!
//! ```text
//!  send(v) ──► [ buffer (≤ limit) ] ──► recv()
//!     │               ▲
//!     └─ full+Suspend ─┴── pending senders (FIFO), refilled on every recv
//! ```
//!
//! ## Rules
//! - The buffer never holds more than the capacity limit (`0` for rendezvous).
//! - Rendezvous: a suspended sender completes only when a receiver takes its
//!   value directly.
//! - Suspended senders are served in FIFO order; a sender whose future is
//!   dropped withdraws its value.
//! - A rendezvous `try_send` hands its value to a waiting receiver. If that
//!   receiver is cancelled before taking it, the value is withdrawn and dropped.
//! - `close()` fails pending senders with their value; buffered values still
//!   drain, then `recv` reports `Closed`.
//! - Drop policies never suspend. On a rendezvous channel they act on a
//!   one-slot buffer.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::Stream;
use tokio::sync::{oneshot, Notify};
use tracing::trace;

use crate::channel::error::{RecvError, SendError, TryRecvError, TrySendError};
use crate::events::{Bus, Event, EventKind};

/// Buffer capacity of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    /// No buffer: every send meets a receiver.
    Rendezvous,
    /// At most `n` buffered values.
    Buffered(usize),
    /// No limit.
    Unbounded,
}

/// What `send` does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// Suspend the sender until there is room.
    #[default]
    Suspend,
    /// Evict the oldest buffered value.
    DropOldest,
    /// Discard the incoming value.
    DropLatest,
}

struct PendingSend<T> {
    id: u64,
    value: T,
    /// `None` for a rendezvous `try_send` handoff: nobody waits on it.
    done: Option<oneshot::Sender<Result<(), T>>>,
}

impl<T> PendingSend<T> {
    fn is_handoff(&self) -> bool {
        self.done.is_none()
    }

    /// Completes the send and yields the value to the receiver.
    fn deliver(self) -> T {
        if let Some(done) = self.done {
            let _ = done.send(Ok(()));
        }
        self.value
    }
}

struct State<T> {
    buffer: VecDeque<T>,
    senders: VecDeque<PendingSend<T>>,
    waiting_receivers: usize,
    next_send: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    recv_ready: Notify,
    capacity: Capacity,
    overflow: Overflow,
    bus: Option<Bus>,
}

/// Multi-producer, multi-consumer channel. Clones share the same queue.
pub struct Channel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.lock();
        f.debug_struct("Channel")
            .field("capacity", &self.shared.capacity)
            .field("overflow", &self.shared.overflow)
            .field("len", &st.buffer.len())
            .field("pending_senders", &st.senders.len())
            .field("closed", &st.closed)
            .finish()
    }
}

enum Offer<T> {
    Accepted,
    Discarded(T),
    Full(T),
}

impl<T> Channel<T> {
    pub fn new(capacity: Capacity, overflow: Overflow) -> Self {
        Self::build(capacity, overflow, None)
    }

    /// Like [`Channel::new`], publishing `ChannelClosed` to `bus` on close.
    pub fn with_bus(capacity: Capacity, overflow: Overflow, bus: Bus) -> Self {
        Self::build(capacity, overflow, Some(bus))
    }

    fn build(capacity: Capacity, overflow: Overflow, bus: Option<Bus>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffer: VecDeque::new(),
                    senders: VecDeque::new(),
                    waiting_receivers: 0,
                    next_send: 0,
                    closed: false,
                }),
                recv_ready: Notify::new(),
                capacity,
                overflow,
                bus,
            }),
        }
    }

    /// Capacity 0: senders meet receivers.
    pub fn rendezvous() -> Self {
        Self::new(Capacity::Rendezvous, Overflow::Suspend)
    }

    /// Suspending channel buffering up to `n` values.
    pub fn bounded(n: usize) -> Self {
        Self::new(Capacity::Buffered(n), Overflow::Suspend)
    }

    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded, Overflow::Suspend)
    }

    /// Keeps only the latest value (capacity 1, drop oldest).
    pub fn conflated() -> Self {
        Self::new(Capacity::Buffered(1), Overflow::DropOldest)
    }

    pub fn capacity(&self) -> Capacity {
        self.shared.capacity
    }

    pub fn overflow(&self) -> Overflow {
        self.shared.overflow
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of senders currently suspended on a full channel.
    pub fn suspended_senders(&self) -> usize {
        self.lock().senders.len()
    }

    /// True once `close()` was called (buffered values may still drain).
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Sends `value`, suspending per the overflow policy.
    pub async fn send(&self, value: T) -> Result<(), SendError<T>> {
        let (id, done) = {
            let mut st = self.lock();
            if st.closed {
                return Err(SendError::Closed(value));
            }
            match self.offer(&mut st, value) {
                Offer::Accepted => {
                    drop(st);
                    self.shared.recv_ready.notify_one();
                    return Ok(());
                }
                Offer::Discarded(_) => return Ok(()),
                Offer::Full(value) => {
                    let (tx, rx) = oneshot::channel();
                    let id = st.next_send;
                    st.next_send += 1;
                    st.senders.push_back(PendingSend {
                        id,
                        value,
                        done: Some(tx),
                    });
                    (id, rx)
                }
            }
        };
        // A parked receiver can take the value straight from the pending queue.
        self.shared.recv_ready.notify_one();

        let mut guard = PendingGuard {
            shared: &self.shared,
            id,
            armed: true,
        };
        let res = done.await;
        guard.armed = false;
        match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(value)) => Err(SendError::Closed(value)),
            // Entries are only dropped after being resolved while we hold `shared`.
            Err(_) => Ok(()),
        }
    }

    /// Non-suspending send.
    ///
    /// `Ok` iff the value was accepted. A rendezvous channel accepts only when a
    /// receiver is currently waiting; `DropLatest` reports `Full` instead of
    /// silently discarding.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut st = self.lock();
        if st.closed {
            return Err(TrySendError::Closed(value));
        }
        if self.limit() == 0 {
            if st.waiting_receivers <= st.senders.len() {
                return Err(TrySendError::Full(value));
            }
            let id = st.next_send;
            st.next_send += 1;
            st.senders.push_back(PendingSend {
                id,
                value,
                done: None,
            });
        } else {
            match self.offer(&mut st, value) {
                Offer::Accepted => {}
                Offer::Discarded(value) | Offer::Full(value) => {
                    return Err(TrySendError::Full(value))
                }
            }
        }
        drop(st);
        self.shared.recv_ready.notify_one();
        Ok(())
    }

    /// Receives the next value, suspending while the channel is empty.
    pub async fn recv(&self) -> Result<T, RecvError> {
        loop {
            let notified = self.shared.recv_ready.notified();
            tokio::pin!(notified);
            {
                let mut st = self.lock();
                if let Some(v) = take(&mut st) {
                    return Ok(v);
                }
                if st.closed {
                    return Err(RecvError::Closed);
                }
                notified.as_mut().enable();
                st.waiting_receivers += 1;
            }
            let mut waiting = WaitingGuard {
                shared: &self.shared,
                armed: true,
            };
            notified.await;
            waiting.armed = false;

            // Still counted as waiting until the value is taken, so a handoff
            // meant for us cannot be withdrawn in between.
            let mut st = self.lock();
            st.waiting_receivers = st.waiting_receivers.saturating_sub(1);
            if let Some(v) = take(&mut st) {
                return Ok(v);
            }
        }
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut st = self.lock();
        match take(&mut st) {
            Some(v) => Ok(v),
            None if st.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Closes the channel for sending. Returns `true` if this call closed it.
    pub fn close(&self) -> bool {
        let (pending, buffered) = {
            let mut st = self.lock();
            if st.closed {
                return false;
            }
            st.closed = true;
            (std::mem::take(&mut st.senders), st.buffer.len())
        };
        for p in pending {
            if let Some(done) = p.done {
                let _ = done.send(Err(p.value));
            }
        }
        self.shared.recv_ready.notify_waiters();
        trace!(buffered, "channel closed");
        if let Some(bus) = &self.shared.bus {
            bus.publish(Event::new(EventKind::ChannelClosed).with_reason(buffered.to_string()));
        }
        true
    }

    /// Receives until the channel is closed and drained.
    pub async fn consume_each<F>(&self, mut f: F)
    where
        F: FnMut(T),
    {
        while let Ok(v) = self.recv().await {
            f(v);
        }
    }

    /// Turns this handle into a `Stream` of received values.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        futures::stream::unfold(self, |ch| async move {
            match ch.recv().await {
                Ok(v) => Some((v, ch)),
                Err(RecvError::Closed) => None,
            }
        })
    }

    /// Effective buffer limit for the current policy.
    fn limit(&self) -> usize {
        let raw = match self.shared.capacity {
            Capacity::Rendezvous => 0,
            Capacity::Buffered(n) => n,
            Capacity::Unbounded => usize::MAX,
        };
        match self.shared.overflow {
            Overflow::Suspend => raw,
            Overflow::DropOldest | Overflow::DropLatest => raw.max(1),
        }
    }

    /// Places `value` without suspending, if the policy allows it.
    fn offer(&self, st: &mut State<T>, value: T) -> Offer<T> {
        if st.senders.is_empty() && st.buffer.len() < self.limit() {
            st.buffer.push_back(value);
            return Offer::Accepted;
        }
        match self.shared.overflow {
            Overflow::Suspend => Offer::Full(value),
            Overflow::DropOldest => {
                st.buffer.pop_front();
                st.buffer.push_back(value);
                Offer::Accepted
            }
            Overflow::DropLatest => Offer::Discarded(value),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pops the next value and refills the buffer from the oldest suspended sender.
fn take<T>(st: &mut State<T>) -> Option<T> {
    if let Some(v) = st.buffer.pop_front() {
        if let Some(p) = st.senders.pop_front() {
            let value = p.deliver();
            st.buffer.push_back(value);
        }
        return Some(v);
    }
    st.senders.pop_front().map(PendingSend::deliver)
}

/// Withdraws a suspended send whose future was dropped.
struct PendingGuard<'a, T> {
    shared: &'a Shared<T>,
    id: u64,
    armed: bool,
}

impl<T> Drop for PendingGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut st = self.shared.lock();
            st.senders.retain(|p| p.id != self.id);
        }
    }
}

/// Unregisters a receiver whose future was dropped while parked.
///
/// Handoffs beyond the receivers still waiting are withdrawn, newest first.
struct WaitingGuard<'a, T> {
    shared: &'a Shared<T>,
    armed: bool,
}

impl<T> Drop for WaitingGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut withdrawn = Vec::new();
        {
            let mut st = self.shared.lock();
            st.waiting_receivers = st.waiting_receivers.saturating_sub(1);
            let handoffs = st.senders.iter().filter(|p| p.is_handoff()).count();
            let mut excess = handoffs.saturating_sub(st.waiting_receivers);
            let mut i = st.senders.len();
            while excess > 0 && i > 0 {
                i -= 1;
                if st.senders[i].is_handoff() {
                    withdrawn.extend(st.senders.remove(i));
                    excess -= 1;
                }
            }
        }
        if !withdrawn.is_empty() {
            trace!(count = withdrawn.len(), "unclaimed handoff withdrawn");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn bounded_send_suspends_when_full() {
        let ch = Channel::bounded(2);
        ch.send(1).await.unwrap();
        ch.send(2).await.unwrap();

        let tx = ch.clone();
        let third = tokio::spawn(async move { tx.send(3).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!third.is_finished());
        assert_eq!(ch.len(), 2);

        assert_eq!(ch.recv().await, Ok(1));
        third.await.unwrap().unwrap();
        assert_eq!(ch.len(), 2);
        assert_eq!(ch.recv().await, Ok(2));
        assert_eq!(ch.recv().await, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn rendezvous_send_waits_for_receiver() {
        let ch = Channel::rendezvous();
        assert!(ch.try_send(1).unwrap_err().is_full());

        let tx = ch.clone();
        let sender = tokio::spawn(async move { tx.send(7).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sender.is_finished());
        assert_eq!(ch.len(), 0);

        assert_eq!(ch.recv().await, Ok(7));
        sender.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rendezvous_try_send_needs_a_waiting_receiver() {
        let ch = Channel::rendezvous();
        let rx = ch.clone();
        let receiver = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        ch.try_send(5).unwrap();
        assert!(ch.try_send(6).unwrap_err().is_full());
        assert_eq!(receiver.await.unwrap(), Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn rendezvous_try_send_is_withdrawn_when_the_receiver_leaves() {
        let ch = Channel::rendezvous();
        let rx = ch.clone();
        let receiver = tokio::spawn(async move { rx.recv().await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        ch.try_send(5).unwrap();

        receiver.abort();
        assert!(receiver.await.unwrap_err().is_cancelled());
        assert_eq!(ch.suspended_senders(), 0);
        assert_eq!(ch.try_recv(), Err(TryRecvError::Empty));

        // with nobody waiting, the next try_send is refused again
        assert!(ch.try_send(6).unwrap_err().is_full());
    }

    #[tokio::test(start_paused = true)]
    async fn handoff_survives_when_another_receiver_still_waits() {
        let ch = Channel::rendezvous();
        let first = {
            let rx = ch.clone();
            tokio::spawn(async move { rx.recv().await })
        };
        let second = {
            let rx = ch.clone();
            tokio::spawn(async move { rx.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        ch.try_send(9).unwrap();

        first.abort();
        let _ = first.await;
        assert_eq!(second.await.unwrap(), Ok(9));
        assert_eq!(ch.suspended_senders(), 0);
    }

    #[tokio::test]
    async fn drop_oldest_keeps_latest() {
        let ch = Channel::new(Capacity::Buffered(1), Overflow::DropOldest);
        ch.send(1).await.unwrap();
        ch.send(2).await.unwrap();
        assert_eq!(ch.len(), 1);
        ch.try_send(3).unwrap();
        assert_eq!(ch.try_recv(), Ok(3));
        assert_eq!(ch.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn drop_latest_discards_incoming() {
        let ch = Channel::new(Capacity::Rendezvous, Overflow::DropLatest);
        ch.send(1).await.unwrap();
        ch.send(2).await.unwrap();
        assert!(ch.try_send(3).unwrap_err().is_full());
        assert_eq!(ch.try_recv(), Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn close_fails_pending_senders_and_drains() {
        let ch = Channel::bounded(1);
        ch.send("a").await.unwrap();
        let tx = ch.clone();
        let blocked = tokio::spawn(async move { tx.send("b").await });
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(ch.close());
        assert!(!ch.close());
        assert_eq!(blocked.await.unwrap(), Err(SendError::Closed("b")));
        assert_eq!(ch.send("c").await, Err(SendError::Closed("c")));
        assert_eq!(ch.recv().await, Ok("a"));
        assert_eq!(ch.recv().await, Err(RecvError::Closed));
        assert_eq!(ch.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_sender_withdraws_its_value() {
        let ch = Channel::rendezvous();
        let tx = ch.clone();
        let sender = tokio::spawn(async move { tx.send(1).await });
        tokio::time::sleep(Duration::from_millis(1)).await;
        sender.abort();
        let _ = sender.await;
        assert_eq!(ch.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_senders_are_served_fifo() {
        let ch = Channel::rendezvous();
        for i in 0..3 {
            let tx = ch.clone();
            tokio::spawn(async move { tx.send(i).await });
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let got: Vec<i32> = vec![
            ch.recv().await.unwrap(),
            ch.recv().await.unwrap(),
            ch.recv().await.unwrap(),
        ];
        assert_eq!(got, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn close_event_reports_buffered_values() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let ch = Channel::with_bus(Capacity::Unbounded, Overflow::Suspend, bus);
        ch.send(1).await.unwrap();
        ch.close();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ChannelClosed);
        assert_eq!(ev.reason.as_deref(), Some("1"));
    }
}

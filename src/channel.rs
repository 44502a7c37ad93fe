//! Hand-off between the frame loop and whatever carries payloads to the
//! planner.
//!
//! ## Threading model
//!
//! ```text
//! Frame loop                  │  Transport thread
//! ─────────────────────────── │ ───────────────────────────
//! SessionCoordinator::cycle   │  recv request
//!   → set_outbound(snapshot)  │    → inbound.put(request)
//!   → latest_inbound()        │  outbound.take() / last sent
//!                             │    → send reply
//! ```
//!
//! Both directions go through a [`Mailbox`]: a capacity-1 crossbeam channel
//! where a new value replaces an unread one. Neither side ever blocks on the
//! other.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

/// What the session coordinator needs from a transport.
pub trait PlannerChannel {
    /// Replace the payload to send on the next reply.
    fn set_outbound(&self, payload: String);

    /// Newest payload received since the last call, without blocking.
    fn latest_inbound(&self) -> Option<String>;
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// Single-slot, latest-value-wins hand-off.
///
/// Cloning yields another handle to the same slot.
#[derive(Debug)]
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    /// Store `value`, discarding any unread value.
    pub fn put(&self, value: T) {
        let mut value = value;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return,
                Err(TrySendError::Full(v)) => {
                    // The other side may take it between these two calls;
                    // either way the next try_send has room.
                    let _ = self.rx.try_recv();
                    value = v;
                }
                // Unreachable while we hold a receiver, but never spin.
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Take the stored value, if any.
    pub fn take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(v) => Some(v),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

// ---------------------------------------------------------------------------
// In-process channel
// ---------------------------------------------------------------------------

/// A [`PlannerChannel`] with no network behind it.
///
/// Used by tests and by hosts that drive the coordinator from a recorded
/// planner session: push planner payloads with [`MemoryChannel::push_inbound`]
/// and read what the engine would have sent with
/// [`MemoryChannel::take_outbound`].
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    inbound: Mailbox<String>,
    outbound: Mailbox<String>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&self, payload: impl Into<String>) {
        self.inbound.put(payload.into());
    }

    pub fn take_outbound(&self) -> Option<String> {
        self.outbound.take()
    }
}

impl PlannerChannel for MemoryChannel {
    fn set_outbound(&self, payload: String) {
        self.outbound.put(payload);
    }

    fn latest_inbound(&self) -> Option<String> {
        self.inbound.take()
    }
}

impl<C: PlannerChannel + ?Sized> PlannerChannel for &C {
    fn set_outbound(&self, payload: String) {
        (**self).set_outbound(payload)
    }

    fn latest_inbound(&self) -> Option<String> {
        (**self).latest_inbound()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn newest_value_wins() {
        let slot = Mailbox::new();
        slot.put(1);
        slot.put(2);
        slot.put(3);
        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn take_on_empty_is_none() {
        let slot: Mailbox<String> = Mailbox::new();
        assert!(slot.is_empty());
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn clones_share_the_slot_across_threads() {
        let slot = Mailbox::new();
        let writer = slot.clone();
        let handle = thread::spawn(move || {
            for i in 0..1000 {
                writer.put(i);
            }
        });
        handle.join().unwrap();
        assert_eq!(slot.take(), Some(999));
    }

    #[test]
    fn memory_channel_routes_both_directions() {
        let ch = MemoryChannel::new();
        ch.push_inbound("cmd");
        ch.set_outbound("snap-1".into());
        ch.set_outbound("snap-2".into());

        assert_eq!(ch.latest_inbound().as_deref(), Some("cmd"));
        assert_eq!(ch.latest_inbound(), None);
        assert_eq!(ch.take_outbound().as_deref(), Some("snap-2"));
    }
}

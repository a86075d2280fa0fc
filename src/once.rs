//! Run a callable at most once per receiver.
//!
//! A [`Once`] gate can be invoked in two ways:
//! 1. Unbound, via [`Once::call`]. All unbound calls share one identity, so only the first runs.
//! 2. Bound, via [`Once::call_on`]. Each distinct [`Receiver`] gets its own single execution.
//!
//! Receivers are never touched: the gate keeps its own table of the receiver keys it has fired
//! for.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::{Mutex, PoisonError};

use tracing::trace;

static GATE_COUNTER: AtomicU64 = AtomicU64::new(1);
static RECEIVER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one [`Once`] gate instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateId(u64);

impl GateId {
    fn next() -> Self {
        Self(GATE_COUNTER.fetch_add(1, Relaxed))
    }
}

/// Opaque identity of a receiver for bound [`Once`] calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReceiverKey(u64);

impl ReceiverKey {
    /// Mint a key that no other call to `new` in this process will return.
    pub fn new() -> Self {
        Self(RECEIVER_COUNTER.fetch_add(1, Relaxed))
    }
}

impl Default for ReceiverKey {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything that can act as the receiver of a bound call.
pub trait Receiver {
    fn receiver_key(&self) -> ReceiverKey;
}

impl Receiver for ReceiverKey {
    fn receiver_key(&self) -> ReceiverKey {
        *self
    }
}

impl<T: Receiver + ?Sized> Receiver for &T {
    fn receiver_key(&self) -> ReceiverKey {
        (**self).receiver_key()
    }
}

#[derive(Default)]
struct Fired {
    unbound: bool,
    receivers: HashSet<ReceiverKey>,
}

pub struct Once<F> {
    id: GateId,
    func: F,
    fired: Mutex<Fired>,
}

/// Wrap `func` so that it runs at most once per receiver.
pub fn once<F>(func: F) -> Once<F> {
    Once::new(func)
}

impl<F> Once<F> {
    pub fn new(func: F) -> Self {
        Self {
            id: GateId::next(),
            func,
            fired: Mutex::new(Fired::default()),
        }
    }

    pub fn id(&self) -> GateId {
        self.id
    }

    /// Whether an unbound call has already executed.
    pub fn has_fired(&self) -> bool {
        self.fired().unbound
    }

    /// Whether a call bound to `receiver` has already executed.
    pub fn has_fired_for<Recv: Receiver + ?Sized>(&self, receiver: &Recv) -> bool {
        self.fired().receivers.contains(&receiver.receiver_key())
    }

    /// Unbound call. Runs `func` on the first call only; later calls return `None`.
    pub fn call<A, R>(&self, args: A) -> Option<R>
    where
        F: Fn(A) -> R,
    {
        let first = !std::mem::replace(&mut self.fired().unbound, true);
        self.run_if(first, None, args)
    }

    /// Call bound to `receiver`. Runs `func` on the first call for that receiver only.
    ///
    /// The receiver's key stays in this gate's table for as long as the gate lives, even after
    /// the receiver itself is dropped.
    pub fn call_on<Recv, A, R>(&self, receiver: &Recv, args: A) -> Option<R>
    where
        Recv: Receiver + ?Sized,
        F: Fn(A) -> R,
    {
        let key = receiver.receiver_key();
        let first = self.fired().receivers.insert(key);
        self.run_if(first, Some(key), args)
    }

    // The marker is already set here, so a panicking `func` still uses up its call.
    fn run_if<A, R>(&self, first: bool, receiver: Option<ReceiverKey>, args: A) -> Option<R>
    where
        F: Fn(A) -> R,
    {
        if first {
            trace!(gate = ?self.id, ?receiver, "once: executing");
            Some((self.func)(args))
        } else {
            trace!(gate = ?self.id, ?receiver, "once: already called");
            None
        }
    }

    fn fired(&self) -> std::sync::MutexGuard<'_, Fired> {
        self.fired.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F> std::fmt::Debug for Once<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Once")
            .field("id", &self.id)
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}

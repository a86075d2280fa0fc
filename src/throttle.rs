//! Run a callable at most `max` times per `wait` window.
//!
//! Windows are fixed and reset eagerly: the first call that arrives `wait` or more after the
//! current window opened starts a fresh window with a zero count, before it is itself counted.
//! No timers are involved; all state is recomputed from timestamps on each call.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// Executions allowed per window when no `max` is given.
pub const DEFAULT_MAX: u64 = 1;

struct Window<R> {
    /// `None` until the first call, i.e. infinitely far in the past.
    start: Option<Instant>,
    count: u64,
    last_result: Option<R>,
}

pub struct Throttle<F, R> {
    func: F,
    wait: Duration,
    max: u64,
    window: Mutex<Window<R>>,
}

/// Wrap `func` so that it runs at most once per `wait`.
pub fn throttle<F, R>(func: F, wait: Duration) -> Throttle<F, R> {
    Throttle::new(func, wait)
}

impl<F, R> Throttle<F, R> {
    pub fn new(func: F, wait: Duration) -> Self {
        Self::with_max(func, wait, DEFAULT_MAX)
    }

    /// A `max` of zero suppresses every call.
    pub fn with_max(func: F, wait: Duration, max: u64) -> Self {
        Self {
            func,
            wait,
            max,
            window: Mutex::new(Window {
                start: None,
                count: 0,
                last_result: None,
            }),
        }
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Executions still allowed right now, without opening a new window.
    pub fn remaining(&self) -> u64 {
        let window = self.window();
        let used = match window.start {
            Some(start) if Instant::now() - start < self.wait => window.count,
            _ => 0,
        };
        self.max.saturating_sub(used)
    }

    /// Result of the most recent real execution.
    pub fn last_result(&self) -> Option<R>
    where
        R: Clone,
    {
        self.window().last_result.clone()
    }

    /// Run `func` if the current window has a free slot, otherwise return the cached result.
    ///
    /// Returns `None` only if `func` has never run.
    pub fn call<A>(&self, args: A) -> Option<R>
    where
        F: Fn(A) -> R,
        R: Clone,
    {
        {
            let mut window = self.window();
            let now = Instant::now();
            let expired = window.start.map_or(true, |start| now - start >= self.wait);
            if expired {
                window.start = Some(now);
                window.count = 0;
            }
            if window.count >= self.max {
                trace!(count = window.count, max = self.max, "throttle: suppressed");
                return window.last_result.clone();
            }
            // Counted before running, so a panicking call still takes its slot.
            window.count += 1;
            trace!(count = window.count, max = self.max, "throttle: executing");
        }

        let result = (self.func)(args);
        self.window().last_result = Some(result.clone());
        Some(result)
    }

    fn window(&self) -> MutexGuard<'_, Window<R>> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F, R> std::fmt::Debug for Throttle<F, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("wait", &self.wait)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

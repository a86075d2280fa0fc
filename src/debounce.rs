//! Coalesce bursts of calls into a single execution.
//!
//! Every call cancels whatever execution the gate has pending and schedules a new one
//! `threshold` later, so a burst of calls spaced closer than `threshold` collapses into one
//! execution:
//! - trailing edge (default): the deferred execution runs `func` with the arguments of the last
//!   call of the burst;
//! - leading edge ([`DebounceConfig::leading`]): the first call of the burst runs `func` straight
//!   away, and the deferred execution only marks the end of the quiet period.
//!
//! Deferred executions are tokio tasks. Panics inside them cannot reach any caller; they are
//! logged and then left to the runtime's task panic handling.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::Result;

/// Quiet period used when none is configured.
pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DebounceConfig {
    pub threshold: Duration,
    /// Run on the leading edge of a burst instead of the trailing edge.
    pub exec_asap: bool,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            exec_asap: false,
        }
    }
}

impl DebounceConfig {
    pub fn threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn leading(mut self) -> Self {
        self.exec_asap = true;
        self
    }

    pub fn trailing(mut self) -> Self {
        self.exec_asap = false;
        self
    }
}

/// The single timer slot of a gate.
#[derive(Default)]
struct Pending {
    /// Bumped on every schedule; a waking task only fires if it still matches.
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct Inner<F> {
    func: F,
    config: DebounceConfig,
    handle: Handle,
    pending: Mutex<Pending>,
}

/// Clones share the same gate, and so the same timer slot.
pub struct Debounce<F> {
    inner: Arc<Inner<F>>,
}

/// Wrap `func` with the default configuration: trailing edge, 100ms quiet period.
///
/// Must be called from within a tokio runtime.
pub fn debounce<F>(func: F) -> Result<Debounce<F>> {
    Debounce::new(func, DebounceConfig::default())
}

impl<F> Debounce<F> {
    /// Build a gate that schedules its deferred executions on the current tokio runtime.
    pub fn new(func: F, config: DebounceConfig) -> Result<Self> {
        Ok(Self::with_handle(func, config, Handle::try_current()?))
    }

    pub fn with_handle(func: F, config: DebounceConfig, handle: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                func,
                config,
                handle,
                pending: Mutex::new(Pending::default()),
            }),
        }
    }

    pub fn config(&self) -> DebounceConfig {
        self.inner.config
    }

    /// Whether a deferred execution is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.inner.pending().task.is_some()
    }

    /// Register a call. Never returns a value: the real execution is either immediate
    /// (leading edge) or deferred.
    pub fn call<A>(&self, args: A)
    where
        F: Fn(A) + Send + Sync + 'static,
        A: Send + 'static,
    {
        // Cancel, decide and re-arm under one lock hold, so racing callers agree on which of
        // them opened the burst.
        let (leading_args, generation) = {
            let mut pending = self.inner.pending();
            let was_pending = match pending.task.take() {
                Some(task) => {
                    task.abort();
                    true
                }
                None => false,
            };
            let (leading_args, deferred_args) = match (self.inner.config.exec_asap, was_pending) {
                (true, false) => (Some(args), None),
                (true, true) => (None, None),
                (false, _) => (None, Some(args)),
            };
            (leading_args, self.schedule(&mut *pending, deferred_args))
        };

        if let Some(args) = leading_args {
            trace!(generation, "debounce: leading edge");
            let ran = panic::catch_unwind(AssertUnwindSafe(|| (self.inner.func)(args)));
            if let Err(payload) = ran {
                self.inner.disarm(generation);
                panic::resume_unwind(payload);
            }
        }
    }

    /// Fill the slot with a new deferred execution. The caller holds the lock, so a zero
    /// threshold cannot fire before the slot is filled.
    fn schedule<A>(&self, pending: &mut Pending, args: Option<A>) -> u64
    where
        F: Fn(A) + Send + Sync + 'static,
        A: Send + 'static,
    {
        pending.generation += 1;
        let generation = pending.generation;
        trace!(generation, "debounce: scheduled");

        let inner = Arc::clone(&self.inner);
        let threshold = inner.config.threshold;
        let task = self.inner.handle.spawn(async move {
            tokio::time::sleep(threshold).await;
            let fired = AssertUnwindSafe(async move { inner.fire(generation, args) })
                .catch_unwind()
                .await;
            if let Err(payload) = fired {
                error!(generation, "debounce: deferred execution panicked");
                panic::resume_unwind(payload);
            }
        });
        pending.task = Some(task);
        generation
    }
}

impl<F> Inner<F> {
    fn fire<A>(&self, generation: u64, args: Option<A>)
    where
        F: Fn(A),
    {
        {
            let mut pending = self.pending();
            if pending.generation != generation || pending.task.is_none() {
                trace!(generation, "debounce: superseded");
                return;
            }
            pending.task = None;
        }

        match args {
            Some(args) => {
                trace!(generation, "debounce: trailing edge");
                (self.func)(args);
            }
            None => trace!(generation, "debounce: quiet period over"),
        }
    }

    /// Empty the slot if it still holds `generation`.
    fn disarm(&self, generation: u64) {
        let mut pending = self.pending();
        if pending.generation == generation {
            if let Some(task) = pending.task.take() {
                task.abort();
                trace!(generation, "debounce: disarmed after leading panic");
            }
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<F> Clone for Debounce<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> std::fmt::Debug for Debounce<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debounce")
            .field("config", &self.inner.config)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tokio::time::sleep;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(u32) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(vec![]));
        let sink = Arc::clone(&calls);
        (calls, move |x: u32| sink.lock().unwrap().push(x))
    }

    #[test]
    fn test_needs_runtime() {
        let res = debounce(|()| ());
        assert!(matches!(res, Err(Error::NoRuntime(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = DebounceConfig::default();
        assert_eq!(config.threshold, Duration::from_millis(100));
        assert!(!config.exec_asap);

        let config = config.threshold(Duration::from_millis(5)).leading();
        assert!(config.exec_asap);
        assert_eq!(config.threshold, Duration::from_millis(5));
        assert!(!config.trailing().exec_asap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_threshold() {
        let (calls, func) = recorder();
        let gate = debounce(func).unwrap();

        gate.call(1);
        assert!(gate.is_pending());

        sleep(Duration::from_millis(99)).await;
        assert!(calls.lock().unwrap().is_empty());

        sleep(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(*calls.lock().unwrap(), vec![1]);
        assert!(!gate.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_threshold_fires_on_next_tick() {
        let (calls, func) = recorder();
        let config = DebounceConfig::default().threshold(Duration::ZERO);
        let gate = Debounce::new(func, config).unwrap();

        gate.call(7);
        assert!(calls.lock().unwrap().is_empty());
        sleep(Duration::from_millis(1)).await;
        assert_eq!(*calls.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leading_clears_pending_without_running_again() {
        let (calls, func) = recorder();
        let config = DebounceConfig::default().threshold(Duration::from_millis(50)).leading();
        let gate = Debounce::new(func, config).unwrap();

        gate.call(1);
        gate.call(2);
        assert_eq!(*calls.lock().unwrap(), vec![1]);
        assert!(gate.is_pending());

        sleep(Duration::from_millis(100)).await;
        assert!(!gate.is_pending());
        assert_eq!(*calls.lock().unwrap(), vec![1]);

        // A new burst gets its own leading execution
        gate.call(3);
        assert_eq!(*calls.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_one_slot() {
        let (calls, func) = recorder();
        let config = DebounceConfig::default().threshold(Duration::from_millis(50));
        let gate = Debounce::new(func, config).unwrap();
        let other = gate.clone();

        gate.call(1);
        other.call(2);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(*calls.lock().unwrap(), vec![2]);
    }
}

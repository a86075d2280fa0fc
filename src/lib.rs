//! # Call Gate
//! Sometimes you want to control *when* a function runs rather than *what* it does: run a setup routine only once, stop a handler from running more than a few times a second, or wait until a stream of events has settled before reacting to it. This crate provides three wrappers ("gates") for exactly that: [`Once`], [`Throttle`] and [`Debounce`].
//!
//! Each gate owns the callable it wraps and is invoked with a single argument value (use a tuple for more than one).
//!
//! # Example
//! Here, we throttle a function to one execution per second, and debounce another with a 50ms quiet period. The throttled function runs on the first call and hands back its cached result on the second. The debounced function only runs once the calls stop, with the argument of the last call.
//! ```
//! # use call_gate::{throttle, Debounce, DebounceConfig};
//! # use std::sync::{Arc, Mutex};
//! # use std::time::Duration;
//! # #[tokio::main]
//! # async fn main() -> call_gate::Result<()> {
//!     let throttled = throttle(|x: u32| x * 2, Duration::from_secs(1));
//!     assert_eq!(throttled.call(1), Some(2));
//!     assert_eq!(throttled.call(5), Some(2));
//!
//!     let seen = Arc::new(Mutex::new(vec![]));
//!     let sink = Arc::clone(&seen);
//!     let config = DebounceConfig::default().threshold(Duration::from_millis(50));
//!     let debounced = Debounce::new(move |x: u32| sink.lock().unwrap().push(x), config)?;
//!     for i in 0..5 {
//!         debounced.call(i);
//!     }
//!     tokio::time::sleep(Duration::from_millis(100)).await;
//!     assert_eq!(*seen.lock().unwrap(), vec![4]);
//! #   Ok(())
//! # }
//! ```
//!
//! # Limitations
//! Gates are safe to share between threads, but their timing guarantees assume calls arrive on one logical timeline.
//!
//! Deferred (debounced) executions run as tokio tasks, so a [`Debounce`] gate must be built inside a tokio runtime or be given a [`tokio::runtime::Handle`].

mod debounce;
mod error;
mod once;
mod throttle;

pub use debounce::{debounce, Debounce, DebounceConfig, DEFAULT_THRESHOLD};
pub use error::{Error, Result};
pub use once::{once, GateId, Once, Receiver, ReceiverKey};
pub use throttle::{throttle, Throttle, DEFAULT_MAX};

//! # Signal Proxy
//!
//! Closure-based subscriptions on top of an engine's string-keyed native
//! signals. Engine objects keep one [`SignalProxy`]; callers subscribe typed
//! closures to signal names and the proxy manages the native connection.
//!
//! ## Core Features
//!
//! - **Lazy registration**: the native signal is connected on the first
//!   subscription and disconnected when the last one leaves
//! - **Many listeners**: every subscriber is kept, invoked in subscription order
//! - **One-shot**: a listener can be removed before its first invocation
//! - **Deferred**: a listener can run on the next frame instead of inside dispatch
//! - **Typed payloads**: `()`, `(A,)`, `(A, B)` and `(A, B, C)` decoded from
//!   native arguments into the closure's parameter types
//!
//! ## Threading
//!
//! Everything here runs on the host's update thread. Handles are `Rc`-based
//! and deliberately `!Send`.
//!
//! ## Quick Start
//!
//! ```rust
//! use signal_proxy::{FrameScheduler, LocalSignals, SignalProxy, SubscribeOptions};
//! use std::rc::Rc;
//!
//! let node = Rc::new(LocalSignals::new("Player", ["ready", "health_changed"]));
//! let scheduler = FrameScheduler::new();
//! let proxy = SignalProxy::new(node.clone(), scheduler.clone());
//!
//! proxy.subscribe("ready", || println!("ready")).unwrap();
//! proxy
//!     .subscribe_with(
//!         "health_changed",
//!         SubscribeOptions::new().deferred(),
//!         |old: i64, new: i64| println!("health {old} -> {new}"),
//!     )
//!     .unwrap();
//!
//! node.emit("ready", &[]).unwrap();
//! node.emit_payload("health_changed", &(100i64, 80i64)).unwrap();
//! scheduler.run_frame();
//! ```

pub mod error;
pub mod macros;
pub mod native;
pub mod payload;
pub mod proxy;
pub mod scheduler;
pub mod stats;
pub mod subscription;
pub mod types;


pub use error::SignalError;
pub use macros::SignalOwner;
pub use native::{DispatchEntry, DispatchTarget, LocalSignals, NativeSource, SignalCounters};
pub use payload::{Callback, ObjectRef, Payload};
pub use proxy::SignalProxy;
pub use scheduler::{FrameScheduler, SchedulerConfig, SchedulerStats};
pub use stats::ProxyStats;
pub use subscription::{Subscription, SubscriptionList};
pub use types::{ProxyId, SubscribeOptions, SubscriptionId};

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, SignalError>;

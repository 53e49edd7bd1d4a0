//! COD Scheduler
//!
//! Keyed single-flight coalescing: concurrent operations that share a key
//! cause exactly one underlying execution, whose captured response is
//! delivered to every one of them.
//!
//! # Architecture
//!
//! ```text
//! operation → KeyFunction ─ None ──────────────→ private execution → on_result
//!                  │
//!                  └ Some(key) → Registry ─ pending? → append waiter
//!                                    │
//!                                    └ vacant → spawn work(OutputInterceptor)
//!                                                   │ terminal call
//!                                                   ↓
//!                              drain entry → resume waiters in FIFO order
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cod_scheduler::{key_fn, CoalescingScheduler};
//! use cod_response::{Body, ResponseSink};
//!
//! let scheduler = CoalescingScheduler::new(key_fn(|path: &str| Ok(Some(path.to_string()))));
//!
//! let descriptor = scheduler
//!     .execute("/welcome", |mut out| async move {
//!         out.send(Body::from("hello"))?;
//!         Ok(())
//!     })
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod error;
pub mod key;
pub mod scheduler;

// Re-exports for convenience
pub use config::SchedulerConfig;
pub use error::{CoalesceError, CoalesceResult, ExecutionFailure, KeyError};
pub use key::{key_fn, FnKeyFunction, KeyFunction};
pub use scheduler::{Admission, Callback, CoalescingScheduler, Continuation, Outcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the scheduler
    pub use crate::{
        key_fn, Admission, CoalesceError, CoalescingScheduler, Continuation, ExecutionFailure,
        KeyError, KeyFunction, Outcome, SchedulerConfig,
    };
    pub use cod_response::prelude::*;
}

//! COD Response Capture
//!
//! One execution's output, captured once and replayed onto many sinks.
//!
//! # Core Concepts
//!
//! - [`ResponseDescriptor`]: serializable record of status, headers and one terminal output
//! - [`ResponseSink`]: side-effecting response surface implemented by transports
//! - [`OutputInterceptor`]: recorder sink bound to a single execution
//! - [`ReplayDriver`]: applies a descriptor onto any sink
//!
//! # Example
//!
//! ```rust,ignore
//! use cod_response::{Body, ExecutionId, OutputInterceptor, ReplayDriver, ResponseSink};
//!
//! let (mut out, mut completion) = OutputInterceptor::new(ExecutionId::new());
//! out.set_header("Content-Type", "text/plain")?;
//! out.send(Body::from("hello"))?;
//!
//! let descriptor = completion.try_recv()?;
//! ReplayDriver::new().replay(&descriptor, &mut live_sink)?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
mod descriptor;
mod error;
mod interceptor;
mod replay;
mod sink;

// Re-exports
pub use descriptor::{Body, DescriptorBuilder, ExecutionId, Redirect, ResponseDescriptor, Terminal};
pub use error::{DescriptorError, ReplayError, SinkError, TERMINAL_CONTRACT};
pub use interceptor::{Completion, OutputInterceptor};
pub use replay::{replay, ReplayDriver};
pub use sink::ResponseSink;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for capturing and replaying responses
    pub use crate::{
        Body, ExecutionId, OutputInterceptor, Redirect, ReplayDriver, ReplayError,
        ResponseDescriptor, ResponseSink, SinkError, Terminal,
    };
}

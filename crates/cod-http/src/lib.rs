//! COD HTTP Integration
//!
//! Cache-on-demand for HTTP request handlers: simultaneous safe,
//! anonymous requests for the same target run the handler once, and every
//! one of them receives the same response.
//!
//! # Core Concepts
//!
//! - [`RequestContext`]: method, target, user and session of a request
//! - [`HttpKeyPolicy`]: decides coalescability, keys by target
//! - [`HttpResponseSink`]: live sink producing an `http::Response<Vec<u8>>`
//! - [`CacheOnDemand`]: the middleware tying policy, scheduler and replay together
//!
//! # Example
//!
//! ```rust,ignore
//! use cod_http::{CacheOnDemand, HttpResponseSink, RequestContext};
//! use cod_response::{Body, ResponseSink};
//!
//! let cod = CacheOnDemand::new();
//! let mut sink = HttpResponseSink::new();
//!
//! cod.handle(&RequestContext::get("/welcome"), &mut sink, |req, mut out| async move {
//!     out.send(Body::from(format!("URL was: {}", req.target)))?;
//!     Ok(())
//! })
//! .await?;
//!
//! let response = sink.into_response();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod sink;

// Re-exports for convenience
pub use config::CodConfig;
pub use context::RequestContext;
pub use error::{ConfigError, HandleError};
pub use middleware::{CacheOnDemand, Handler};
pub use policy::{HttpKeyPolicy, KeyPolicyConfig};
pub use sink::HttpResponseSink;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for serving requests through the middleware
    pub use crate::{
        CacheOnDemand, CodConfig, HandleError, Handler, HttpKeyPolicy, HttpResponseSink,
        KeyPolicyConfig, RequestContext,
    };
    pub use cod_response::prelude::*;
}

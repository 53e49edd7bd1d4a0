//! Output sink capability
//!
//! The side-effecting surface an execution writes its response through.
//! Transports implement it for their live response objects; the
//! [`OutputInterceptor`](crate::OutputInterceptor) implements it as a recorder.

use crate::descriptor::{Body, Redirect};
use crate::error::SinkError;

/// Side-effecting response surface
///
/// `send`, `redirect` and `end` are terminal: after the first one a sink
/// is finalized and rejects every later write.
pub trait ResponseSink: Send {
    /// Current status code, if one was set
    fn status_code(&self) -> Option<u16>;

    /// Set the status code
    ///
    /// # Errors
    /// Returns `SinkError` if the sink is finalized or refuses the code
    fn set_status(&mut self, code: u16) -> Result<(), SinkError>;

    /// Set a header, replacing any previous value for the same name
    ///
    /// # Errors
    /// Returns `SinkError` if the sink is finalized or refuses the header
    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError>;

    /// Terminal: send a body
    ///
    /// # Errors
    /// Returns `SinkError` if the sink is already finalized
    fn send(&mut self, body: Body) -> Result<(), SinkError>;

    /// Terminal: redirect
    ///
    /// # Errors
    /// Returns `SinkError` if the sink is already finalized
    fn redirect(&mut self, redirect: Redirect) -> Result<(), SinkError>;

    /// Terminal: write raw bytes and end the response
    ///
    /// # Errors
    /// Returns `SinkError` if the sink is already finalized
    fn end(&mut self, raw: Vec<u8>) -> Result<(), SinkError>;
}

impl<S: ResponseSink + ?Sized> ResponseSink for &mut S {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }

    fn set_status(&mut self, code: u16) -> Result<(), SinkError> {
        (**self).set_status(code)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        (**self).set_header(name, value)
    }

    fn send(&mut self, body: Body) -> Result<(), SinkError> {
        (**self).send(body)
    }

    fn redirect(&mut self, redirect: Redirect) -> Result<(), SinkError> {
        (**self).redirect(redirect)
    }

    fn end(&mut self, raw: Vec<u8>) -> Result<(), SinkError> {
        (**self).end(raw)
    }
}

impl<S: ResponseSink + ?Sized> ResponseSink for Box<S> {
    fn status_code(&self) -> Option<u16> {
        (**self).status_code()
    }

    fn set_status(&mut self, code: u16) -> Result<(), SinkError> {
        (**self).set_status(code)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        (**self).set_header(name, value)
    }

    fn send(&mut self, body: Body) -> Result<(), SinkError> {
        (**self).send(body)
    }

    fn redirect(&mut self, redirect: Redirect) -> Result<(), SinkError> {
        (**self).redirect(redirect)
    }

    fn end(&mut self, raw: Vec<u8>) -> Result<(), SinkError> {
        (**self).end(raw)
    }
}

//! `ResponseSink` over `http` types
//!
//! Accumulates status, headers and body, then yields an
//! `http::Response<Vec<u8>>` for the transport to write out.

use cod_response::{Body, Redirect, ResponseSink, SinkError};
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

/// Live sink for one HTTP response
#[derive(Debug, Default)]
pub struct HttpResponseSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    finalized_by: Option<&'static str>,
}

impl HttpResponseSink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal call has fired
    #[inline]
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized_by.is_some()
    }

    /// Headers written so far
    #[inline]
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Finished response; status defaults to 200
    #[must_use]
    pub fn into_response(self) -> Response<Vec<u8>> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }

    fn writable(&self) -> Result<(), SinkError> {
        match self.finalized_by {
            Some(by) => Err(SinkError::AlreadyFinalized(by)),
            None => Ok(()),
        }
    }

    fn finalize(&mut self, call: &'static str, body: Vec<u8>) {
        self.body = body;
        self.finalized_by = Some(call);
    }
}

fn status(code: u16) -> Result<StatusCode, SinkError> {
    StatusCode::from_u16(code).map_err(|_| SinkError::rejected(format!("invalid status code {code}")))
}

fn header_value(value: &str) -> Result<HeaderValue, SinkError> {
    HeaderValue::from_str(value).map_err(|_| SinkError::rejected(format!("invalid header value {value:?}")))
}

impl ResponseSink for HttpResponseSink {
    fn status_code(&self) -> Option<u16> {
        self.status.map(|code| code.as_u16())
    }

    fn set_status(&mut self, code: u16) -> Result<(), SinkError> {
        self.writable()?;
        self.status = Some(status(code)?);
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        self.writable()?;
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| SinkError::rejected(format!("invalid header name {name:?}")))?;
        self.headers.insert(name, header_value(value)?);
        Ok(())
    }

    fn send(&mut self, body: Body) -> Result<(), SinkError> {
        self.writable()?;
        if !self.headers.contains_key(CONTENT_TYPE) {
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(body.default_content_type()));
        }
        self.finalize("send", body.to_bytes());
        Ok(())
    }

    fn redirect(&mut self, redirect: Redirect) -> Result<(), SinkError> {
        self.writable()?;
        let code = status(redirect.effective_status())?;
        self.headers.insert(LOCATION, header_value(&redirect.location)?);
        self.status = Some(code);
        self.finalize("redirect", Vec::new());
        Ok(())
    }

    fn end(&mut self, raw: Vec<u8>) -> Result<(), SinkError> {
        self.writable()?;
        self.finalize("end", raw);
        Ok(())
    }
}

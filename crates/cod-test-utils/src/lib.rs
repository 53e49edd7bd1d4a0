//! Testing utilities for COD workspace
//!
//! Shared test helpers, fixtures, and assertions.

#![allow(missing_docs)]

use cod_response::{Body, OutputInterceptor, Redirect, ResponseSink, SinkError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Terminal output observed on a [`RecordingSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Body(Body),
    Redirect(Redirect),
    Raw(Vec<u8>),
}

/// In-memory sink that records every call it receives
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingSink {
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    pub output: Option<Output>,
    pub calls: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(code: u16) -> Self {
        Self {
            status: Some(code),
            ..Self::default()
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.output.is_some()
    }

    pub fn body_text(&self) -> Option<String> {
        match &self.output {
            Some(Output::Body(body)) => Some(String::from_utf8_lossy(&body.to_bytes()).into_owned()),
            _ => None,
        }
    }

    fn guard(&self) -> Result<(), SinkError> {
        match &self.output {
            None => Ok(()),
            Some(Output::Body(_)) => Err(SinkError::AlreadyFinalized("send")),
            Some(Output::Redirect(_)) => Err(SinkError::AlreadyFinalized("redirect")),
            Some(Output::Raw(_)) => Err(SinkError::AlreadyFinalized("end")),
        }
    }
}

impl ResponseSink for RecordingSink {
    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn set_status(&mut self, code: u16) -> Result<(), SinkError> {
        self.guard()?;
        self.calls.push(format!("set_status({code})"));
        self.status = Some(code);
        Ok(())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), SinkError> {
        self.guard()?;
        self.calls.push(format!("set_header({name}, {value})"));
        self.headers.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn send(&mut self, body: Body) -> Result<(), SinkError> {
        self.guard()?;
        self.calls.push("send".to_string());
        self.output = Some(Output::Body(body));
        Ok(())
    }

    fn redirect(&mut self, redirect: Redirect) -> Result<(), SinkError> {
        self.guard()?;
        self.calls.push("redirect".to_string());
        self.status = Some(redirect.effective_status());
        self.output = Some(Output::Redirect(redirect));
        Ok(())
    }

    fn end(&mut self, raw: Vec<u8>) -> Result<(), SinkError> {
        self.guard()?;
        self.calls.push("end".to_string());
        self.output = Some(Output::Raw(raw));
        Ok(())
    }
}

/// Counts underlying executions across tasks
#[derive(Debug, Clone, Default)]
pub struct WorkCounter(Arc<AtomicUsize>);

impl WorkCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one execution, returning its 1-based ordinal
    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects values in the order continuations fire
#[derive(Debug, Clone, Default)]
pub struct OrderLog<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> OrderLog<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.lock().push(value);
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Work that sleeps, counts itself and sends a body naming the count
pub fn slow_send(
    counter: WorkCounter,
    delay: Duration,
    target: &str,
) -> impl FnOnce(OutputInterceptor) -> WorkFuture + Send + 'static {
    let target = target.to_string();
    move |mut out: OutputInterceptor| -> WorkFuture {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            let count = counter.bump();
            out.set_header("Content-Type", "text/plain")?;
            out.send(Body::from(format!("URL was: {target}, work count is: {count}")))?;
            Ok(())
        })
    }
}

/// Work that counts itself and redirects
pub fn redirect_to(
    counter: WorkCounter,
    redirect: Redirect,
) -> impl FnOnce(OutputInterceptor) -> WorkFuture + Send + 'static {
    move |mut out: OutputInterceptor| -> WorkFuture {
        Box::pin(async move {
            counter.bump();
            out.redirect(redirect)?;
            Ok(())
        })
    }
}

/// Work that fails after `delay` without any terminal call
pub fn failing_after(
    counter: WorkCounter,
    delay: Duration,
    message: &'static str,
) -> impl FnOnce(OutputInterceptor) -> WorkFuture + Send + 'static {
    move |mut out: OutputInterceptor| -> WorkFuture {
        Box::pin(async move {
            out.set_header("X-Started", "1")?;
            tokio::time::sleep(delay).await;
            counter.bump();
            anyhow::bail!(message)
        })
    }
}

/// Work that writes headers and returns without a terminal call
pub fn never_terminates(counter: WorkCounter) -> impl FnOnce(OutputInterceptor) -> WorkFuture + Send + 'static {
    move |mut out: OutputInterceptor| -> WorkFuture {
        Box::pin(async move {
            counter.bump();
            out.set_status(200)?;
            out.set_header("X-Forgot", "to-send")?;
            Ok(())
        })
    }
}

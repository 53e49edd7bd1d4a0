//! Key Function capability
//!
//! Decides whether an operation may be coalesced and, if so, which key
//! groups it with its peers. Supplied by the integrator.

use crate::error::KeyError;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

/// Computes the coalescing key for an operation
///
/// `Ok(None)` means "never coalesce this operation": it runs on its own.
pub trait KeyFunction: Send + Sync + 'static {
    /// Operation context the key is derived from
    type Context: ?Sized;

    /// Coalescing key
    type Key: Hash + Eq + Clone + Debug + Send + Sync + 'static;

    /// Compute the key for `ctx`
    ///
    /// # Errors
    /// Returns `KeyError` if the context cannot be evaluated
    fn key(&self, ctx: &Self::Context) -> Result<Option<Self::Key>, KeyError>;
}

/// Key function backed by a closure
pub struct FnKeyFunction<C: ?Sized, K, F> {
    f: F,
    _marker: PhantomData<fn(&C) -> K>,
}

impl<C: ?Sized, K, F> std::fmt::Debug for FnKeyFunction<C, K, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnKeyFunction").finish_non_exhaustive()
    }
}

impl<C, K, F> KeyFunction for FnKeyFunction<C, K, F>
where
    C: ?Sized + 'static,
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    F: Fn(&C) -> Result<Option<K>, KeyError> + Send + Sync + 'static,
{
    type Context = C;
    type Key = K;

    #[inline]
    fn key(&self, ctx: &C) -> Result<Option<K>, KeyError> {
        (self.f)(ctx)
    }
}

/// Wrap a closure as a [`KeyFunction`]
#[inline]
#[must_use]
pub fn key_fn<C, K, F>(f: F) -> FnKeyFunction<C, K, F>
where
    C: ?Sized,
    F: Fn(&C) -> Result<Option<K>, KeyError>,
{
    FnKeyFunction {
        f,
        _marker: PhantomData,
    }
}

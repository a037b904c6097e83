/// Type-state markers for the builder pattern
///
/// These types track at compile time whether the base URL has been set,
/// so a client without an endpoint cannot be built.

use std::marker::PhantomData;

/// Marker trait for URL state
pub trait UrlState {}

/// Base URL has not been set
pub struct NoUrl;
impl UrlState for NoUrl {}

/// Base URL has been set
pub struct HasUrl;
impl UrlState for HasUrl {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<U> {
    _url: PhantomData<U>,
}

impl<U> TypeState<U> {
    pub(crate) fn new() -> Self {
        Self { _url: PhantomData }
    }
}

impl<U> Default for TypeState<U> {
    fn default() -> Self {
        Self::new()
    }
}

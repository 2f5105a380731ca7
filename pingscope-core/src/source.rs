use std::sync::Arc;

use crate::error::NetworkFailure;
use crate::model::InferenceQuery;

/// The inference service as seen from the controller. Implementations block;
/// the controller runs each call on its own worker thread.
pub trait InferenceSource: Send + Sync + 'static {
    /// Returns the body of a 2xx response. Anything else is a
    /// [`NetworkFailure`]; decoding is left to the caller.
    fn fetch(&self, query: &InferenceQuery) -> Result<String, NetworkFailure>;
}

impl<T: InferenceSource + ?Sized> InferenceSource for Arc<T> {
    fn fetch(&self, query: &InferenceQuery) -> Result<String, NetworkFailure> {
        (**self).fetch(query)
    }
}

impl<T: InferenceSource + ?Sized> InferenceSource for Box<T> {
    fn fetch(&self, query: &InferenceQuery) -> Result<String, NetworkFailure> {
        (**self).fetch(query)
    }
}

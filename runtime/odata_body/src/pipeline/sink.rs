use tracing_log_error::log_error;

use crate::errors::BodyReadFailure;

/// Where payload failures go when a read degrades to its default value.
///
/// The sink is told about the failure exactly once per failed read.
/// Turning it into a client-facing validation error is up to the caller.
pub trait ErrorSink {
    fn report(&mut self, failure: &BodyReadFailure);
}

impl<F> ErrorSink for F
where
    F: FnMut(&BodyReadFailure),
{
    fn report(&mut self, failure: &BodyReadFailure) {
        self(failure)
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// An [`ErrorSink`] that emits a `WARN` event for every failure.
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&mut self, failure: &BodyReadFailure) {
        log_error!(
            failure,
            level: tracing::Level::WARN,
            "Failed to read the OData request body, falling back to the default value"
        );
    }
}

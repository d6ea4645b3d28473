//! Action invocations: binding named parameters out of the request body.
pub use binder::{ActionParameterBinder, ModelBindingResult};
pub use parameters::{ActionParameters, ActionParametersDeserializer};

mod binder;
mod parameters;

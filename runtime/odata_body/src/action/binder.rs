use std::sync::Arc;

use super::ActionParameters;
use crate::edm::EdmValue;
use crate::errors::ReadBodyError;
use crate::pipeline::{ErrorSink, ODataInputFormatter};
use crate::request::ODataRequest;

#[derive(Debug, Clone, Copy, PartialEq)]
/// The outcome of binding a single action parameter.
pub enum ModelBindingResult<'a> {
    /// The parameter was in the payload.
    Success(&'a EdmValue),
    /// The parameter was not in the payload, or action parameters can't be read at all.
    NoResult,
}

impl<'a> ModelBindingResult<'a> {
    pub fn value(self) -> Option<&'a EdmValue> {
        match self {
            ModelBindingResult::Success(value) => Some(value),
            ModelBindingResult::NoResult => None,
        }
    }
}

#[derive(Debug, Clone)]
/// Binds the parameters of an action invocation, one at a time.
///
/// The body is read once per request, on the first call to [`bind`](Self::bind).
/// The resulting [`ActionParameters`] are cached in the request's
/// [`RequestFeatures`](crate::request::RequestFeatures) and every later call
/// is a lookup.
pub struct ActionParameterBinder {
    formatter: Arc<ODataInputFormatter>,
}

impl ActionParameterBinder {
    pub fn new(formatter: Arc<ODataInputFormatter>) -> Self {
        Self { formatter }
    }

    /// Bind the parameter called `name`.
    ///
    /// If the formatter has no deserializer for [`ActionParameters`], every
    /// parameter binds to [`ModelBindingResult::NoResult`].
    /// A payload that can't be read is reported to `errors` once and leaves
    /// every parameter unbound.
    pub async fn bind<'r, E>(
        &self,
        request: &'r mut ODataRequest,
        name: &str,
        errors: &mut E,
    ) -> Result<ModelBindingResult<'r>, ReadBodyError>
    where
        E: ErrorSink,
    {
        if !self.formatter.registry().supports::<ActionParameters>() {
            return Ok(ModelBindingResult::NoResult);
        }
        if request.features().action_parameters().is_none() {
            let parameters = self
                .formatter
                .read(request, ActionParameters::default(), errors)
                .await?;
            request.features_mut().cache_action_parameters(parameters);
        }

        let request: &'r ODataRequest = request;
        let value = request
            .features()
            .action_parameters()
            .and_then(|parameters| parameters.get(name));
        Ok(match value {
            Some(value) => ModelBindingResult::Success(value),
            None => ModelBindingResult::NoResult,
        })
    }
}

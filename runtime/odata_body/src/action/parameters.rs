use std::any::Any;

use indexmap::IndexMap;

use crate::deserializer::typeless::{edm_value, infer};
use crate::deserializer::{
    DeserializationError, Deserializer, DeserializerContext, unexpected_item,
};
use crate::edm::EdmValue;
use crate::payload_kind::PayloadKind;
use crate::reader::{ODataItem, WireReader};

#[derive(Debug, Clone, PartialEq, Default)]
/// The parameters of an action invocation, in payload order.
pub struct ActionParameters(IndexMap<String, EdmValue>);

impl ActionParameters {
    pub fn get(&self, name: &str) -> Option<&EdmValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EdmValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, EdmValue)> for ActionParameters {
    fn from_iter<I: IntoIterator<Item = (String, EdmValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Read an action-parameters payload into [`ActionParameters`].
///
/// Values are converted according to the parameter types declared by the
/// invoked action. If the action isn't in the model, types are inferred.
pub struct ActionParametersDeserializer;

impl Deserializer for ActionParametersDeserializer {
    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::ActionParameters
    }

    fn read(
        &self,
        reader: &mut dyn WireReader,
        context: &DeserializerContext<'_>,
    ) -> Result<Box<dyn Any + Send>, DeserializationError> {
        let parameters = match reader.read(self.payload_kind(), context)? {
            ODataItem::Parameters(parameters) => parameters,
            other => return Err(unexpected_item(self.payload_kind(), &other)),
        };
        let model = context.model();
        let action = context
            .path()
            .action_name()
            .and_then(|name| model.find_action(name));

        let mut values = IndexMap::with_capacity(parameters.len());
        for (name, value) in parameters {
            let value = match action.and_then(|a| a.parameter_type(&name)) {
                Some(type_ref) => edm_value(value, type_ref, model, &format!("$.{name}"))?,
                None => infer(value),
            };
            values.insert(name, value);
        }
        Ok(Box::new(ActionParameters(values)))
    }
}

//! The request deserialization pipeline.
//!
//! [`ODataInputFormatter`] ties everything together: it classifies the read,
//! buffers the body, opens a wire reader, runs the selected deserializer and
//! releases whatever it acquired along the way.
use std::sync::Arc;

use http::Uri;

pub use dispose::{Disposable, DisposalScope};
pub use sink::{ErrorSink, TracingErrorSink};

use crate::base_address::BaseAddressResolver;
use crate::deserializer::{Classification, DeserializerContext, DeserializerRegistry, NativeType};
use crate::edm::EdmModel;
use crate::errors::{
    BodyAlreadyConsumed, BodyReadFailure, MissingEdmModel, MissingODataPath, ReadBodyError,
    UnexpectedValueType,
};
use crate::path::ODataPath;
use crate::payload_kind::PayloadKinds;
use crate::reader::{JsonReaderFactory, ReaderFactory, ReaderSettings, ValidationKinds};
use crate::request::{BodySizeLimit, BufferedBody, ODataRequest};
use crate::version::{ODataVersion, VersionNegotiator};

mod dispose;
mod sink;

#[derive(Clone)]
/// Reads the body of OData requests into values.
///
/// A formatter is built once at startup and shared by every request.
pub struct ODataInputFormatter {
    registry: Arc<DeserializerRegistry>,
    payload_kinds: PayloadKinds,
    base_address: BaseAddressResolver,
    reader_factory: Arc<dyn ReaderFactory>,
    body_size_limit: BodySizeLimit,
    versions: VersionNegotiator,
}

impl ODataInputFormatter {
    /// A formatter that reads the given payload kinds using the OData JSON format.
    pub fn new(registry: DeserializerRegistry, payload_kinds: PayloadKinds) -> Self {
        Self {
            registry: Arc::new(registry),
            payload_kinds,
            base_address: BaseAddressResolver::default(),
            reader_factory: Arc::new(JsonReaderFactory),
            body_size_limit: BodySizeLimit::default(),
            versions: VersionNegotiator::default(),
        }
    }

    #[cfg(feature = "config")]
    /// A formatter configured according to a [`FormatterConfig`](crate::config::FormatterConfig).
    pub fn from_config(
        registry: DeserializerRegistry,
        config: &crate::config::FormatterConfig,
    ) -> Self {
        Self::new(registry, config.accepted_payload_kinds.clone())
            .with_body_size_limit(config.body_size_limit)
            .with_default_version(config.default_version)
    }

    pub fn with_base_address(mut self, resolver: BaseAddressResolver) -> Self {
        self.base_address = resolver;
        self
    }

    /// Use a different wire format.
    pub fn with_reader_factory(mut self, factory: impl ReaderFactory + 'static) -> Self {
        self.reader_factory = Arc::new(factory);
        self
    }

    pub fn with_body_size_limit(mut self, limit: BodySizeLimit) -> Self {
        self.body_size_limit = limit;
        self
    }

    /// The version used when the request doesn't ask for one.
    pub fn with_default_version(mut self, version: ODataVersion) -> Self {
        self.versions = VersionNegotiator::new(version);
        self
    }

    pub fn registry(&self) -> &DeserializerRegistry {
        &self.registry
    }

    pub fn payload_kinds(&self) -> &PayloadKinds {
        &self.payload_kinds
    }

    pub fn versions(&self) -> &VersionNegotiator {
        &self.versions
    }

    pub fn base_address(&self) -> &BaseAddressResolver {
        &self.base_address
    }

    /// `true` if this formatter can read the body of `request` into a `T`.
    ///
    /// Requests that were not routed through an OData endpoint (no OData path)
    /// are never readable; the registry is not consulted for them.
    pub fn can_read<T: 'static>(&self, request: &ODataRequest) -> bool {
        let (Some(path), Some(model)) = (request.path(), request.model()) else {
            return false;
        };
        match self.registry.classify(NativeType::of::<T>(), path, model) {
            Ok(classification) => self.payload_kinds.contains(classification.payload_kind()),
            Err(_) => false,
        }
    }

    /// Read the body of `request` into a `T`, resolving the base address
    /// with the configured [`BaseAddressResolver`].
    ///
    /// See [`read_body`](Self::read_body) for the details.
    pub async fn read<T, E>(
        &self,
        request: &mut ODataRequest,
        default_value: T,
        errors: &mut E,
    ) -> Result<T, ReadBodyError>
    where
        T: 'static,
        E: ErrorSink,
    {
        let base_address = self.base_address.resolve(request);
        let mut disposables = DisposalScope::new();
        self.read_body(request, default_value, base_address, &mut disposables, errors)
            .await
    }

    /// Read the body of `request` into a `T`.
    ///
    /// # Outcomes
    ///
    /// - A request declaring `Content-Length: 0` yields `default_value` without
    ///   running any deserializer.
    /// - A missing EDM model or OData path, or a `T` that can't be read, are
    ///   reported as a [`ReadBodyError`].
    /// - Any failure while reading the payload is reported to `errors` and
    ///   `default_value` is returned.
    ///
    /// Every resource registered in `disposables` during the read has been
    /// released by the time this method returns.
    pub async fn read_body<T, E>(
        &self,
        request: &mut ODataRequest,
        default_value: T,
        base_address: Option<Uri>,
        disposables: &mut DisposalScope,
        errors: &mut E,
    ) -> Result<T, ReadBodyError>
    where
        T: 'static,
        E: ErrorSink,
    {
        if request.head().content_length() == Some(0) {
            return Ok(default_value);
        }
        let model = request.model().cloned().ok_or(MissingEdmModel)?;
        let path = request.path().cloned().ok_or(MissingODataPath)?;
        let classification = self
            .registry
            .classify(NativeType::of::<T>(), &path, &model)?;

        tracing::debug!(
            payload_kind = %classification.payload_kind(),
            expected_type = classification.expected_type().map(tracing::field::display),
            "Reading the OData request body"
        );
        let settings = ReaderSettings {
            base_uri: base_address,
            // Undeclared properties on non-open types are tolerated on input.
            validations: ValidationKinds::all()
                - ValidationKinds::THROW_ON_UNDECLARED_PROPERTY,
            version: self.versions.resolve_response_version(request.head()),
        };

        let outcome = self
            .read_payload::<T>(request, &path, &model, classification, settings, disposables)
            .await;
        disposables.release_all();

        match outcome {
            Ok(value) => Ok(value),
            Err(failure) => {
                errors.report(&failure);
                Ok(default_value)
            }
        }
    }

    async fn read_payload<T: 'static>(
        &self,
        request: &mut ODataRequest,
        path: &ODataPath,
        model: &Arc<EdmModel>,
        classification: Classification,
        settings: ReaderSettings,
        disposables: &mut DisposalScope,
    ) -> Result<T, BodyReadFailure> {
        let body = request.take_body().ok_or(BodyAlreadyConsumed)?;
        let request = &*request;
        let buffered =
            BufferedBody::extract(request.head(), body, self.body_size_limit).await?;

        let reader = self
            .reader_factory
            .open(
                buffered.bytes,
                &request.head().headers,
                settings,
                model.clone(),
            )
            .map_err(BodyReadFailure::OpenReader)?;
        let reader = disposables.register(reader);

        let (expected_type, deserializer) = classification.into_parts();
        let context = DeserializerContext::new(
            path,
            model,
            expected_type,
            NativeType::of::<T>(),
            request.head(),
        );
        let value = deserializer.read(reader.as_mut(), &context)?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(UnexpectedValueType {
                expected: std::any::type_name::<T>(),
            }
            .into()),
        }
    }
}

impl std::fmt::Debug for ODataInputFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataInputFormatter")
            .field("registry", &self.registry)
            .field("payload_kinds", &self.payload_kinds)
            .field("base_address", &self.base_address)
            .field("body_size_limit", &self.body_size_limit)
            .field("versions", &self.versions)
            .finish_non_exhaustive()
    }
}

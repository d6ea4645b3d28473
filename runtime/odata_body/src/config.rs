//! Load the configuration of an [`ODataInputFormatter`](crate::pipeline::ODataInputFormatter).
//!
//! Values are read, in order of increasing precedence, from:
//!
//! - `{configuration_dir}/odata.yml`, if it exists;
//! - environment variables prefixed with `ODATA_`, using `__` to separate
//!   nested keys (e.g. `ODATA_BODY_SIZE_LIMIT__MODE=disabled`).
use std::path::PathBuf;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};

use crate::payload_kind::PayloadKinds;
use crate::request::BodySizeLimit;
use crate::version::{DEFAULT_ODATA_VERSION, ODataVersion};

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
/// How request bodies should be read.
pub struct FormatterConfig {
    /// The version reported when the request carries no version header.
    pub default_version: ODataVersion,
    /// The payload kinds the formatter accepts.
    pub accepted_payload_kinds: PayloadKinds,
    pub body_size_limit: BodySizeLimit,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            default_version: DEFAULT_ODATA_VERSION,
            accepted_payload_kinds: PayloadKinds::default(),
            body_size_limit: BodySizeLimit::default(),
        }
    }
}

impl FormatterConfig {
    /// Load the configuration from `configuration_dir` and the environment.
    pub fn load<Dir>(configuration_dir: Dir) -> Result<Self, ConfigLoadError>
    where
        Dir: Into<PathBuf>,
    {
        let configuration_dir = configuration_dir.into();
        let span = tracing::info_span!(
            "Loading OData configuration",
            configuration.directory = %configuration_dir.display(),
        );
        let _guard = span.enter();

        let figment = Figment::new()
            .merge(Yaml::file(configuration_dir.join("odata.yml")))
            .merge(Env::prefixed("ODATA_").split("__"));
        let configuration: FormatterConfig = figment
            .extract()
            .context("Failed to load the OData configuration")
            .map_err(ConfigLoadError)?;
        Ok(configuration)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to load configuration")]
/// The error returned by [`FormatterConfig::load`].
pub struct ConfigLoadError(#[source] anyhow::Error);

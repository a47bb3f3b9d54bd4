//! Pipeline configuration.
//!
//! # Example
//!
//! ```
//! use interpose_runtime::config::{PipelineConfig, UnhandledRequestStrategy};
//!
//! let config = PipelineConfig::default()
//!     .with_on_unhandled_request(UnhandledRequestStrategy::Error)
//!     .with_warn_on_empty_resolution(false);
//!
//! assert_eq!(config.on_unhandled_request, UnhandledRequestStrategy::Error);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable selecting [`UnhandledRequestStrategy`].
pub const ENV_ON_UNHANDLED_REQUEST: &str = "INTERPOSE_ON_UNHANDLED_REQUEST";
/// Environment variable selecting [`ResolverErrorStrategy`].
pub const ENV_ON_RESOLVER_ERROR: &str = "INTERPOSE_ON_RESOLVER_ERROR";
/// Environment variable toggling the empty-resolution warning.
pub const ENV_WARN_ON_EMPTY_RESOLUTION: &str = "INTERPOSE_WARN_ON_EMPTY_RESOLUTION";

/// Errors from loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value outside its accepted set.
    #[error("Invalid value '{value}' for {key}: expected one of {expected}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Value found
        value: String,
        /// Accepted values
        expected: &'static str,
    },
}

/// What to do with a request no handler matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnhandledRequestStrategy {
    /// Forward to the real network silently.
    #[default]
    Bypass,
    /// Log a warning, then forward to the real network.
    Warn,
    /// Log an error and fail the request without touching the network.
    Error,
}

impl UnhandledRequestStrategy {
    const EXPECTED: &'static str = "bypass, warn, error";

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for UnhandledRequestStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bypass" => Ok(Self::Bypass),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(invalid(ENV_ON_UNHANDLED_REQUEST, s, Self::EXPECTED)),
        }
    }
}

impl fmt::Display for UnhandledRequestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do after a resolver failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverErrorStrategy {
    /// Report `unhandledException`, then use the real network.
    #[default]
    Bypass,
    /// Report `unhandledException`, then fail the request.
    Reject,
}

impl ResolverErrorStrategy {
    const EXPECTED: &'static str = "bypass, reject";

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::Reject => "reject",
        }
    }
}

impl FromStr for ResolverErrorStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bypass" => Ok(Self::Bypass),
            "reject" => Ok(Self::Reject),
            _ => Err(invalid(ENV_ON_RESOLVER_ERROR, s, Self::EXPECTED)),
        }
    }
}

impl fmt::Display for ResolverErrorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a [`MockServer`](crate::server::MockServer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Policy for requests no handler matched
    pub on_unhandled_request: UnhandledRequestStrategy,
    /// Policy after a resolver error
    pub on_resolver_error: ResolverErrorStrategy,
    /// Log a warning when a matched resolver returns no response
    pub warn_on_empty_resolution: bool,
}

impl PipelineConfig {
    /// Create a configuration with explicit values.
    #[must_use]
    pub const fn new(
        on_unhandled_request: UnhandledRequestStrategy,
        on_resolver_error: ResolverErrorStrategy,
        warn_on_empty_resolution: bool,
    ) -> Self {
        Self {
            on_unhandled_request,
            on_resolver_error,
            warn_on_empty_resolution,
        }
    }

    /// Set the unhandled request policy
    #[must_use]
    pub const fn with_on_unhandled_request(mut self, strategy: UnhandledRequestStrategy) -> Self {
        self.on_unhandled_request = strategy;
        self
    }

    /// Set the resolver error policy
    #[must_use]
    pub const fn with_on_resolver_error(mut self, strategy: ResolverErrorStrategy) -> Self {
        self.on_resolver_error = strategy;
        self
    }

    /// Enable or disable the empty-resolution warning
    #[must_use]
    pub const fn with_warn_on_empty_resolution(mut self, warn: bool) -> Self {
        self.warn_on_empty_resolution = warn;
        self
    }

    /// Load from `INTERPOSE_*` environment variables.
    ///
    /// Unset variables keep their default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a variable is set to an
    /// unrecognized value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key/value source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a key holds an unrecognized
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_ON_UNHANDLED_REQUEST) {
            config.on_unhandled_request = value.parse()?;
        }
        if let Some(value) = lookup(ENV_ON_RESOLVER_ERROR) {
            config.on_resolver_error = value.parse()?;
        }
        if let Some(value) = lookup(ENV_WARN_ON_EMPTY_RESOLUTION) {
            config.warn_on_empty_resolution = parse_bool(ENV_WARN_ON_EMPTY_RESOLUTION, &value)?;
        }

        Ok(config)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            on_unhandled_request: UnhandledRequestStrategy::Bypass,
            on_resolver_error: ResolverErrorStrategy::Bypass,
            warn_on_empty_resolution: true,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "true, false, 1, 0, yes, no, on, off")),
    }
}

fn invalid(key: &str, value: &str, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.on_unhandled_request, UnhandledRequestStrategy::Bypass);
        assert_eq!(config.on_resolver_error, ResolverErrorStrategy::Bypass);
        assert!(config.warn_on_empty_resolution);
    }

    #[test]
    fn builder_setters() {
        let config = PipelineConfig::default()
            .with_on_unhandled_request(UnhandledRequestStrategy::Warn)
            .with_on_resolver_error(ResolverErrorStrategy::Reject)
            .with_warn_on_empty_resolution(false);

        assert_eq!(
            config,
            PipelineConfig::new(
                UnhandledRequestStrategy::Warn,
                ResolverErrorStrategy::Reject,
                false
            )
        );
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        assert_eq!(
            PipelineConfig::from_lookup(|_| None).unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn lookup_overrides_each_field() {
        let config = PipelineConfig::from_lookup(lookup(&[
            (ENV_ON_UNHANDLED_REQUEST, "ERROR"),
            (ENV_ON_RESOLVER_ERROR, " reject "),
            (ENV_WARN_ON_EMPTY_RESOLUTION, "off"),
        ]))
        .unwrap();

        assert_eq!(config.on_unhandled_request, UnhandledRequestStrategy::Error);
        assert_eq!(config.on_resolver_error, ResolverErrorStrategy::Reject);
        assert!(!config.warn_on_empty_resolution);
    }

    #[test]
    fn unknown_values_are_rejected() {
        let err = PipelineConfig::from_lookup(lookup(&[(ENV_ON_RESOLVER_ERROR, "retry")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value 'retry' for INTERPOSE_ON_RESOLVER_ERROR: expected one of bypass, reject"
        );

        assert!(PipelineConfig::from_lookup(lookup(&[(ENV_WARN_ON_EMPTY_RESOLUTION, "maybe")])).is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_value(
            PipelineConfig::default().with_on_unhandled_request(UnhandledRequestStrategy::Warn),
        )
        .unwrap();
        assert_eq!(json["on_unhandled_request"], "warn");
        assert_eq!(json["on_resolver_error"], "bypass");

        let parsed: PipelineConfig = serde_json::from_str(r#"{"on_resolver_error":"reject"}"#).unwrap();
        assert_eq!(parsed.on_resolver_error, ResolverErrorStrategy::Reject);
        assert!(parsed.warn_on_empty_resolution);
    }
}

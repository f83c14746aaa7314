use crate::error::ConfigError;

use std::env::{self, VarError};

/// Environment variable holding the fallback host for [`Config::from_env`].
pub const HOST_ENV_VAR: &str = "GATEWAY_HOST";

/// Startup configuration for [`serve_with_config`](crate::serve_with_config).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
  host: String,
}

impl Config {
  /// Construct a configuration with the given fallback host.
  ///
  /// API Gateway does not always include a `Host` header in proxy events; this host is used for
  /// any request without one.
  pub fn new(host: impl Into<String>) -> Self {
    Self { host: host.into() }
  }

  /// Load the configuration from the `GATEWAY_HOST` environment variable, which must be set and
  /// non-empty.
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|name| env::var(name))
  }

  fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Result<String, VarError>,
  {
    match lookup(HOST_ENV_VAR) {
      Ok(host) if !host.is_empty() => Ok(Self::new(host)),
      Ok(_) | Err(VarError::NotPresent) => Err(ConfigError::MissingVar(HOST_ENV_VAR)),
      Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(HOST_ENV_VAR)),
    }
  }

  /// Fallback host.
  pub fn host(&self) -> &str {
    &self.host
  }

  pub(crate) fn into_host(self) -> String {
    self.host
  }
}

//! Client configuration
//!
//! Keys follow the dotted Confluent property names so a configuration can be
//! lifted straight out of a properties map:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `url` | Registry base URL (required, `http://` or `https://`) |
//! | `basic.auth.user.info` | `user:password` for HTTP basic auth |
//! | `ssl.ca.location` | PEM bundle used to verify the registry |
//! | `ssl.certificate.location` | Client certificate (PEM) |
//! | `ssl.key.location` | Client private key (PEM), requires a certificate |
//! | `request.timeout.secs` | Per-request timeout, default 30 |

use crate::error::{SchemaRegistryError, SchemaRegistryResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Schema Registry client configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Registry base URL
    pub url: String,

    /// Basic auth credentials in the form `user:password`
    #[serde(rename = "basic.auth.user.info", default)]
    pub basic_auth_user_info: Option<String>,

    #[serde(rename = "ssl.ca.location", default)]
    pub ssl_ca_location: Option<PathBuf>,

    #[serde(rename = "ssl.certificate.location", default)]
    pub ssl_certificate_location: Option<PathBuf>,

    #[serde(rename = "ssl.key.location", default)]
    pub ssl_key_location: Option<PathBuf>,

    /// Request timeout in seconds (default: 30)
    #[serde(rename = "request.timeout.secs", default = "default_timeout")]
    pub request_timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            basic_auth_user_info: None,
            ssl_ca_location: None,
            ssl_certificate_location: None,
            ssl_key_location: None,
            request_timeout_secs: default_timeout(),
        }
    }

    /// Build from a string-keyed property map, rejecting unknown keys
    pub fn from_properties<I, K>(properties: I) -> SchemaRegistryResult<Self>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let map: serde_json::Map<String, serde_json::Value> = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();

        if !map.contains_key("url") {
            return Err(SchemaRegistryError::Config(
                "Missing required configuration property url".to_string(),
            ));
        }

        let config: ClientConfig = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| SchemaRegistryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        self.basic_auth_user_info = Some(format!("{}:{}", user, password));
        self
    }

    pub fn with_ca_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssl_ca_location = Some(path.into());
        self
    }

    pub fn with_client_certificate(
        mut self,
        certificate: impl Into<PathBuf>,
        key: Option<PathBuf>,
    ) -> Self {
        self.ssl_certificate_location = Some(certificate.into());
        self.ssl_key_location = key;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> SchemaRegistryResult<()> {
        if !self.url.starts_with("http") {
            return Err(SchemaRegistryError::Config(format!(
                "Invalid url {}",
                self.url
            )));
        }

        if self.ssl_key_location.is_some() && self.ssl_certificate_location.is_none() {
            return Err(SchemaRegistryError::Config(
                "ssl.certificate.location required when configuring ssl.key.location".to_string(),
            ));
        }

        if let Some(user_info) = &self.basic_auth_user_info {
            if self.url_credentials().is_some() {
                return Err(SchemaRegistryError::Config(
                    "basic.auth.user.info configured with userinfo credentials in the URL. \
                     Remove userinfo credentials from the url or remove basic.auth.user.info \
                     from the configuration"
                        .to_string(),
                ));
            }
            if !user_info.contains(':') {
                return Err(SchemaRegistryError::Config(
                    "basic.auth.user.info must be in the form of {username}:{password}"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Base URL with trailing slashes and any embedded credentials removed
    pub fn base_url(&self) -> SchemaRegistryResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(self.url.trim_end_matches('/'))
            .map_err(|e| SchemaRegistryError::Config(format!("Invalid url {}: {}", self.url, e)))?;
        if url.cannot_be_a_base() {
            return Err(SchemaRegistryError::Config(format!(
                "Invalid url {}",
                self.url
            )));
        }
        // cannot_be_a_base was ruled out above, so these setters succeed
        let _ = url.set_username("");
        let _ = url.set_password(None);
        Ok(url)
    }

    /// Effective basic auth credentials, from the config key or the URL
    pub fn credentials(&self) -> Option<(String, String)> {
        if let Some(user_info) = &self.basic_auth_user_info {
            let (user, password) = user_info.split_once(':')?;
            return Some((user.to_string(), password.to_string()));
        }
        self.url_credentials()
    }

    fn url_credentials(&self) -> Option<(String, String)> {
        let url = reqwest::Url::parse(&self.url).ok()?;
        if url.username().is_empty() && url.password().is_none() {
            return None;
        }
        Some((
            url.username().to_string(),
            url.password().unwrap_or_default().to_string(),
        ))
    }
}

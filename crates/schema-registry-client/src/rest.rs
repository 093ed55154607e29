//! REST transport
//!
//! [`RestService`] is the seam between [`SchemaRegistryClient`](crate::SchemaRegistryClient)
//! and the wire: the client builds [`RestRequest`]s (method, path segments,
//! query pairs, optional JSON body) and gets back the status and decoded JSON body or
//! a [`SchemaRegistryError`]. [`HttpTransport`] speaks HTTP with a blocking
//! `reqwest` client; [`MockSchemaRegistry`](crate::MockSchemaRegistry) answers
//! in memory.

use crate::config::ClientConfig;
use crate::error::{SchemaRegistryError, SchemaRegistryResult};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::Duration;

const ACCEPT_HEADER: &str = "application/vnd.schemaregistry.v1+json, \
                             application/vnd.schemaregistry+json, application/json";
const CONTENT_TYPE_HEADER: &str = "application/vnd.schemaregistry.v1+json";

/// HTTP method of a registry request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Put => write!(f, "PUT"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A registry request, relative to the registry base URL
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    /// Unescaped path segments, e.g. `["subjects", "orders-value", "versions"]`
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl RestRequest {
    pub fn new<I, S>(method: Method, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            method,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<I: IntoIterator<Item = S>, S: Into<String>>(path: I) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post<I: IntoIterator<Item = S>, S: Into<String>>(path: I) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put<I: IntoIterator<Item = S>, S: Into<String>>(path: I) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete<I: IntoIterator<Item = S>, S: Into<String>>(path: I) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter, if present
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A 2xx registry answer
#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl RestResponse {
    pub fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }
}

/// Something that can answer registry requests
pub trait RestService: Send + Sync {
    /// Send a request and return the decoded 2xx answer
    fn send(&self, request: &RestRequest) -> SchemaRegistryResult<RestResponse>;
}

/// Blocking HTTP transport
pub struct HttpTransport {
    client: Client,
    base_url: reqwest::Url,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> SchemaRegistryResult<Self> {
        config.validate()?;

        let mut builder =
            Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));

        // Add basic auth if configured
        if let Some((user, password)) = config.credentials() {
            use base64::Engine;

            let credentials = format!("{}:{}", user, password);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            let mut auth_value = HeaderValue::from_str(&format!("Basic {}", encoded))
                .map_err(|e| SchemaRegistryError::Config(e.to_string()))?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
        }
        builder = builder.default_headers(headers);

        if let Some(ca) = &config.ssl_ca_location {
            let pem = read_pem(ca)?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| SchemaRegistryError::Config(format!("ssl.ca.location: {}", e)))?;
            builder = builder.add_root_certificate(certificate);
        }

        if let Some(cert) = &config.ssl_certificate_location {
            let mut pem = read_pem(cert)?;
            if let Some(key) = &config.ssl_key_location {
                pem.push(b'\n');
                pem.extend(read_pem(key)?);
            }
            let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
                SchemaRegistryError::Config(format!("ssl.certificate.location: {}", e))
            })?;
            builder = builder.identity(identity);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
        })
    }

    fn url_for(&self, request: &RestRequest) -> SchemaRegistryResult<reqwest::Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SchemaRegistryError::Config(format!("Invalid url {}", self.base_url))
            })?;
            segments.pop_if_empty();
            segments.extend(request.path.iter());
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

impl RestService for HttpTransport {
    fn send(&self, request: &RestRequest) -> SchemaRegistryResult<RestResponse> {
        let url = self.url_for(request)?;

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        };

        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, CONTENT_TYPE_HEADER)
                .body(serde_json::to_vec(body).map_err(|e| {
                    SchemaRegistryError::Transport(format!("failed to encode request: {}", e))
                })?);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        tracing::trace!(method = %request.method, status, "Schema Registry response");

        parse_response(status, &body).map(|body| RestResponse { status, body })
    }
}

fn read_pem(path: &std::path::Path) -> SchemaRegistryResult<Vec<u8>> {
    std::fs::read(path)
        .map_err(|e| SchemaRegistryError::Config(format!("{}: {}", path.display(), e)))
}

/// Map a raw registry answer to its JSON body or a [`SchemaRegistryError`]
pub fn parse_response(status: u16, body: &str) -> SchemaRegistryResult<serde_json::Value> {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error_code: i32,
        message: Option<String>,
    }

    if (200..=299).contains(&status) {
        return serde_json::from_str(body).map_err(|_| SchemaRegistryError::unknown(status, body));
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => Err(SchemaRegistryError::Registry {
            status,
            error_code: err.error_code,
            message: err.message.unwrap_or_default(),
        }),
        Err(_) => Err(SchemaRegistryError::unknown(status, body)),
    }
}

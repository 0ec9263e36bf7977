//! HTTP execution and response classification.
//!
//! [`HttpClient`] performs one exchange at a time: it obtains the current
//! credential from the [`TokenProvider`], attaches it as a bearer header,
//! executes the request over a [`Transport`], and classifies the outcome
//! into the [`ApiError`] taxonomy. It never retries; retry policy belongs
//! to the caller.
//!
//! The transport is a trait seam so classification can be exercised without
//! a network. Production use goes through [`ReqwestTransport`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::auth::TokenProvider;
use crate::config::{ClientConfig, ConfigError};
use crate::error::ApiError;

pub use reqwest::Method;

/// A single logical request against the marketplace API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
  pub method: Method,
  /// Path relative to the configured base URL, e.g. `/properties`.
  pub path: String,
  /// Query parameters appended to the URL.
  pub query: Vec<(String, String)>,
  /// JSON body, for methods that carry one.
  pub body: Option<Value>,
}

impl ApiRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn post(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::POST, path).with_body(body)
  }

  pub fn put(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::PUT, path).with_body(body)
  }

  pub fn patch(path: impl Into<String>, body: Value) -> Self {
    Self::new(Method::PATCH, path).with_body(body)
  }

  pub fn delete(path: impl Into<String>) -> Self {
    Self::new(Method::DELETE, path)
  }

  pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((name.into(), value.into()));
    self
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }
}

/// A fully resolved request handed to the transport: absolute URL plus the
/// bearer token already chosen for this exchange.
#[derive(Debug, Clone)]
pub struct RawRequest {
  pub method: Method,
  pub url: Url,
  pub bearer: String,
  pub body: Option<Value>,
}

/// An HTTP response before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
  pub status: u16,
  pub body: String,
}

/// Failure below the HTTP layer: the exchange never produced a status code.
#[derive(Debug, Clone)]
pub enum TransportError {
  /// The bounded request timeout elapsed.
  Timeout,
  /// Connection or protocol failure.
  Network(String),
}

/// One HTTP round-trip. Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn execute(&self, request: RawRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest` client.
pub struct ReqwestTransport {
  client: reqwest::Client,
}

impl ReqwestTransport {
  /// Build a transport with the given request timeout.
  pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| ConfigError::Transport(e.to_string()))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn execute(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
    let mut builder = self
      .client
      .request(request.method, request.url)
      .bearer_auth(&request.bearer);

    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder.send().await.map_err(|e| {
      if e.is_timeout() {
        TransportError::Timeout
      } else {
        TransportError::Network(e.to_string())
      }
    })?;

    let status = response.status().as_u16();
    let body = response
      .text()
      .await
      .map_err(|e| TransportError::Network(e.to_string()))?;

    Ok(RawResponse { status, body })
  }
}

/// Authenticated request execution against the marketplace API.
///
/// Cloning is cheap; clones share the transport and token provider.
#[derive(Clone)]
pub struct HttpClient {
  transport: Arc<dyn Transport>,
  tokens: TokenProvider,
  base_url: Url,
}

impl HttpClient {
  /// Build a client over the production transport.
  pub fn new(config: &ClientConfig, tokens: TokenProvider) -> Result<Self, ConfigError> {
    let base_url = parse_base_url(&config.base_url)?;
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout())?);

    Ok(Self {
      transport,
      tokens,
      base_url,
    })
  }

  /// Build a client over a custom transport. Used by tests and by embedders
  /// that bring their own HTTP stack.
  pub fn with_transport(
    transport: Arc<dyn Transport>,
    tokens: TokenProvider,
    base_url: Url,
  ) -> Self {
    Self {
      transport,
      tokens,
      base_url,
    }
  }

  /// The token provider this client attaches credentials from.
  pub fn tokens(&self) -> &TokenProvider {
    &self.tokens
  }

  /// Execute one request and classify the response.
  ///
  /// 2xx returns the parsed JSON body (`null` for an empty body). 401/403
  /// invalidates the token provider and fails with [`ApiError::AuthExpired`].
  /// Other 4xx fail with [`ApiError::Client`]; 5xx, timeouts and network
  /// failures with [`ApiError::ServerUnavailable`].
  pub async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
    let credential = self.tokens.get_credential().await?;

    let mut url = self
      .base_url
      .join(request.path.trim_start_matches('/'))
      .map_err(|e| ApiError::InvalidRequest {
        reason: format!("cannot resolve path {}: {}", request.path, e),
      })?;
    for (name, value) in &request.query {
      url.query_pairs_mut().append_pair(name, value);
    }

    debug!(method = %request.method, %url, "sending request");

    let raw = self
      .transport
      .execute(RawRequest {
        method: request.method.clone(),
        url,
        bearer: credential.bearer,
        body: request.body,
      })
      .await;

    match raw {
      Ok(response) => self.classify(response),
      Err(TransportError::Timeout) => Err(ApiError::ServerUnavailable {
        reason: "request timed out".to_string(),
      }),
      Err(TransportError::Network(reason)) => Err(ApiError::ServerUnavailable { reason }),
    }
  }

  fn classify(&self, response: RawResponse) -> Result<Value, ApiError> {
    match response.status {
      200..=299 => {
        if response.body.trim().is_empty() {
          return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::Decode {
          reason: e.to_string(),
        })
      }
      401 | 403 => {
        warn!(status = response.status, "credential rejected, invalidating");
        self.tokens.invalidate();
        Err(ApiError::AuthExpired)
      }
      status @ 400..=499 => Err(ApiError::Client {
        status,
        body: response.body,
      }),
      status => Err(ApiError::ServerUnavailable {
        reason: format!("server responded with status {}", status),
      }),
    }
  }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ConfigError> {
  // A base URL without a trailing slash would silently drop its last path
  // segment on join.
  let normalized = if base_url.ends_with('/') {
    base_url.to_string()
  } else {
    format!("{}/", base_url)
  };

  Url::parse(&normalized).map_err(|e| ConfigError::InvalidBaseUrl {
    url: base_url.to_string(),
    reason: e.to_string(),
  })
}

//! State-changing operations and the cache consistency that follows them.
//!
//! A [`MutationRequest`] names the endpoint, the payload, and the cache
//! entries that are stale once the server confirms the change. The
//! [`MutationRunner`] executes the call and invalidates those entries
//! before handing the response back, so a read issued after a successful
//! mutation never sees pre-mutation data.

use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::cache::{CacheKey, ResourceCache};
use crate::error::ApiError;
use crate::http::{ApiRequest, HttpClient, Method};

/// Cache entries a mutation renders stale.
#[derive(Debug, Clone)]
pub enum InvalidationTarget {
  /// One exact key.
  Key(CacheKey),
  /// Every key for a resource, whatever its parameters.
  Resource(String),
}

impl From<CacheKey> for InvalidationTarget {
  fn from(key: CacheKey) -> Self {
    InvalidationTarget::Key(key)
  }
}

impl From<&str> for InvalidationTarget {
  fn from(resource: &str) -> Self {
    InvalidationTarget::Resource(resource.to_string())
  }
}

/// One state-changing call and its declared cache dependencies.
#[derive(Debug, Clone)]
pub struct MutationRequest {
  pub method: Method,
  pub path: String,
  pub body: Option<Value>,
  pub invalidates: Vec<InvalidationTarget>,
}

impl MutationRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      body: None,
      invalidates: Vec::new(),
    }
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

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  /// Declare a cache entry (or whole resource) stale on success.
  pub fn invalidating(mut self, target: impl Into<InvalidationTarget>) -> Self {
    self.invalidates.push(target.into());
    self
  }
}

type SuccessListener = Box<dyn Fn(&MutationRequest, &Value) + Send + Sync>;
type FailureListener = Box<dyn Fn(&MutationRequest, &ApiError) + Send + Sync>;

struct RunnerInner {
  http: HttpClient,
  cache: ResourceCache,
  on_success: Mutex<Vec<SuccessListener>>,
  on_failure: Mutex<Vec<FailureListener>>,
}

/// Executes mutations and keeps the cache consistent afterward.
///
/// Mutations are independent of each other: the runner does not queue or
/// serialize them. Cloning is cheap; clones share listeners.
#[derive(Clone)]
pub struct MutationRunner {
  inner: Arc<RunnerInner>,
}

impl MutationRunner {
  pub fn new(http: HttpClient, cache: ResourceCache) -> Self {
    Self {
      inner: Arc::new(RunnerInner {
        http,
        cache,
        on_success: Mutex::new(Vec::new()),
        on_failure: Mutex::new(Vec::new()),
      }),
    }
  }

  /// Register a callback fired after a mutation succeeds and its
  /// invalidations have been applied. UI concerns (toasts, navigation)
  /// belong here, not inside the data layer.
  pub fn on_success(&self, listener: impl Fn(&MutationRequest, &Value) + Send + Sync + 'static) {
    lock(&self.inner.on_success).push(Box::new(listener));
  }

  /// Register a callback fired when a mutation fails.
  pub fn on_failure(&self, listener: impl Fn(&MutationRequest, &ApiError) + Send + Sync + 'static) {
    lock(&self.inner.on_failure).push(Box::new(listener));
  }

  /// Execute the mutation.
  ///
  /// On success every declared target is invalidated before this returns,
  /// so a read issued afterwards refetches. On failure the cache is left
  /// untouched and the error is surfaced to the caller; there is no partial
  /// invalidation.
  pub async fn run(&self, request: MutationRequest) -> Result<Value, ApiError> {
    let call = ApiRequest {
      method: request.method.clone(),
      path: request.path.clone(),
      query: Vec::new(),
      body: request.body.clone(),
    };

    match self.inner.http.send(call).await {
      Ok(payload) => {
        for target in &request.invalidates {
          match target {
            InvalidationTarget::Key(key) => self.inner.cache.invalidate(key),
            InvalidationTarget::Resource(resource) => {
              self.inner.cache.invalidate_resource(resource)
            }
          }
        }
        debug!(
          path = %request.path,
          targets = request.invalidates.len(),
          "mutation succeeded, cache invalidated"
        );

        for listener in lock(&self.inner.on_success).iter() {
          listener(&request, &payload);
        }
        Ok(payload)
      }
      Err(error) => {
        for listener in lock(&self.inner.on_failure).iter() {
          listener(&request, &error);
        }
        Err(error)
      }
    }
  }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::{IdentityToken, IdentityTokenSource, TokenProvider};
  use crate::http::{RawRequest, RawResponse, Transport, TransportError};
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;
  use url::Url;

  struct TestSource;

  #[async_trait]
  impl IdentityTokenSource for TestSource {
    async fn current_identity_token(&self) -> Result<IdentityToken, ApiError> {
      Ok(IdentityToken {
        token: "test-bearer".to_string(),
        identity: "agent@example.com".to_string(),
        expires_in: Duration::from_secs(3600),
      })
    }
  }

  struct CannedTransport {
    status: u16,
    body: String,
  }

  #[async_trait]
  impl Transport for CannedTransport {
    async fn execute(&self, _request: RawRequest) -> Result<RawResponse, TransportError> {
      Ok(RawResponse {
        status: self.status,
        body: self.body.clone(),
      })
    }
  }

  fn runner_over(status: u16, body: &str) -> (MutationRunner, ResourceCache) {
    let tokens = TokenProvider::new(Arc::new(TestSource));
    let http = HttpClient::with_transport(
      Arc::new(CannedTransport {
        status,
        body: body.to_string(),
      }),
      tokens,
      Url::parse("https://api.homenest.app/").unwrap(),
    );
    let cache = ResourceCache::new();
    (MutationRunner::new(http, cache.clone()), cache)
  }

  async fn prime(cache: &ResourceCache, key: &CacheKey, fetches: &Arc<AtomicU32>, value: Value) {
    let fetches = fetches.clone();
    cache
      .read(key, Duration::from_secs(3600), move || async move {
        fetches.fetch_add(1, Ordering::SeqCst);
        Ok(value)
      })
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_success_invalidates_declared_keys() {
    let (runner, cache) = runner_over(200, r#"{"modifiedCount": 1}"#);
    let key = CacheKey::new("properties").with_param("agentId", "A1");
    let fetches = Arc::new(AtomicU32::new(0));

    prime(&cache, &key, &fetches, json!("pre-mutation")).await;

    let payload = runner
      .run(
        MutationRequest::patch("/properties/A1/verify", json!({"status": "verified"}))
          .invalidating(key.clone()),
      )
      .await
      .unwrap();
    assert_eq!(payload, json!({"modifiedCount": 1}));

    // The declared key is stale: the next read refetches.
    prime(&cache, &key, &fetches, json!("post-mutation")).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_success_invalidates_whole_resource_targets() {
    let (runner, cache) = runner_over(200, r#"{"acknowledged": true}"#);
    let a = CacheKey::new("offers").with_param("buyerEmail", "b1@x.y");
    let b = CacheKey::new("offers").with_param("agentEmail", "a1@x.y");
    let untouched = CacheKey::new("reviews").with_param("propertyId", "p1");
    let fetches = Arc::new(AtomicU32::new(0));

    for key in [&a, &b, &untouched] {
      prime(&cache, key, &fetches, json!("v")).await;
    }

    runner
      .run(
        MutationRequest::patch("/offers/o1/accept", json!({"status": "accepted"}))
          .invalidating("offers"),
      )
      .await
      .unwrap();

    for key in [&a, &b, &untouched] {
      prime(&cache, key, &fetches, json!("v")).await;
    }

    // Both offer queries refetched; the review query was served from cache.
    assert_eq!(fetches.load(Ordering::SeqCst), 5);
  }

  #[tokio::test]
  async fn test_failure_leaves_cache_untouched() {
    let (runner, cache) = runner_over(500, "internal error");
    let key = CacheKey::new("wishlist").with_param("userEmail", "u@x.y");
    let fetches = Arc::new(AtomicU32::new(0));

    prime(&cache, &key, &fetches, json!("cached")).await;

    let error = runner
      .run(
        MutationRequest::post("/wishlist", json!({"propertyId": "p1"})).invalidating(key.clone()),
      )
      .await
      .unwrap_err();
    assert!(error.is_retryable());

    // Still served from cache, no refetch.
    prime(&cache, &key, &fetches, json!("unused")).await;
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_observers_fire_on_success_and_failure() {
    let successes = Arc::new(AtomicU32::new(0));
    let failures = Arc::new(AtomicU32::new(0));

    let (runner, _cache) = runner_over(200, r#"{"ok": true}"#);
    {
      let successes = successes.clone();
      runner.on_success(move |_, _| {
        successes.fetch_add(1, Ordering::SeqCst);
      });
      let failures = failures.clone();
      runner.on_failure(move |_, _| {
        failures.fetch_add(1, Ordering::SeqCst);
      });
    }

    runner
      .run(MutationRequest::post("/reviews", json!({"text": "great house"})))
      .await
      .unwrap();
    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(failures.load(Ordering::SeqCst), 0);

    let (failing, _cache) = runner_over(422, "missing field");
    {
      let failures = failures.clone();
      failing.on_failure(move |_, error| {
        assert!(matches!(error, ApiError::Client { status: 422, .. }));
        failures.fetch_add(1, Ordering::SeqCst);
      });
    }
    failing
      .run(MutationRequest::post("/reviews", json!({})))
      .await
      .unwrap_err();
    assert_eq!(failures.load(Ordering::SeqCst), 1);
  }
}

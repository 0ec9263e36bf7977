//! Credential management for the signed-in identity.
//!
//! [`TokenProvider`] owns the single active [`Credential`] for the session.
//! Reads go through [`TokenProvider::get_credential`], which refreshes an
//! expired token before returning; concurrent callers during a refresh all
//! await the same in-flight mint instead of racing the identity provider.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ApiError;

/// A token minted by the external identity provider, together with the
/// identity it was issued for and how long it stays valid.
#[derive(Debug, Clone)]
pub struct IdentityToken {
  /// Opaque bearer token value.
  pub token: String,
  /// Identity (user id or email) the token belongs to.
  pub identity: String,
  /// Validity window, measured from the moment the token was minted.
  pub expires_in: Duration,
}

/// External auth collaborator that can mint a token for whoever is
/// currently signed in.
///
/// Implementations return [`ApiError::Unauthenticated`] when no identity is
/// signed in; the provider passes that through untouched.
#[async_trait]
pub trait IdentityTokenSource: Send + Sync {
  async fn current_identity_token(&self) -> Result<IdentityToken, ApiError>;
}

/// The active bearer credential for the signed-in identity.
#[derive(Debug, Clone)]
pub struct Credential {
  /// Bearer token attached to outbound requests.
  pub bearer: String,
  /// Identity the credential was issued for.
  pub identity: String,
  expires_at: Instant,
}

impl Credential {
  /// Whether the credential's validity window has not yet elapsed.
  pub fn is_valid(&self) -> bool {
    Instant::now() < self.expires_at
  }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, ApiError>>>;

#[derive(Default)]
struct TokenState {
  credential: Option<Credential>,
  refresh: Option<RefreshFuture>,
  /// Bumped on every invalidation. A refresh that started before a sign-out
  /// carries the old generation and its result is discarded, so a stale mint
  /// can never resurrect a credential for an identity that signed out.
  generation: u64,
}

struct TokenInner {
  source: Arc<dyn IdentityTokenSource>,
  state: Mutex<TokenState>,
  listeners: Mutex<Vec<Box<dyn Fn() + Send + Sync>>>,
}

/// Sole owner of the session credential.
///
/// Cloning is cheap; all clones share the same credential and refresh state.
#[derive(Clone)]
pub struct TokenProvider {
  inner: Arc<TokenInner>,
}

impl TokenProvider {
  /// Create a provider backed by the given identity source.
  pub fn new(source: Arc<dyn IdentityTokenSource>) -> Self {
    Self {
      inner: Arc::new(TokenInner {
        source,
        state: Mutex::new(TokenState::default()),
        listeners: Mutex::new(Vec::new()),
      }),
    }
  }

  /// Return a valid credential for the signed-in identity, refreshing first
  /// if the stored one has expired.
  ///
  /// Concurrent callers during a refresh share the single in-flight result,
  /// success or error; a second mint is never started while one is running.
  pub async fn get_credential(&self) -> Result<Credential, ApiError> {
    let refresh = {
      let mut state = lock(&self.inner.state);

      if let Some(credential) = &state.credential {
        if credential.is_valid() {
          return Ok(credential.clone());
        }
      }

      if let Some(refresh) = &state.refresh {
        refresh.clone()
      } else {
        debug!("credential missing or expired, refreshing");
        let refresh = self.start_refresh(state.generation);
        state.refresh = Some(refresh.clone());
        refresh
      }
    };

    refresh.await
  }

  fn start_refresh(&self, generation: u64) -> RefreshFuture {
    let inner = Arc::clone(&self.inner);

    async move {
      let minted = inner.source.current_identity_token().await;
      let mut state = lock(&inner.state);

      // A sign-out happened mid-refresh; the minted token belongs to an
      // identity that is no longer current.
      if state.generation != generation {
        return Err(ApiError::Unauthenticated);
      }

      state.refresh = None;
      match minted {
        Ok(token) => {
          let credential = Credential {
            bearer: token.token,
            identity: token.identity,
            expires_at: Instant::now() + token.expires_in,
          };
          debug!(identity = %credential.identity, "credential refreshed");
          state.credential = Some(credential.clone());
          Ok(credential)
        }
        Err(e) => Err(e),
      }
    }
    .boxed()
    .shared()
  }

  /// Clear the stored credential and abandon any in-flight refresh.
  ///
  /// Called on sign-out, or by the HTTP layer when the server rejects the
  /// credential. Idempotent: listeners fire only when something was cleared.
  pub fn invalidate(&self) {
    let had_credential = {
      let mut state = lock(&self.inner.state);
      let had = state.credential.is_some() || state.refresh.is_some();
      state.credential = None;
      state.refresh = None;
      state.generation += 1;
      had
    };

    if had_credential {
      debug!("credential invalidated");
      for listener in lock(&self.inner.listeners).iter() {
        listener();
      }
    }
  }

  /// Register a callback fired when the credential is invalidated.
  ///
  /// This is where a session-management layer hooks its sign-out flow;
  /// the data layer itself performs no redirects.
  pub fn on_invalidated(&self, listener: impl Fn() + Send + Sync + 'static) {
    lock(&self.inner.listeners).push(Box::new(listener));
  }

  /// Identity of the currently stored credential, if any.
  pub fn current_identity(&self) -> Option<String> {
    lock(&self.inner.state)
      .credential
      .as_ref()
      .map(|c| c.identity.clone())
  }
}

impl std::fmt::Debug for TokenProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = lock(&self.inner.state);
    f.debug_struct("TokenProvider")
      .field("identity", &state.credential.as_ref().map(|c| &c.identity))
      .field("refreshing", &state.refresh.is_some())
      .finish_non_exhaustive()
  }
}

// A poisoned lock only means another task panicked mid-update of plain data;
// recover the guard rather than cascading the panic.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Error taxonomy for the data layer.
//!
//! Every failure surfaced by this crate maps to one of these variants, so
//! callers can decide between redirecting to sign-in (`Unauthenticated`,
//! `AuthExpired`), showing the server's message (`Client`), or retrying with
//! backoff (`ServerUnavailable`). The crate itself never retries.

use thiserror::Error;

/// Errors produced by the HTTP, auth, cache and mutation layers.
///
/// The type is `Clone` because coalesced readers and de-duplicated token
/// refreshes share a single outcome: every waiter receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// No identity is signed in. Surfaced untouched so the UI can redirect
  /// to sign-in.
  #[error("no identity is signed in")]
  Unauthenticated,

  /// The server rejected the current credential (401/403). The token
  /// provider has already been invalidated when this is returned.
  #[error("credential rejected by the server")]
  AuthExpired,

  /// The server refused the request for a business reason (4xx other than
  /// auth). The body is passed through verbatim for display.
  #[error("request failed with status {status}")]
  Client { status: u16, body: String },

  /// Network failure, timeout, or 5xx. Transient; callers may retry with
  /// backoff.
  #[error("service unavailable: {reason}")]
  ServerUnavailable { reason: String },

  /// The request could not be constructed (malformed path or payload).
  #[error("invalid request: {reason}")]
  InvalidRequest { reason: String },

  /// A 2xx response body did not decode into the expected shape.
  #[error("failed to decode response: {reason}")]
  Decode { reason: String },
}

impl ApiError {
  /// Whether the caller may reasonably retry the operation.
  ///
  /// Only transport-level failures are transient; auth and client errors
  /// will not resolve by retrying.
  pub fn is_retryable(&self) -> bool {
    matches!(self, ApiError::ServerUnavailable { .. })
  }

  /// Whether the failure should send the user back through sign-in.
  pub fn is_auth_failure(&self) -> bool {
    matches!(self, ApiError::Unauthenticated | ApiError::AuthExpired)
  }
}

//! Client-side data layer for the HomeNest real-estate marketplace.
//!
//! The frontend never talks to the REST API directly; it goes through four
//! cooperating pieces, leaves first:
//!
//! - [`TokenProvider`] — owns the bearer credential for the signed-in
//!   identity, refreshing it on expiry with de-duplicated refreshes.
//! - [`HttpClient`] — one authenticated exchange at a time, classified into
//!   the [`ApiError`] taxonomy. No retries.
//! - [`ResourceCache`] — keyed, TTL-bounded read-through cache that
//!   coalesces concurrent identical fetches into a single network call.
//! - [`MutationRunner`] — executes writes and invalidates the cached
//!   queries each mutation declares, before the caller sees the result.
//!
//! [`MarketClient`] wires them together behind typed calls for properties,
//! wishlists, offers, reviews and user management.
//!
//! # Example
//!
//! ```ignore
//! use homenest_client::{ClientConfig, MarketClient};
//!
//! let config = ClientConfig::load(None)?;
//! let client = MarketClient::new(&config, auth_provider)?;
//!
//! // Served from cache on repeat calls within the TTL.
//! let listings = client.verified_properties().await?;
//!
//! // Invalidates the wishlist query; the next read refetches.
//! client.add_to_wishlist(&entry).await?;
//! ```

pub mod api;
mod auth;
mod cache;
mod config;
mod error;
mod http;
mod mutation;

pub use api::client::MarketClient;
pub use auth::{Credential, IdentityToken, IdentityTokenSource, TokenProvider};
pub use cache::{CacheKey, ResourceCache};
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use http::{
  ApiRequest, HttpClient, Method, RawRequest, RawResponse, ReqwestTransport, Transport,
  TransportError,
};
pub use mutation::{InvalidationTarget, MutationRequest, MutationRunner};

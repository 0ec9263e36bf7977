//! In-memory read-through cache for API queries.
//!
//! This module provides the data-synchronization core of the client:
//! - Structured, order-independent [`CacheKey`]s per query
//! - TTL-bounded freshness with read-through fetching
//! - Coalescing of concurrent identical fetches into one network call
//! - Explicit invalidation, by key, resource, or predicate

mod key;
mod layer;

pub use key::CacheKey;
pub use layer::ResourceCache;

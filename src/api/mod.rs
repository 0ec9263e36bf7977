//! Typed surface of the HomeNest marketplace API.
//!
//! `types` holds the wire shapes, `keys` the fully-parameterized cache keys
//! per query, and `client` the facade that wires auth, HTTP, cache and
//! mutations together.

pub mod client;
pub mod keys;
pub mod types;

pub use client::MarketClient;

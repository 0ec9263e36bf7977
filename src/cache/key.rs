//! Structured identifiers for cached queries.

use std::collections::BTreeMap;
use std::fmt;

/// Identifies one cached query: a resource name plus its parameters.
///
/// Two keys are equal iff the resource name and every parameter name/value
/// pair match; parameter insertion order is irrelevant. Every parameter that
/// distinguishes a query must be part of its key, otherwise distinct queries
/// would share a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
  resource: String,
  params: BTreeMap<String, String>,
}

impl CacheKey {
  /// Create a key for a resource with no parameters.
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      params: BTreeMap::new(),
    }
  }

  /// Add (or replace) a parameter.
  pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    self.params.insert(name.into(), value.to_string());
    self
  }

  /// The resource name, e.g. `"properties"`.
  pub fn resource(&self) -> &str {
    &self.resource
  }

  /// Look up a parameter value.
  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.resource)?;
    if self.params.is_empty() {
      return Ok(());
    }
    write!(f, "{{")?;
    for (i, (name, value)) in self.params.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}={}", name, value)?;
    }
    write!(f, "}}")
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::hash_map::DefaultHasher;
  use std::hash::{Hash, Hasher};

  fn hash_of(key: &CacheKey) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
  }

  #[test]
  fn test_equality_is_param_order_independent() {
    let a = CacheKey::new("properties")
      .with_param("agentId", "u1")
      .with_param("status", "verified");
    let b = CacheKey::new("properties")
      .with_param("status", "verified")
      .with_param("agentId", "u1");

    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
  }

  #[test]
  fn test_distinct_params_are_distinct_keys() {
    let a = CacheKey::new("properties").with_param("agentId", "u1");
    let b = CacheKey::new("properties").with_param("agentId", "u2");
    let c = CacheKey::new("properties");

    assert_ne!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn test_same_params_different_resource() {
    let a = CacheKey::new("offers").with_param("email", "x@y.z");
    let b = CacheKey::new("reviews").with_param("email", "x@y.z");

    assert_ne!(a, b);
  }

  #[test]
  fn test_display_is_stable() {
    let key = CacheKey::new("properties")
      .with_param("status", "verified")
      .with_param("agentId", "u1");

    assert_eq!(key.to_string(), "properties{agentId=u1, status=verified}");
    assert_eq!(CacheKey::new("users").to_string(), "users");
  }

  #[test]
  fn test_param_lookup() {
    let key = CacheKey::new("wishlist").with_param("userEmail", "a@b.c");

    assert_eq!(key.resource(), "wishlist");
    assert_eq!(key.param("userEmail"), Some("a@b.c"));
    assert_eq!(key.param("missing"), None);
  }
}

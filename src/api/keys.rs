//! Cache keys for marketplace queries.
//!
//! Every parameter that distinguishes a query is part of its key. Queries
//! over the same resource with different filters must never share a slot,
//! so each constructor spells out all of its parameters.

use crate::cache::CacheKey;

/// Buyer-facing listings: verified only.
pub fn verified_properties() -> CacheKey {
  CacheKey::new("properties").with_param("status", "verified")
}

/// Listings advertised on the homepage.
pub fn advertised_properties() -> CacheKey {
  CacheKey::new("properties").with_param("advertised", "true")
}

/// The latest `limit` verified listings.
pub fn latest_properties(limit: usize) -> CacheKey {
  CacheKey::new("properties")
    .with_param("status", "verified")
    .with_param("sort", "latest")
    .with_param("limit", limit)
}

/// Everything an agent has listed, whatever the verification status.
pub fn agent_properties(agent_email: &str) -> CacheKey {
  CacheKey::new("properties").with_param("agentEmail", agent_email)
}

/// Admin view: every listing in the system.
pub fn all_properties() -> CacheKey {
  CacheKey::new("properties").with_param("scope", "all")
}

/// One listing by id.
pub fn property_detail(property_id: &str) -> CacheKey {
  CacheKey::new("property").with_param("id", property_id)
}

/// A user's wishlist.
pub fn wishlist(user_email: &str) -> CacheKey {
  CacheKey::new("wishlist").with_param("userEmail", user_email)
}

/// Offers a buyer has made.
pub fn buyer_offers(buyer_email: &str) -> CacheKey {
  CacheKey::new("offers").with_param("buyerEmail", buyer_email)
}

/// Offers received on an agent's listings.
pub fn agent_offers(agent_email: &str) -> CacheKey {
  CacheKey::new("offers").with_param("agentEmail", agent_email)
}

/// Reviews on one property.
pub fn property_reviews(property_id: &str) -> CacheKey {
  CacheKey::new("reviews").with_param("propertyId", property_id)
}

/// Reviews a user has written.
pub fn user_reviews(user_email: &str) -> CacheKey {
  CacheKey::new("reviews").with_param("reviewerEmail", user_email)
}

/// The latest `limit` reviews, site-wide.
pub fn latest_reviews(limit: usize) -> CacheKey {
  CacheKey::new("reviews")
    .with_param("sort", "latest")
    .with_param("limit", limit)
}

/// Admin view: every account.
pub fn users() -> CacheKey {
  CacheKey::new("users")
}

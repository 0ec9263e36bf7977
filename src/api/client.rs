//! The marketplace facade: every query and mutation the frontend needs,
//! wired through the token provider, HTTP client, cache and mutation runner.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::api::keys;
use crate::api::types::{
  Offer, OfferDraft, Property, PropertyDraft, Review, ReviewDraft, Role, User, WishlistDraft,
  WishlistEntry,
};
use crate::auth::{IdentityTokenSource, TokenProvider};
use crate::cache::{CacheKey, ResourceCache};
use crate::config::{ClientConfig, ConfigError};
use crate::error::ApiError;
use crate::http::{parse_base_url, ApiRequest, HttpClient, Transport};
use crate::mutation::{MutationRequest, MutationRunner};

/// Typed client for the HomeNest marketplace API.
///
/// Reads go through the [`ResourceCache`] with the configured default TTL;
/// mutations go through the [`MutationRunner`] and declare exactly which
/// cached queries they make stale. Cloning is cheap; clones share one
/// session (credential, cache, listeners).
#[derive(Clone)]
pub struct MarketClient {
  http: HttpClient,
  cache: ResourceCache,
  mutations: MutationRunner,
  default_ttl: Duration,
}

impl MarketClient {
  /// Build a client over the production HTTP transport.
  pub fn new(
    config: &ClientConfig,
    source: Arc<dyn IdentityTokenSource>,
  ) -> Result<Self, ConfigError> {
    let tokens = TokenProvider::new(source);
    let http = HttpClient::new(config, tokens)?;
    Ok(Self::assemble(http, config.default_ttl()))
  }

  /// Build a client over a custom transport. Used by tests and by embedders
  /// that bring their own HTTP stack.
  pub fn with_transport(
    config: &ClientConfig,
    source: Arc<dyn IdentityTokenSource>,
    transport: Arc<dyn Transport>,
  ) -> Result<Self, ConfigError> {
    let tokens = TokenProvider::new(source);
    let base_url = parse_base_url(&config.base_url)?;
    let http = HttpClient::with_transport(transport, tokens, base_url);
    Ok(Self::assemble(http, config.default_ttl()))
  }

  fn assemble(http: HttpClient, default_ttl: Duration) -> Self {
    let cache = ResourceCache::new();
    let mutations = MutationRunner::new(http.clone(), cache.clone());
    Self {
      http,
      cache,
      mutations,
      default_ttl,
    }
  }

  /// The session's token provider, for sign-out hooks and invalidation.
  pub fn tokens(&self) -> &TokenProvider {
    self.http.tokens()
  }

  /// The session's cache, for manual invalidation beyond what mutations
  /// declare.
  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  /// The mutation runner, for registering success/failure observers.
  pub fn mutations(&self) -> &MutationRunner {
    &self.mutations
  }

  async fn read_as<T: DeserializeOwned>(
    &self,
    key: CacheKey,
    request: ApiRequest,
  ) -> Result<T, ApiError> {
    let http = self.http.clone();
    let value = self
      .cache
      .read(&key, self.default_ttl, move || async move {
        http.send(request).await
      })
      .await?;

    serde_json::from_value(value).map_err(|e| ApiError::Decode {
      reason: e.to_string(),
    })
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  /// Buyer-facing listings: verified only.
  pub async fn verified_properties(&self) -> Result<Vec<Property>, ApiError> {
    self
      .read_as(
        keys::verified_properties(),
        ApiRequest::get("/properties").with_query("status", "verified"),
      )
      .await
  }

  /// Listings advertised on the homepage.
  pub async fn advertised_properties(&self) -> Result<Vec<Property>, ApiError> {
    self
      .read_as(
        keys::advertised_properties(),
        ApiRequest::get("/properties").with_query("advertised", "true"),
      )
      .await
  }

  /// The latest verified listings, most recent first.
  pub async fn latest_properties(&self, limit: usize) -> Result<Vec<Property>, ApiError> {
    self
      .read_as(
        keys::latest_properties(limit),
        ApiRequest::get("/properties")
          .with_query("status", "verified")
          .with_query("sort", "latest")
          .with_query("limit", limit.to_string()),
      )
      .await
  }

  /// Everything an agent has listed, whatever the verification status.
  pub async fn agent_properties(&self, agent_email: &str) -> Result<Vec<Property>, ApiError> {
    self
      .read_as(
        keys::agent_properties(agent_email),
        ApiRequest::get("/properties").with_query("agentEmail", agent_email),
      )
      .await
  }

  /// Admin view: every listing in the system.
  pub async fn all_properties(&self) -> Result<Vec<Property>, ApiError> {
    self
      .read_as(keys::all_properties(), ApiRequest::get("/properties/all"))
      .await
  }

  /// One listing by id.
  pub async fn property(&self, property_id: &str) -> Result<Property, ApiError> {
    self
      .read_as(
        keys::property_detail(property_id),
        ApiRequest::get(format!("/properties/{}", property_id)),
      )
      .await
  }

  /// A user's wishlist.
  pub async fn wishlist(&self, user_email: &str) -> Result<Vec<WishlistEntry>, ApiError> {
    self
      .read_as(
        keys::wishlist(user_email),
        ApiRequest::get("/wishlist").with_query("userEmail", user_email),
      )
      .await
  }

  /// Offers a buyer has made.
  pub async fn buyer_offers(&self, buyer_email: &str) -> Result<Vec<Offer>, ApiError> {
    self
      .read_as(
        keys::buyer_offers(buyer_email),
        ApiRequest::get("/offers").with_query("buyerEmail", buyer_email),
      )
      .await
  }

  /// Offers received on an agent's listings.
  pub async fn agent_offers(&self, agent_email: &str) -> Result<Vec<Offer>, ApiError> {
    self
      .read_as(
        keys::agent_offers(agent_email),
        ApiRequest::get("/offers").with_query("agentEmail", agent_email),
      )
      .await
  }

  /// Reviews on one property.
  pub async fn property_reviews(&self, property_id: &str) -> Result<Vec<Review>, ApiError> {
    self
      .read_as(
        keys::property_reviews(property_id),
        ApiRequest::get("/reviews").with_query("propertyId", property_id),
      )
      .await
  }

  /// Reviews a user has written.
  pub async fn user_reviews(&self, user_email: &str) -> Result<Vec<Review>, ApiError> {
    self
      .read_as(
        keys::user_reviews(user_email),
        ApiRequest::get("/reviews").with_query("reviewerEmail", user_email),
      )
      .await
  }

  /// The latest reviews, site-wide.
  pub async fn latest_reviews(&self, limit: usize) -> Result<Vec<Review>, ApiError> {
    self
      .read_as(
        keys::latest_reviews(limit),
        ApiRequest::get("/reviews")
          .with_query("sort", "latest")
          .with_query("limit", limit.to_string()),
      )
      .await
  }

  /// Admin view: every account.
  pub async fn users(&self) -> Result<Vec<User>, ApiError> {
    self.read_as(keys::users(), ApiRequest::get("/users")).await
  }

  // ==========================================================================
  // Mutations
  //
  // Each declares the cached queries it makes stale; the runner invalidates
  // them after the server confirms. All return the server's response payload.
  // ==========================================================================

  /// Agent: list a new property.
  pub async fn add_property(&self, draft: &PropertyDraft) -> Result<Value, ApiError> {
    self
      .mutations
      .run(MutationRequest::post("/properties", to_body(draft)?).invalidating("properties"))
      .await
  }

  /// Agent: update one of their listings.
  pub async fn update_property(
    &self,
    property_id: &str,
    draft: &PropertyDraft,
  ) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::put(format!("/properties/{}", property_id), to_body(draft)?)
          .invalidating(keys::property_detail(property_id))
          .invalidating("properties"),
      )
      .await
  }

  /// Agent: withdraw one of their listings.
  pub async fn delete_property(&self, property_id: &str) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::delete(format!("/properties/{}", property_id))
          .invalidating(keys::property_detail(property_id))
          .invalidating("properties"),
      )
      .await
  }

  /// Admin: approve a pending listing.
  pub async fn verify_property(&self, property_id: &str) -> Result<Value, ApiError> {
    self.review_property(property_id, "verify").await
  }

  /// Admin: reject a pending listing.
  pub async fn reject_property(&self, property_id: &str) -> Result<Value, ApiError> {
    self.review_property(property_id, "reject").await
  }

  async fn review_property(&self, property_id: &str, action: &str) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::patch(
          format!("/properties/{}/{}", property_id, action),
          Value::Null,
        )
        .invalidating(keys::property_detail(property_id))
        .invalidating("properties"),
      )
      .await
  }

  /// Admin: feature a verified listing on the homepage.
  pub async fn advertise_property(&self, property_id: &str) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::patch(format!("/properties/{}/advertise", property_id), Value::Null)
          .invalidating(keys::property_detail(property_id))
          .invalidating("properties"),
      )
      .await
  }

  /// Save a property to the user's wishlist.
  pub async fn add_to_wishlist(&self, draft: &WishlistDraft) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::post("/wishlist", to_body(draft)?)
          .invalidating(keys::wishlist(&draft.user_email)),
      )
      .await
  }

  /// Remove an entry from the user's wishlist.
  pub async fn remove_from_wishlist(
    &self,
    entry_id: &str,
    user_email: &str,
  ) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::delete(format!("/wishlist/{}", entry_id))
          .invalidating(keys::wishlist(user_email)),
      )
      .await
  }

  /// Buyer: make an offer on a listing.
  pub async fn make_offer(&self, draft: &OfferDraft) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::post("/offers", to_body(draft)?)
          .invalidating(keys::buyer_offers(&draft.buyer_email)),
      )
      .await
  }

  /// Agent: accept an offer. The server also rejects every other pending
  /// offer on the same property, so all offer queries are invalidated.
  pub async fn accept_offer(&self, offer_id: &str) -> Result<Value, ApiError> {
    self.decide_offer(offer_id, "accept").await
  }

  /// Agent: reject an offer.
  pub async fn reject_offer(&self, offer_id: &str) -> Result<Value, ApiError> {
    self.decide_offer(offer_id, "reject").await
  }

  async fn decide_offer(&self, offer_id: &str, action: &str) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::patch(format!("/offers/{}/{}", offer_id, action), Value::Null)
          .invalidating("offers"),
      )
      .await
  }

  /// Buyer: record a completed purchase for an accepted offer.
  pub async fn mark_offer_bought(
    &self,
    offer_id: &str,
    transaction_id: &str,
  ) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::patch(
          format!("/offers/{}/bought", offer_id),
          serde_json::json!({ "transactionId": transaction_id }),
        )
        .invalidating("offers")
        .invalidating("properties"),
      )
      .await
  }

  /// Post a review on a property.
  pub async fn add_review(&self, draft: &ReviewDraft) -> Result<Value, ApiError> {
    self
      .mutations
      .run(MutationRequest::post("/reviews", to_body(draft)?).invalidating("reviews"))
      .await
  }

  /// Delete one of the user's reviews.
  pub async fn delete_review(&self, review_id: &str) -> Result<Value, ApiError> {
    self
      .mutations
      .run(MutationRequest::delete(format!("/reviews/{}", review_id)).invalidating("reviews"))
      .await
  }

  /// Admin: change an account's role.
  pub async fn set_user_role(&self, user_id: &str, role: Role) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::patch(
          format!("/users/{}/role", user_id),
          serde_json::json!({ "role": role.as_str() }),
        )
        .invalidating("users"),
      )
      .await
  }

  /// Admin: flag an agent as fraudulent. The server withdraws all of their
  /// listings, so property queries go stale too.
  pub async fn mark_fraud_agent(&self, user_id: &str) -> Result<Value, ApiError> {
    self
      .mutations
      .run(
        MutationRequest::patch(format!("/users/{}/fraud", user_id), Value::Null)
          .invalidating("users")
          .invalidating("properties"),
      )
      .await
  }
}

fn to_body<T: Serialize>(payload: &T) -> Result<Value, ApiError> {
  serde_json::to_value(payload).map_err(|e| ApiError::InvalidRequest {
    reason: e.to_string(),
  })
}

impl std::fmt::Debug for MarketClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MarketClient")
      .field("cache", &self.cache)
      .field("default_ttl", &self.default_ttl)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::IdentityToken;
  use crate::http::{RawRequest, RawResponse, TransportError};
  use async_trait::async_trait;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Mutex;

  struct TestSource;

  #[async_trait]
  impl IdentityTokenSource for TestSource {
    async fn current_identity_token(&self) -> Result<IdentityToken, ApiError> {
      Ok(IdentityToken {
        token: "test-bearer".to_string(),
        identity: "ana@homenest.app".to_string(),
        expires_in: Duration::from_secs(3600),
      })
    }
  }

  fn property_json(id: &str, status: &str) -> Value {
    json!({
      "_id": id,
      "title": "Lakeside Cottage",
      "location": "Lake Bled",
      "priceMin": 250_000,
      "priceMax": 300_000,
      "agentName": "Ana",
      "agentEmail": "ana@homenest.app",
      "verificationStatus": status
    })
  }

  /// Routes GETs on /properties to a canned listing array and everything
  /// else to a generic acknowledgement, recording each call.
  struct RoutedTransport {
    calls: Mutex<Vec<String>>,
    property_fetches: AtomicU32,
  }

  impl RoutedTransport {
    fn new() -> Arc<Self> {
      Arc::new(Self {
        calls: Mutex::new(Vec::new()),
        property_fetches: AtomicU32::new(0),
      })
    }
  }

  #[async_trait]
  impl Transport for RoutedTransport {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
      self
        .calls
        .lock()
        .unwrap()
        .push(format!("{} {}", request.method, request.url.path()));

      let body = if request.method == crate::http::Method::GET {
        let n = self.property_fetches.fetch_add(1, Ordering::SeqCst);
        let status = if n == 0 { "pending" } else { "verified" };
        json!([property_json("p1", status)]).to_string()
      } else {
        json!({"modifiedCount": 1}).to_string()
      };

      Ok(RawResponse { status: 200, body })
    }
  }

  fn client_over(transport: Arc<RoutedTransport>) -> MarketClient {
    let config = ClientConfig::new("https://api.homenest.app").with_default_ttl(
      Duration::from_secs(5),
    );
    MarketClient::with_transport(&config, Arc::new(TestSource), transport).unwrap()
  }

  #[tokio::test]
  async fn test_repeat_reads_within_ttl_hit_the_network_once() {
    let transport = RoutedTransport::new();
    let client = client_over(transport.clone());

    let first = client.agent_properties("ana@homenest.app").await.unwrap();
    let second = client.agent_properties("ana@homenest.app").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].id, "p1");
    assert_eq!(transport.property_fetches.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_mutation_then_read_observes_fresh_data() {
    let transport = RoutedTransport::new();
    let client = client_over(transport.clone());

    let before = client.agent_properties("ana@homenest.app").await.unwrap();
    assert_eq!(
      before[0].verification_status,
      crate::api::types::VerificationStatus::Pending
    );

    client.verify_property("p1").await.unwrap();

    // The approve mutation invalidated the properties queries: this read
    // refetches instead of serving the pre-mutation value.
    let after = client.agent_properties("ana@homenest.app").await.unwrap();
    assert_eq!(
      after[0].verification_status,
      crate::api::types::VerificationStatus::Verified
    );
    assert_eq!(transport.property_fetches.load(Ordering::SeqCst), 2);

    let calls = transport.calls.lock().unwrap();
    assert!(calls.contains(&"PATCH /properties/p1/verify".to_string()));
  }

  #[tokio::test]
  async fn test_distinct_queries_use_distinct_cache_slots() {
    let transport = RoutedTransport::new();
    let client = client_over(transport.clone());

    client.agent_properties("ana@homenest.app").await.unwrap();
    client.agent_properties("bor@homenest.app").await.unwrap();

    assert_eq!(transport.property_fetches.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_wishlist_mutation_only_invalidates_that_user() {
    let transport = RoutedTransport::new();
    let client = client_over(transport.clone());

    // Prime a property query; the wishlist mutation must not touch it.
    client.agent_properties("ana@homenest.app").await.unwrap();

    client
      .remove_from_wishlist("w1", "buyer@x.y")
      .await
      .unwrap();

    client.agent_properties("ana@homenest.app").await.unwrap();
    assert_eq!(transport.property_fetches.load(Ordering::SeqCst), 1);
  }
}

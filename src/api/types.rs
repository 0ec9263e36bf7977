//! Wire types for the marketplace REST API.
//!
//! The backend speaks camelCase JSON with Mongo-style `_id` identifiers;
//! the serde attributes keep the Rust side idiomatic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review workflow state of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
  /// Submitted by an agent, awaiting admin review.
  Pending,
  /// Approved by an admin; visible to buyers.
  Verified,
  /// Rejected by an admin; hidden from buyers.
  Rejected,
}

/// A property listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
  #[serde(rename = "_id")]
  pub id: String,
  pub title: String,
  pub location: String,
  #[serde(default)]
  pub image: Option<String>,
  pub price_min: i64,
  pub price_max: i64,
  pub agent_name: String,
  pub agent_email: String,
  pub verification_status: VerificationStatus,
  /// Shown on the homepage carousel when set by an admin.
  #[serde(default)]
  pub advertised: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

/// Payload for creating or updating a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDraft {
  pub title: String,
  pub location: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  pub price_min: i64,
  pub price_max: i64,
  pub agent_name: String,
  pub agent_email: String,
}

/// A property saved to a user's wishlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
  #[serde(rename = "_id")]
  pub id: String,
  pub user_email: String,
  pub property_id: String,
  pub title: String,
  pub location: String,
  #[serde(default)]
  pub image: Option<String>,
  pub price_min: i64,
  pub price_max: i64,
  pub agent_name: String,
}

/// Payload for adding a property to a wishlist.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistDraft {
  pub user_email: String,
  pub property_id: String,
  pub title: String,
  pub location: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  pub price_min: i64,
  pub price_max: i64,
  pub agent_name: String,
}

/// Lifecycle of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
  /// Awaiting the agent's decision.
  Pending,
  /// Accepted by the agent; the buyer may pay.
  Accepted,
  /// Declined by the agent.
  Rejected,
  /// Paid for; the transaction is complete.
  Bought,
}

/// A buyer's offer on a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
  #[serde(rename = "_id")]
  pub id: String,
  pub property_id: String,
  pub title: String,
  pub location: String,
  pub agent_email: String,
  pub buyer_email: String,
  pub buyer_name: String,
  pub amount: i64,
  pub status: OfferStatus,
  #[serde(default)]
  pub buying_date: Option<DateTime<Utc>>,
}

/// Payload for making an offer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDraft {
  pub property_id: String,
  pub title: String,
  pub location: String,
  pub agent_email: String,
  pub buyer_email: String,
  pub buyer_name: String,
  pub amount: i64,
}

/// A review left on a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  #[serde(rename = "_id")]
  pub id: String,
  pub property_id: String,
  pub property_title: String,
  pub reviewer_email: String,
  pub reviewer_name: String,
  pub description: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

/// Payload for posting a review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
  pub property_id: String,
  pub property_title: String,
  pub reviewer_email: String,
  pub reviewer_name: String,
  pub description: String,
}

/// Marketplace role, set by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Agent,
  Admin,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Agent => "agent",
      Role::Admin => "admin",
    }
  }
}

/// A marketplace account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  pub role: Role,
  /// Set when an admin flags the agent; their listings are withdrawn.
  #[serde(default)]
  pub fraud: bool,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_property_decodes_from_api_shape() {
    let value = json!({
      "_id": "p1",
      "title": "Lakeside Cottage",
      "location": "Lake Bled",
      "image": "https://img.homenest.app/p1.jpg",
      "priceMin": 250_000,
      "priceMax": 300_000,
      "agentName": "Ana",
      "agentEmail": "ana@homenest.app",
      "verificationStatus": "verified",
      "advertised": true
    });

    let property: Property = serde_json::from_value(value).unwrap();

    assert_eq!(property.id, "p1");
    assert_eq!(property.verification_status, VerificationStatus::Verified);
    assert!(property.advertised);
    assert_eq!(property.created_at, None);
  }

  #[test]
  fn test_property_defaults_for_missing_optionals() {
    let value = json!({
      "_id": "p2",
      "title": "City Flat",
      "location": "Ljubljana",
      "priceMin": 90_000,
      "priceMax": 120_000,
      "agentName": "Bor",
      "agentEmail": "bor@homenest.app",
      "verificationStatus": "pending"
    });

    let property: Property = serde_json::from_value(value).unwrap();

    assert_eq!(property.image, None);
    assert!(!property.advertised);
  }

  #[test]
  fn test_offer_status_round_trips_lowercase() {
    let offer = json!({
      "_id": "o1",
      "propertyId": "p1",
      "title": "Lakeside Cottage",
      "location": "Lake Bled",
      "agentEmail": "ana@homenest.app",
      "buyerEmail": "buyer@x.y",
      "buyerName": "Ben",
      "amount": 260_000,
      "status": "accepted"
    });

    let offer: Offer = serde_json::from_value(offer).unwrap();
    assert_eq!(offer.status, OfferStatus::Accepted);

    let encoded = serde_json::to_value(&offer).unwrap();
    assert_eq!(encoded["status"], json!("accepted"));
  }

  #[test]
  fn test_draft_omits_absent_image() {
    let draft = PropertyDraft {
      title: "City Flat".into(),
      location: "Ljubljana".into(),
      image: None,
      price_min: 90_000,
      price_max: 120_000,
      agent_name: "Bor".into(),
      agent_email: "bor@homenest.app".into(),
    };

    let encoded = serde_json::to_value(&draft).unwrap();
    assert!(encoded.get("image").is_none());
    assert_eq!(encoded["priceMin"], json!(90_000));
  }

  #[test]
  fn test_role_serialization() {
    assert_eq!(serde_json::to_value(Role::Agent).unwrap(), json!("agent"));
    assert_eq!(Role::Admin.as_str(), "admin");
  }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

/// A listing is surfaced with a "new" badge for this long after posting.
pub const NEW_BADGE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Gift,
    Barter,
    Cash,
    Hybrid,
}

impl ExchangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeType::Gift => "gift",
            ExchangeType::Barter => "barter",
            ExchangeType::Cash => "cash",
            ExchangeType::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gift" => Some(ExchangeType::Gift),
            "barter" => Some(ExchangeType::Barter),
            "cash" => Some(ExchangeType::Cash),
            "hybrid" => Some(ExchangeType::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Active,
    Completed,
    Cancelled,
}

impl ConversationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationStatus::Active => "active",
            ConversationStatus::Completed => "completed",
            ConversationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ConversationStatus::Active),
            "completed" => Some(ConversationStatus::Completed),
            "cancelled" => Some(ConversationStatus::Cancelled),
            _ => None,
        }
    }
}

/// Venmo/PayPal handles travel as a unit through the store boundary, never
/// flattened into the surrounding record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentHandles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venmo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paypal: Option<String>,
}

/// Full user record as held by the stores. Never serialized to API clients
/// directly; see [`UserView`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// Unique, case-sensitive lookup key. The effective identity in the
    /// fallback path; the primary store additionally keys rows by `id`.
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

/// What API clients see of a user. No hash, no lockout bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            role: u.role,
            email_verified: u.email_verified,
            created_at: u.created_at,
            last_login: u.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Credentials {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    /// Poster identity. Informal reference to `User.name`, not enforced.
    pub name: String,
    pub quantity: i32,
    pub exchange_type: ExchangeType,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barter_for: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_cash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_handles: Option<PaymentHandles>,
    pub date_posted: DateTime<Utc>,
}

impl Listing {
    /// Read-time computed badge, not stored state.
    pub fn is_new(&self, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.date_posted) < Duration::hours(NEW_BADGE_HOURS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub name: String,
    pub quantity: i32,
    pub exchange_type: ExchangeType,
    pub location: String,
    pub notes: Option<String>,
    pub barter_for: Option<String>,
    pub suggested_cash: Option<String>,
    pub payment_handles: Option<PaymentHandles>,
}

/// Listing as returned by the API: the entity plus the computed badge flag.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(flatten)]
    pub listing: Listing,
    pub is_new: bool,
}

impl ListingView {
    pub fn at(listing: Listing, now: DateTime<Utc>) -> Self {
        let is_new = listing.is_new(now);
        Self { listing, is_new }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: String,
    pub seller_id: String,
    pub status: ConversationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A conversation is uniquely identified by (listing_id, buyer_id, seller_id);
/// opening one that already exists returns the existing row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewConversation {
    pub listing_id: Uuid,
    pub buyer_id: String,
    pub seller_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: String,
    pub content: String,
    pub photo_url: Option<String>,
}

/// Entity counts for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoreStats {
    pub users: u64,
    pub listings: u64,
    pub conversations: u64,
    pub messages: u64,
}

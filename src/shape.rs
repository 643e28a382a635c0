//! Conversions between the storage shape (snake_case columns, as the primary
//! store returns rows) and the application shape (camelCase, as handlers and
//! the fallback store see records). Business logic only ever touches the
//! application shape; these conversions live at the store-adapter boundary
//! and nowhere else. The fallback store holds application-shape records
//! directly, so no normalization happens on that path by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use uuid::Uuid;

use crate::auth::Role;
use crate::models::{
    Conversation, ConversationStatus, ExchangeType, Listing, Message, PaymentHandles, User,
};

#[derive(thiserror::Error, Debug)]
pub enum ShapeError {
    #[error("unknown {field} value '{value}'")]
    UnknownVariant { field: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub email_verified: bool,
    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = ShapeError;

    fn try_from(r: UserRow) -> Result<Self, ShapeError> {
        let role = Role::parse(&r.role).ok_or_else(|| ShapeError::UnknownVariant {
            field: "role",
            value: r.role.clone(),
        })?;
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            password_hash: r.password_hash,
            role,
            email_verified: r.email_verified,
            failed_login_attempts: r.failed_login_attempts,
            locked_until: r.locked_until,
            created_at: r.created_at,
            last_login: r.last_login,
        })
    }
}

impl From<User> for UserRow {
    fn from(u: User) -> Self {
        UserRow {
            id: u.id,
            name: u.name,
            email: u.email,
            phone: u.phone,
            password_hash: u.password_hash,
            role: u.role.as_str().to_string(),
            email_verified: u.email_verified,
            failed_login_attempts: u.failed_login_attempts,
            locked_until: u.locked_until,
            created_at: u.created_at,
            last_login: u.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ListingRow {
    pub id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub exchange_type: String,
    pub location: String,
    pub notes: Option<String>,
    pub barter_for: Option<String>,
    pub suggested_cash: Option<String>,
    /// jsonb column; the nested object converts as a unit.
    pub payment_handles: Option<Json<PaymentHandles>>,
    pub date_posted: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = ShapeError;

    fn try_from(r: ListingRow) -> Result<Self, ShapeError> {
        let exchange_type =
            ExchangeType::parse(&r.exchange_type).ok_or_else(|| ShapeError::UnknownVariant {
                field: "exchange_type",
                value: r.exchange_type.clone(),
            })?;
        Ok(Listing {
            id: r.id,
            name: r.name,
            quantity: r.quantity,
            exchange_type,
            location: r.location,
            notes: r.notes,
            barter_for: r.barter_for,
            suggested_cash: r.suggested_cash,
            payment_handles: r.payment_handles.map(|j| j.0),
            date_posted: r.date_posted,
        })
    }
}

impl From<Listing> for ListingRow {
    fn from(l: Listing) -> Self {
        ListingRow {
            id: l.id,
            name: l.name,
            quantity: l.quantity,
            exchange_type: l.exchange_type.as_str().to_string(),
            location: l.location,
            notes: l.notes,
            barter_for: l.barter_for,
            suggested_cash: l.suggested_cash,
            payment_handles: l.payment_handles.map(Json),
            date_posted: l.date_posted,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub buyer_id: String,
    pub seller_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = ShapeError;

    fn try_from(r: ConversationRow) -> Result<Self, ShapeError> {
        let status =
            ConversationStatus::parse(&r.status).ok_or_else(|| ShapeError::UnknownVariant {
                field: "status",
                value: r.status.clone(),
            })?;
        Ok(Conversation {
            id: r.id,
            listing_id: r.listing_id,
            buyer_id: r.buyer_id,
            seller_id: r.seller_id,
            status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl From<Conversation> for ConversationRow {
    fn from(c: Conversation) -> Self {
        ConversationRow {
            id: c.id,
            listing_id: c.listing_id,
            buyer_id: c.buyer_id,
            seller_id: c.seller_id,
            status: c.status.as_str().to_string(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub content: String,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Message {
            id: r.id,
            conversation_id: r.conversation_id,
            sender_id: r.sender_id,
            content: r.content,
            photo_url: r.photo_url,
            created_at: r.created_at,
        }
    }
}

impl From<Message> for MessageRow {
    fn from(m: Message) -> Self {
        MessageRow {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            content: m.content,
            photo_url: m.photo_url,
            created_at: m.created_at,
        }
    }
}

/// Listing fields whose names differ between the two shapes,
/// (application, storage) pairs. Everything else is spelled identically.
const LISTING_FIELD_MAP: &[(&str, &str)] = &[
    ("exchangeType", "exchange_type"),
    ("datePosted", "date_posted"),
    ("barterFor", "barter_for"),
    ("suggestedCash", "suggested_cash"),
    ("paymentHandles", "payment_handles"),
];

/// Rename storage-shape keys to application-shape keys in a raw JSON listing.
/// Unknown keys pass through unchanged; `payment_handles` is renamed but its
/// nested value is left alone. Used when loading snapshots written by older
/// revisions that persisted records in storage shape.
pub fn listing_to_app_shape(record: Value) -> Value {
    rename_keys(record, |k| {
        LISTING_FIELD_MAP
            .iter()
            .find(|(_, storage)| *storage == k)
            .map(|(app, _)| *app)
    })
}

/// Inverse of [`listing_to_app_shape`].
pub fn listing_to_storage_shape(record: Value) -> Value {
    rename_keys(record, |k| {
        LISTING_FIELD_MAP
            .iter()
            .find(|(app, _)| *app == k)
            .map(|(_, storage)| *storage)
    })
}

fn rename_keys(record: Value, rename: impl Fn(&str) -> Option<&'static str>) -> Value {
    match record {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| match rename(&k) {
                    Some(new) => (new.to_string(), v),
                    None => (k, v),
                })
                .collect(),
        ),
        other => other,
    }
}

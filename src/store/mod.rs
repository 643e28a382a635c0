use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::*;
use crate::shape::ShapeError;

pub mod lockout;
pub mod mem;
pub mod pg;
pub mod router;

/// Failure taxonomy shared by both backends. The router falls back on
/// `SchemaMissing` and nothing else: a conflict is a legitimate rejection and
/// an `Unavailable` is a real outage that must not be masked.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("locked until {0}")]
    Locked(DateTime<Utc>),
    #[error("relation missing: {0}")]
    SchemaMissing(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<ShapeError> for StoreError {
    fn from(e: ShapeError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(e: anyhow::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find-or-create login: the first login for a name registers it.
    async fn login(&self, creds: Credentials) -> StoreResult<User>;
    async fn find_user(&self, name: &str) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Newest first.
    async fn list_listings(&self) -> StoreResult<Vec<Listing>>;
    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing>;
    async fn create_listing(&self, new: NewListing) -> StoreResult<Listing>;
    async fn delete_listing(&self, id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Idempotent on (listing_id, buyer_id, seller_id).
    async fn open_conversation(&self, new: NewConversation) -> StoreResult<Conversation>;
    /// Conversations where `user` is buyer or seller, most recently updated first.
    async fn list_conversations(&self, user: &str) -> StoreResult<Vec<Conversation>>;
    async fn get_conversation(&self, id: Uuid) -> StoreResult<Conversation>;
    /// Appends a message and bumps the conversation's `updated_at`.
    async fn post_message(&self, conversation_id: Uuid, new: NewMessage) -> StoreResult<Message>;
    /// Ascending by `created_at`.
    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>>;
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn stats(&self) -> StoreResult<StoreStats>;
}

pub trait EggStore: UserStore + ListingStore + ConversationStore + StatsStore {}

impl<T> EggStore for T where T: UserStore + ListingStore + ConversationStore + StatsStore {}

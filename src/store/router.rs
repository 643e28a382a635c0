//! Per-request backend selection. No sticky mode flag: every operation is
//! routed afresh, so a flaky primary can serve some requests while others
//! degrade. Writes are never mirrored; a record written to one backend does
//! not exist in the other.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::mem::MemStore;
use super::*;

#[derive(Clone)]
pub struct RoutingStore {
    primary: Option<Arc<dyn EggStore>>,
    fallback: Arc<MemStore>,
}

/// Try the primary first; retry the same logical operation on the fallback
/// only for `SchemaMissing`. Conflicts and outages propagate untouched so a
/// real rejection or outage is never masked as "not configured".
macro_rules! degrade {
    ($self:ident, $op:ident ( $($arg:expr),* )) => {{
        match &$self.primary {
            None => $self.fallback.$op($($arg),*).await,
            Some(primary) => match primary.$op($($arg.clone()),*).await {
                Err(StoreError::SchemaMissing(detail)) => {
                    warn!(op = stringify!($op), %detail, "primary store missing relation; serving from fallback");
                    $self.fallback.$op($($arg),*).await
                }
                other => other,
            },
        }
    }};
}

impl RoutingStore {
    pub fn new(primary: Option<Arc<dyn EggStore>>, fallback: Arc<MemStore>) -> Self {
        Self { primary, fallback }
    }

    /// Unconfigured primary: everything is served in-process.
    pub fn fallback_only(fallback: Arc<MemStore>) -> Self {
        Self::new(None, fallback)
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// The admin "clear all data" action only ever touches the fallback copy.
    pub fn clear_fallback(&self) {
        self.fallback.clear();
    }
}

#[async_trait]
impl UserStore for RoutingStore {
    async fn login(&self, creds: Credentials) -> StoreResult<User> {
        degrade!(self, login(creds))
    }

    async fn find_user(&self, name: &str) -> StoreResult<Option<User>> {
        degrade!(self, find_user(name))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        degrade!(self, list_users())
    }
}

#[async_trait]
impl ListingStore for RoutingStore {
    async fn list_listings(&self) -> StoreResult<Vec<Listing>> {
        degrade!(self, list_listings())
    }

    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing> {
        degrade!(self, get_listing(id))
    }

    async fn create_listing(&self, new: NewListing) -> StoreResult<Listing> {
        degrade!(self, create_listing(new))
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        degrade!(self, delete_listing(id))
    }
}

#[async_trait]
impl ConversationStore for RoutingStore {
    async fn open_conversation(&self, new: NewConversation) -> StoreResult<Conversation> {
        degrade!(self, open_conversation(new))
    }

    async fn list_conversations(&self, user: &str) -> StoreResult<Vec<Conversation>> {
        degrade!(self, list_conversations(user))
    }

    async fn get_conversation(&self, id: Uuid) -> StoreResult<Conversation> {
        degrade!(self, get_conversation(id))
    }

    async fn post_message(&self, conversation_id: Uuid, new: NewMessage) -> StoreResult<Message> {
        degrade!(self, post_message(conversation_id, new))
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        degrade!(self, list_messages(conversation_id))
    }
}

#[async_trait]
impl StatsStore for RoutingStore {
    async fn stats(&self) -> StoreResult<StoreStats> {
        degrade!(self, stats())
    }
}

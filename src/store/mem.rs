//! In-process fallback store. Serves every request when no primary store is
//! configured, and individual requests whose primary-side relation is missing.
//! Records live in application shape, so the normalizer has nothing to do on
//! this path. State survives restarts only through the optional JSON snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::*;
use crate::auth::Role;
use crate::password::{hash_password, verify_password};
use crate::shape::listing_to_app_shape;

const SNAPSHOT_FILE: &str = "eggconomy.json";

/// Snapshot keys mirror the browser-storage keys of earlier revisions.
#[derive(Default, Serialize, Deserialize)]
struct State {
    #[serde(rename = "eggAccounts", default)]
    users: Vec<User>,
    #[serde(rename = "eggListings", default)]
    listings: Vec<Listing>,
    #[serde(default)]
    conversations: Vec<Conversation>,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Clone)]
pub struct MemStore {
    state: Arc<RwLock<State>>,
    snapshot_path: Arc<PathBuf>,
    admin_seed: Arc<Vec<String>>,
}

impl MemStore {
    fn data_dir() -> PathBuf {
        std::env::var("EGG_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"))
    }

    fn snapshot_path() -> PathBuf {
        let mut p = Self::data_dir();
        p.push(SNAPSHOT_FILE);
        p
    }

    /// Older revisions persisted listings in storage shape (snake_case keys);
    /// normalize them on the way in so the rest of the process only ever sees
    /// application shape.
    fn load_state_from(path: &Path) -> State {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no snapshot; starting empty");
                return State::default();
            }
        };
        let mut raw: Value = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unparseable snapshot; starting empty");
                return State::default();
            }
        };
        if let Some(listings) = raw.get_mut("eggListings").and_then(Value::as_array_mut) {
            for l in listings.iter_mut() {
                *l = listing_to_app_shape(l.take());
            }
        }
        match serde_json::from_value::<State>(raw) {
            Ok(s) => {
                debug!(path = %path.display(), "loaded snapshot");
                s
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot did not match schema; starting empty");
                State::default()
            }
        }
    }

    fn persist(&self) {
        let path = &*self.snapshot_path;
        let json = match serde_json::to_vec_pretty(&*self.state.read().unwrap()) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize snapshot");
                return;
            }
        };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = std::fs::write(path, json) {
            warn!(path = %path.display(), error = %e, "failed to write snapshot");
        }
    }

    pub fn new(admin_seed: Vec<String>) -> Self {
        let snapshot_path = Self::snapshot_path();
        let state = Self::load_state_from(&snapshot_path);
        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot_path: Arc::new(snapshot_path),
            admin_seed: Arc::new(admin_seed),
        }
    }

    /// Admin "clear all data". Wipes the fallback copy only; primary-side
    /// rows are untouched.
    pub fn clear(&self) {
        let mut s = self.state.write().unwrap();
        *s = State::default();
        drop(s);
        self.persist();
    }

    fn seeded_role(&self, name: &str) -> Role {
        if self.admin_seed.iter().any(|a| a == name) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl UserStore for MemStore {
    async fn login(&self, creds: Credentials) -> StoreResult<User> {
        let now = Utc::now();
        let mut s = self.state.write().unwrap();
        let user = match s.users.iter_mut().find(|u| u.name == creds.name) {
            Some(u) => {
                // No lockout bookkeeping on this path.
                if !verify_password(&creds.password, &u.password_hash)? {
                    return Err(StoreError::Unauthorized);
                }
                u.last_login = now;
                u.clone()
            }
            None => {
                // First login registers the name. Uniqueness holds because
                // the scan and the push happen under one write lock.
                let user = User {
                    id: Uuid::new_v4(),
                    name: creds.name.clone(),
                    email: None,
                    phone: None,
                    password_hash: hash_password(&creds.password)?,
                    role: self.seeded_role(&creds.name),
                    email_verified: false,
                    failed_login_attempts: 0,
                    locked_until: None,
                    created_at: now,
                    last_login: now,
                };
                s.users.push(user.clone());
                user
            }
        };
        drop(s);
        self.persist();
        Ok(user)
    }

    async fn find_user(&self, name: &str) -> StoreResult<Option<User>> {
        let s = self.state.read().unwrap();
        Ok(s.users.iter().find(|u| u.name == name).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let s = self.state.read().unwrap();
        Ok(s.users.clone())
    }
}

#[async_trait]
impl ListingStore for MemStore {
    async fn list_listings(&self) -> StoreResult<Vec<Listing>> {
        let s = self.state.read().unwrap();
        let mut v = s.listings.clone();
        v.sort_by(|a, b| b.date_posted.cmp(&a.date_posted));
        Ok(v)
    }

    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing> {
        let s = self.state.read().unwrap();
        s.listings
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn create_listing(&self, new: NewListing) -> StoreResult<Listing> {
        let listing = Listing {
            id: Uuid::new_v4(),
            name: new.name,
            quantity: new.quantity,
            exchange_type: new.exchange_type,
            location: new.location,
            notes: new.notes,
            barter_for: new.barter_for,
            suggested_cash: new.suggested_cash,
            payment_handles: new.payment_handles,
            date_posted: Utc::now(),
        };
        let mut s = self.state.write().unwrap();
        s.listings.insert(0, listing.clone());
        drop(s);
        self.persist();
        Ok(listing)
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        let mut s = self.state.write().unwrap();
        let before = s.listings.len();
        s.listings.retain(|l| l.id != id);
        if s.listings.len() == before {
            return Err(StoreError::NotFound);
        }
        drop(s);
        self.persist();
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemStore {
    async fn open_conversation(&self, new: NewConversation) -> StoreResult<Conversation> {
        let now = Utc::now();
        let mut s = self.state.write().unwrap();
        if let Some(existing) = s.conversations.iter().find(|c| {
            c.listing_id == new.listing_id
                && c.buyer_id == new.buyer_id
                && c.seller_id == new.seller_id
        }) {
            return Ok(existing.clone());
        }
        let conversation = Conversation {
            id: Uuid::new_v4(),
            listing_id: new.listing_id,
            buyer_id: new.buyer_id,
            seller_id: new.seller_id,
            status: ConversationStatus::Active,
            created_at: now,
            updated_at: now,
        };
        s.conversations.push(conversation.clone());
        drop(s);
        self.persist();
        Ok(conversation)
    }

    async fn list_conversations(&self, user: &str) -> StoreResult<Vec<Conversation>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<_> = s
            .conversations
            .iter()
            .filter(|c| c.buyer_id == user || c.seller_id == user)
            .cloned()
            .collect();
        v.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(v)
    }

    async fn get_conversation(&self, id: Uuid) -> StoreResult<Conversation> {
        let s = self.state.read().unwrap();
        s.conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn post_message(&self, conversation_id: Uuid, new: NewMessage) -> StoreResult<Message> {
        let now = Utc::now();
        let mut s = self.state.write().unwrap();
        let conv = s
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
            .ok_or(StoreError::NotFound)?;
        conv.updated_at = now;
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: new.sender_id,
            content: new.content.trim().to_string(),
            photo_url: new.photo_url,
            created_at: now,
        };
        s.messages.push(message.clone());
        drop(s);
        self.persist();
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        let s = self.state.read().unwrap();
        let mut v: Vec<_> = s
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(v)
    }
}

#[async_trait]
impl StatsStore for MemStore {
    async fn stats(&self) -> StoreResult<StoreStats> {
        let s = self.state.read().unwrap();
        Ok(StoreStats {
            users: s.users.len() as u64,
            listings: s.listings.len() as u64,
            conversations: s.conversations.len() as u64,
            messages: s.messages.len() as u64,
        })
    }
}

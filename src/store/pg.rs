//! Primary store: Postgres via sqlx. Rows come back in storage shape and are
//! normalized at this boundary; nothing above it sees a snake_case field.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::lockout;
use super::*;
use crate::auth::Role;
use crate::password::{hash_password, verify_password};
use crate::shape::{ConversationRow, ListingRow, MessageRow, UserRow};

// Postgres error codes the router and callers key off.
const PG_UNDEFINED_TABLE: &str = "42P01";
const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
    admin_seed: Vec<String>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>, admin_seed: Vec<String>) -> Self {
        Self { pool, admin_seed }
    }

    fn seeded_role(&self, name: &str) -> Role {
        if self.admin_seed.iter().any(|a| a == name) {
            Role::Admin
        } else {
            Role::User
        }
    }
}

/// Split the three outcomes the degradation policy cares about: a missing
/// relation (fallback-eligible), a unique-constraint rejection (a legitimate
/// conflict, never fallback), and everything else (outage, never fallback).
fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some(PG_UNDEFINED_TABLE) => return StoreError::SchemaMissing(db.message().to_string()),
            Some(PG_UNIQUE_VIOLATION) => return StoreError::Conflict(db.message().to_string()),
            _ => {}
        }
    }
    StoreError::Unavailable(e.to_string())
}

const USER_COLS: &str =
    "id, name, email, phone, password_hash, role, email_verified, failed_login_attempts, locked_until, created_at, last_login";
const LISTING_COLS: &str =
    "id, name, quantity, exchange_type, location, notes, barter_for, suggested_cash, payment_handles, date_posted";
const CONVERSATION_COLS: &str =
    "id, listing_id, buyer_id, seller_id, status, created_at, updated_at";
const MESSAGE_COLS: &str = "id, conversation_id, sender_id, content, photo_url, created_at";

#[async_trait]
impl UserStore for PgStore {
    async fn login(&self, creds: Credentials) -> StoreResult<User> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLS} FROM users WHERE name = $1"
        ))
        .bind(&creds.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;

        let Some(row) = row else {
            // Implicit registration: first login for a name creates the row.
            let hash = hash_password(&creds.password)?;
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "INSERT INTO users (name, password_hash, role, created_at, last_login) \
                 VALUES ($1, $2, $3, $4, $4) RETURNING {USER_COLS}"
            ))
            .bind(&creds.name)
            .bind(&hash)
            .bind(self.seeded_role(&creds.name).as_str())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
            return Ok(row.try_into()?);
        };

        let user: User = row.try_into()?;

        // Lock precedence over password correctness.
        if let Some(until) = lockout::active_lock(&user, now) {
            return Err(StoreError::Locked(until));
        }

        if verify_password(&creds.password, &user.password_hash)? {
            let row = sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE users SET failed_login_attempts = 0, locked_until = NULL, last_login = $2 \
                 WHERE name = $1 RETURNING {USER_COLS}"
            ))
            .bind(&creds.name)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
            Ok(row.try_into()?)
        } else {
            let (attempts, locked_until) =
                lockout::register_failure(user.failed_login_attempts, now);
            sqlx::query(
                "UPDATE users SET failed_login_attempts = $2, locked_until = $3 WHERE name = $1",
            )
            .bind(&creds.name)
            .bind(attempts)
            .bind(locked_until)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
            Err(StoreError::Unauthorized)
        }
    }

    async fn find_user(&self, name: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLS} FROM users WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        row.map(User::try_from).transpose().map_err(Into::into)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter()
            .map(|r| User::try_from(r).map_err(Into::into))
            .collect()
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn list_listings(&self) -> StoreResult<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLS} FROM listings ORDER BY date_posted DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter()
            .map(|r| Listing::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {LISTING_COLS} FROM listings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or(StoreError::NotFound)?;
        Ok(row.try_into()?)
    }

    async fn create_listing(&self, new: NewListing) -> StoreResult<Listing> {
        let row: ListingRow = sqlx::query_as(&format!(
            "INSERT INTO listings \
             (name, quantity, exchange_type, location, notes, barter_for, suggested_cash, payment_handles, date_posted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {LISTING_COLS}"
        ))
        .bind(&new.name)
        .bind(new.quantity)
        .bind(new.exchange_type.as_str())
        .bind(&new.location)
        .bind(&new.notes)
        .bind(&new.barter_for)
        .bind(&new.suggested_cash)
        .bind(new.payment_handles.map(sqlx::types::Json))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.try_into()?)
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn open_conversation(&self, new: NewConversation) -> StoreResult<Conversation> {
        // Insert-if-absent, then read back: two racing openers both land on
        // the same row thanks to the unique triple.
        sqlx::query(
            "INSERT INTO conversations (listing_id, buyer_id, seller_id, status, created_at, updated_at) \
             VALUES ($1, $2, $3, 'active', $4, $4) \
             ON CONFLICT (listing_id, buyer_id, seller_id) DO NOTHING",
        )
        .bind(new.listing_id)
        .bind(&new.buyer_id)
        .bind(&new.seller_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLS} FROM conversations \
             WHERE listing_id = $1 AND buyer_id = $2 AND seller_id = $3"
        ))
        .bind(new.listing_id)
        .bind(&new.buyer_id)
        .bind(&new.seller_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.try_into()?)
    }

    async fn list_conversations(&self, user: &str) -> StoreResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLS} FROM conversations \
             WHERE buyer_id = $1 OR seller_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        rows.into_iter()
            .map(|r| Conversation::try_from(r).map_err(Into::into))
            .collect()
    }

    async fn get_conversation(&self, id: Uuid) -> StoreResult<Conversation> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or(StoreError::NotFound)?;
        Ok(row.try_into()?)
    }

    async fn post_message(&self, conversation_id: Uuid, new: NewMessage) -> StoreResult<Message> {
        let now = Utc::now();
        let bumped = sqlx::query("UPDATE conversations SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if bumped.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "INSERT INTO messages (conversation_id, sender_id, content, photo_url, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {MESSAGE_COLS}"
        ))
        .bind(conversation_id)
        .bind(&new.sender_id)
        .bind(new.content.trim())
        .bind(&new.photo_url)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row.into())
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {MESSAGE_COLS} FROM messages WHERE conversation_id = $1 ORDER BY created_at"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(rows.into_iter().map(Message::from).collect())
    }
}

#[async_trait]
impl StatsStore for PgStore {
    async fn stats(&self) -> StoreResult<StoreStats> {
        let (users, listings, conversations, messages): (i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM listings), \
                 (SELECT COUNT(*) FROM conversations), (SELECT COUNT(*) FROM messages)",
            )
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(StoreStats {
            users: users as u64,
            listings: listings as u64,
            conversations: conversations as u64,
            messages: messages as u64,
        })
    }
}

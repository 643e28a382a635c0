//! Router behavior: when requests degrade to the fallback store and, just as
//! importantly, when they must not.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use eggconomy::models::*;
use eggconomy::store::mem::MemStore;
use eggconomy::store::router::RoutingStore;
use eggconomy::store::{
    ConversationStore, ListingStore, StatsStore, StoreError, StoreResult, UserStore,
};
use serial_test::serial;
use uuid::Uuid;

/// A stand-in primary: a MemStore that can be told to fail its next calls
/// with scripted errors.
#[derive(Clone)]
struct FaultyPrimary {
    inner: MemStore,
    faults: Arc<Mutex<VecDeque<StoreError>>>,
}

impl FaultyPrimary {
    fn new() -> Self {
        Self {
            inner: MemStore::new(vec![]),
            faults: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    fn fail_next(&self, e: StoreError) {
        self.faults.lock().unwrap().push_back(e);
    }

    fn take_fault(&self) -> Option<StoreError> {
        self.faults.lock().unwrap().pop_front()
    }
}

macro_rules! delegate {
    ($self:ident, $op:ident ( $($arg:expr),* )) => {{
        if let Some(e) = $self.take_fault() {
            return Err(e);
        }
        $self.inner.$op($($arg),*).await
    }};
}

#[async_trait]
impl UserStore for FaultyPrimary {
    async fn login(&self, creds: Credentials) -> StoreResult<User> {
        delegate!(self, login(creds))
    }
    async fn find_user(&self, name: &str) -> StoreResult<Option<User>> {
        delegate!(self, find_user(name))
    }
    async fn list_users(&self) -> StoreResult<Vec<User>> {
        delegate!(self, list_users())
    }
}

#[async_trait]
impl ListingStore for FaultyPrimary {
    async fn list_listings(&self) -> StoreResult<Vec<Listing>> {
        delegate!(self, list_listings())
    }
    async fn get_listing(&self, id: Uuid) -> StoreResult<Listing> {
        delegate!(self, get_listing(id))
    }
    async fn create_listing(&self, new: NewListing) -> StoreResult<Listing> {
        delegate!(self, create_listing(new))
    }
    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        delegate!(self, delete_listing(id))
    }
}

#[async_trait]
impl ConversationStore for FaultyPrimary {
    async fn open_conversation(&self, new: NewConversation) -> StoreResult<Conversation> {
        delegate!(self, open_conversation(new))
    }
    async fn list_conversations(&self, user: &str) -> StoreResult<Vec<Conversation>> {
        delegate!(self, list_conversations(user))
    }
    async fn get_conversation(&self, id: Uuid) -> StoreResult<Conversation> {
        delegate!(self, get_conversation(id))
    }
    async fn post_message(&self, conversation_id: Uuid, new: NewMessage) -> StoreResult<Message> {
        delegate!(self, post_message(conversation_id, new))
    }
    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        delegate!(self, list_messages(conversation_id))
    }
}

#[async_trait]
impl StatsStore for FaultyPrimary {
    async fn stats(&self) -> StoreResult<StoreStats> {
        delegate!(self, stats())
    }
}

fn isolated_env() {
    std::env::set_var("EGG_DATA_DIR", tempfile::tempdir().unwrap().path());
}

fn sample_listing() -> NewListing {
    NewListing {
        name: "Sarah from Berea".into(),
        quantity: 12,
        exchange_type: ExchangeType::Gift,
        location: "Berea, KY".into(),
        notes: Some("Laid this morning.".into()),
        barter_for: None,
        suggested_cash: None,
        payment_handles: None,
    }
}

#[tokio::test]
#[serial]
async fn unconfigured_primary_routes_everything_to_fallback() {
    isolated_env();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::fallback_only(fallback.clone());
    assert!(!router.has_primary());

    let created = router.create_listing(sample_listing()).await.unwrap();
    assert_eq!(fallback.get_listing(created.id).await.unwrap().id, created.id);
}

#[tokio::test]
#[serial]
async fn healthy_primary_serves_writes_without_mirroring() {
    isolated_env();
    let primary = FaultyPrimary::new();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::new(Some(Arc::new(primary.clone())), fallback.clone());

    let created = router.create_listing(sample_listing()).await.unwrap();

    // served by the primary, invisible to the fallback
    assert!(primary.inner.get_listing(created.id).await.is_ok());
    assert!(matches!(
        fallback.get_listing(created.id).await.unwrap_err(),
        StoreError::NotFound
    ));
}

#[tokio::test]
#[serial]
async fn schema_missing_degrades_within_the_same_operation() {
    isolated_env();
    let primary = FaultyPrimary::new();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::new(Some(Arc::new(primary.clone())), fallback.clone());

    primary.fail_next(StoreError::SchemaMissing("listings".into()));
    let created = router.create_listing(sample_listing()).await.unwrap();

    // the retry landed on the fallback
    assert!(fallback.get_listing(created.id).await.is_ok());
    assert!(matches!(
        primary.inner.get_listing(created.id).await.unwrap_err(),
        StoreError::NotFound
    ));
}

#[tokio::test]
#[serial]
async fn degradation_is_per_request_not_sticky() {
    isolated_env();
    let primary = FaultyPrimary::new();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::new(Some(Arc::new(primary.clone())), fallback.clone());

    primary.fail_next(StoreError::SchemaMissing("listings".into()));
    let degraded = router.create_listing(sample_listing()).await.unwrap();
    // next request goes to the (now healthy) primary again
    let recovered = router.create_listing(sample_listing()).await.unwrap();

    assert!(fallback.get_listing(degraded.id).await.is_ok());
    assert!(primary.inner.get_listing(recovered.id).await.is_ok());
}

#[tokio::test]
#[serial]
async fn conflict_does_not_fall_back() {
    isolated_env();
    let primary = FaultyPrimary::new();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::new(Some(Arc::new(primary.clone())), fallback.clone());

    primary.fail_next(StoreError::Conflict("name is taken".into()));
    let err = router
        .login(Credentials {
            name: "sarah".into(),
            password: "pw".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // the fallback was never consulted
    assert!(fallback.find_user("sarah").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn outage_does_not_fall_back() {
    isolated_env();
    let primary = FaultyPrimary::new();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::new(Some(Arc::new(primary.clone())), fallback.clone());

    primary.fail_next(StoreError::Unavailable("connection refused".into()));
    let err = router.list_listings().await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
#[serial]
async fn clear_only_touches_the_fallback() {
    isolated_env();
    let primary = FaultyPrimary::new();
    let fallback = Arc::new(MemStore::new(vec![]));
    let router = RoutingStore::new(Some(Arc::new(primary.clone())), fallback.clone());

    let kept = primary.inner.create_listing(sample_listing()).await.unwrap();
    fallback.create_listing(sample_listing()).await.unwrap();

    router.clear_fallback();

    assert!(primary.inner.get_listing(kept.id).await.is_ok());
    assert!(fallback.list_listings().await.unwrap().is_empty());
}

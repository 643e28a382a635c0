use chrono::Utc;
use eggconomy::auth::Role;
use eggconomy::models::*;
use eggconomy::shape::{
    listing_to_app_shape, listing_to_storage_shape, ConversationRow, ListingRow, UserRow,
};
use serde_json::json;
use uuid::Uuid;

fn listing() -> Listing {
    Listing {
        id: Uuid::new_v4(),
        name: "Mike's Farm".into(),
        quantity: 24,
        exchange_type: ExchangeType::Barter,
        location: "Richmond, KY".into(),
        notes: Some("Organic, free-range eggs.".into()),
        barter_for: Some("Fresh vegetables or homemade bread".into()),
        suggested_cash: None,
        payment_handles: Some(PaymentHandles {
            venmo: Some("@mikesfarm".into()),
            paypal: Some("mike.farm".into()),
        }),
        date_posted: Utc::now(),
    }
}

#[test]
fn listing_row_conversion_is_exact_inverse() {
    let original = listing();
    let row: ListingRow = original.clone().into();

    // storage shape really is snake_case on the wire
    let as_json = serde_json::to_value(&row).unwrap();
    assert!(as_json.get("exchange_type").is_some());
    assert!(as_json.get("exchangeType").is_none());
    // nested handles survive as a unit
    assert_eq!(as_json["payment_handles"]["venmo"], "@mikesfarm");

    let back: Listing = row.try_into().unwrap();
    assert_eq!(back, original);
}

#[test]
fn listing_row_rejects_unknown_exchange_type() {
    let mut row: ListingRow = listing().into();
    row.exchange_type = "lease".into();
    assert!(Listing::try_from(row).is_err());
}

#[test]
fn user_row_conversion_is_exact_inverse() {
    let now = Utc::now();
    let original = User {
        id: Uuid::new_v4(),
        name: "betty".into(),
        email: Some("betty@example.org".into()),
        phone: None,
        password_hash: "$argon2id$stub".into(),
        role: Role::Admin,
        email_verified: true,
        failed_login_attempts: 2,
        locked_until: None,
        created_at: now,
        last_login: now,
    };
    let row: UserRow = original.clone().into();
    let back: User = row.try_into().unwrap();
    assert_eq!(back, original);
}

#[test]
fn conversation_row_conversion_is_exact_inverse() {
    let now = Utc::now();
    let original = Conversation {
        id: Uuid::new_v4(),
        listing_id: Uuid::new_v4(),
        buyer_id: "mike".into(),
        seller_id: "betty".into(),
        status: ConversationStatus::Completed,
        created_at: now,
        updated_at: now,
    };
    let row: ConversationRow = original.clone().into();
    let back: Conversation = row.try_into().unwrap();
    assert_eq!(back, original);
}

#[test]
fn json_shapes_are_inverses_and_pass_unknown_fields_through() {
    let storage = json!({
        "id": "1",
        "name": "Granny Betty",
        "quantity": 6,
        "exchange_type": "cash",
        "location": "Berea, KY",
        "suggested_cash": "$3/dozen",
        "payment_handles": { "venmo": "@grannybetty" },
        "date_posted": "2024-01-13",
        "legacy_flag": true
    });

    let app = listing_to_app_shape(storage.clone());
    assert_eq!(app["exchangeType"], "cash");
    assert_eq!(app["suggestedCash"], "$3/dozen");
    assert_eq!(app["datePosted"], "2024-01-13");
    // unknown keys untouched, nested object untouched
    assert_eq!(app["legacy_flag"], true);
    assert_eq!(app["paymentHandles"]["venmo"], "@grannybetty");
    assert!(app.get("exchange_type").is_none());

    assert_eq!(listing_to_storage_shape(app), storage);
}

#[test]
fn app_shaped_input_passes_through_app_normalizer() {
    // records already in application shape have nothing to rename
    let app = json!({ "exchangeType": "gift", "datePosted": "2024-01-15" });
    assert_eq!(listing_to_app_shape(app.clone()), app);
}

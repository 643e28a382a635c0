//! Request validation. Everything here runs before any store is touched;
//! a rejection never reaches a backend.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ApiError;
use crate::models::{Credentials, NewConversation, NewListing};

pub const MIN_QUANTITY: i32 = 1;
pub const MAX_QUANTITY: i32 = 1000;
pub const MAX_NAME_LEN: usize = 60;
pub const MAX_LOCATION_LEN: usize = 120;
pub const MAX_NOTES_LEN: usize = 500;
pub const MAX_PRICE_LEN: usize = 60;
pub const MAX_CONTENT_LEN: usize = 2000;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Venmo/PayPal handle: optional leading @, then 2-30 of [A-Za-z0-9_.-].
static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@?[A-Za-z0-9_.\-]{2,30}$").expect("handle regex"));

fn require(ok: bool, msg: &str) -> Result<(), ApiError> {
    if ok {
        Ok(())
    } else {
        Err(ApiError::Validation(msg.to_string()))
    }
}

pub fn credentials(creds: &Credentials) -> Result<(), ApiError> {
    require(!creds.name.trim().is_empty(), "name is required")?;
    require(creds.name.len() <= MAX_NAME_LEN, "name is too long")?;
    require(!creds.password.is_empty(), "password is required")?;
    require(
        creds.password.len() <= MAX_PASSWORD_LEN,
        "password is too long",
    )?;
    Ok(())
}

pub fn listing(new: &NewListing) -> Result<(), ApiError> {
    require(!new.name.trim().is_empty(), "name is required")?;
    require(new.name.len() <= MAX_NAME_LEN, "name is too long")?;
    require(
        (MIN_QUANTITY..=MAX_QUANTITY).contains(&new.quantity),
        "quantity must be between 1 and 1000",
    )?;
    require(!new.location.trim().is_empty(), "location is required")?;
    require(
        new.location.len() <= MAX_LOCATION_LEN,
        "location is too long",
    )?;
    if let Some(notes) = &new.notes {
        require(notes.len() <= MAX_NOTES_LEN, "notes are too long")?;
    }
    if let Some(barter_for) = &new.barter_for {
        require(
            barter_for.len() <= MAX_NOTES_LEN,
            "barter wishlist is too long",
        )?;
    }
    if let Some(suggested_cash) = &new.suggested_cash {
        require(
            suggested_cash.len() <= MAX_PRICE_LEN,
            "suggested price is too long",
        )?;
    }
    if let Some(handles) = &new.payment_handles {
        if let Some(venmo) = &handles.venmo {
            require(HANDLE_RE.is_match(venmo), "malformed venmo handle")?;
        }
        if let Some(paypal) = &handles.paypal {
            require(HANDLE_RE.is_match(paypal), "malformed paypal handle")?;
        }
    }
    Ok(())
}

pub fn conversation(new: &NewConversation) -> Result<(), ApiError> {
    require(!new.buyer_id.trim().is_empty(), "buyerId is required")?;
    require(!new.seller_id.trim().is_empty(), "sellerId is required")?;
    require(new.buyer_id != new.seller_id, "cannot message yourself")?;
    Ok(())
}

pub fn message_content(content: &str) -> Result<(), ApiError> {
    require(!content.trim().is_empty(), "message content is required")?;
    require(content.len() <= MAX_CONTENT_LEN, "message is too long")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExchangeType, PaymentHandles};

    fn new_listing(quantity: i32) -> NewListing {
        NewListing {
            name: "Granny Betty".into(),
            quantity,
            exchange_type: ExchangeType::Cash,
            location: "Berea, KY".into(),
            notes: None,
            barter_for: None,
            suggested_cash: Some("$3/dozen".into()),
            payment_handles: None,
        }
    }

    #[test]
    fn quantity_boundaries() {
        assert!(listing(&new_listing(0)).is_err());
        assert!(listing(&new_listing(1)).is_ok());
        assert!(listing(&new_listing(1000)).is_ok());
        assert!(listing(&new_listing(1001)).is_err());
    }

    #[test]
    fn handle_patterns() {
        let mut l = new_listing(12);
        l.payment_handles = Some(PaymentHandles {
            venmo: Some("@grannybetty".into()),
            paypal: None,
        });
        assert!(listing(&l).is_ok());

        l.payment_handles = Some(PaymentHandles {
            venmo: Some("not a handle!".into()),
            paypal: None,
        });
        assert!(listing(&l).is_err());

        l.payment_handles = Some(PaymentHandles {
            venmo: None,
            paypal: Some("@".into()),
        });
        assert!(listing(&l).is_err());
    }

    #[test]
    fn optional_text_fields_are_capped() {
        let mut l = new_listing(12);
        l.barter_for = Some("vegetables ".repeat(60));
        assert!(listing(&l).is_err());

        let mut l = new_listing(12);
        l.suggested_cash = Some("$".repeat(MAX_PRICE_LEN + 1));
        assert!(listing(&l).is_err());

        let mut l = new_listing(12);
        l.barter_for = Some("fresh vegetables or homemade bread".into());
        l.suggested_cash = Some("$3/dozen".into());
        assert!(listing(&l).is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut l = new_listing(12);
        l.name = "   ".into();
        assert!(listing(&l).is_err());
    }
}

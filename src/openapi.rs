use crate::auth::Role;
use crate::models::{
    Conversation, ConversationStatus, Credentials, ExchangeType, Listing, ListingView, Message,
    NewConversation, NewListing, NewMessage, PaymentHandles, StoreStats, UserView,
};
use crate::routes::{LoginResponse, MeResponse, MessageBody};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::login,
        crate::routes::auth_me,
        crate::routes::list_listings,
        crate::routes::create_listing,
        crate::routes::delete_listing,
        crate::routes::open_conversation,
        crate::routes::list_conversations,
        crate::routes::list_messages,
        crate::routes::post_message,
        crate::routes::admin_stats,
        crate::routes::admin_users,
        crate::routes::admin_clear,
    ),
    components(schemas(
        Credentials,
        LoginResponse,
        MeResponse,
        UserView,
        Role,
        Listing,
        ListingView,
        NewListing,
        ExchangeType,
        PaymentHandles,
        Conversation,
        ConversationStatus,
        NewConversation,
        Message,
        NewMessage,
        MessageBody,
        StoreStats,
    )),
    tags((name = "eggconomy", description = "Community egg marketplace API"))
)]
pub struct ApiDoc;

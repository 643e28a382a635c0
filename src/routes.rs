use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{create_jwt, Auth, Role};
use crate::error::ApiError;
use crate::models::*;
use crate::rate_limit::RateLimiterFacade;
use crate::require_role;
use crate::store::router::RoutingStore;
use crate::store::{ConversationStore, ListingStore, StatsStore, UserStore};
use crate::validate;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/auth/login").route(web::post().to(login)))
            .service(web::resource("/auth/me").route(web::get().to(auth_me)))
            .service(
                web::resource("/listings")
                    .route(web::get().to(list_listings))
                    .route(web::post().to(create_listing)),
            )
            .service(web::resource("/listings/{id}").route(web::delete().to(delete_listing)))
            .service(
                web::resource("/conversations")
                    .route(web::get().to(list_conversations))
                    .route(web::post().to(open_conversation)),
            )
            .service(
                web::resource("/conversations/{id}/messages")
                    .route(web::get().to(list_messages))
                    .route(web::post().to(post_message)),
            )
            .service(web::resource("/admin/stats").route(web::get().to(admin_stats)))
            .service(web::resource("/admin/users").route(web::get().to(admin_users)))
            .service(web::resource("/admin/clear").route(web::post().to(admin_clear))),
    );
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RoutingStore>,
    pub rate_limiter: Option<RateLimiterFacade>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserView,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub name: String,
    pub roles: Vec<Role>,
}

fn roles_for(role: Role) -> Vec<Role> {
    match role {
        Role::Admin => vec![Role::User, Role::Admin],
        Role::User => vec![Role::User],
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Logged in (first login registers the name)", body = LoginResponse),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Wrong password"),
        (status = 423, description = "Account locked")
    )
)]
pub async fn login(
    data: web::Data<AppState>,
    payload: web::Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    let creds = payload.into_inner();
    validate::credentials(&creds)?;
    let user = data.store.login(creds).await?;
    let token = create_jwt(&user.name, roles_for(user.role))
        .map_err(|e| ApiError::Internal(Some(e.to_string())))?;
    Ok(HttpResponse::Ok().json(LoginResponse {
        user: user.into(),
        token,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current claims", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn auth_me(auth: Auth) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(MeResponse {
        name: auth.0.sub,
        roles: auth.0.roles,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListingQuery {
    /// Case-insensitive substring match over name, location and notes.
    pub q: Option<String>,
    /// Accepted in both spellings; clients predating the camelCase wire
    /// shape still send `exchange_type`.
    #[serde(alias = "exchange_type")]
    pub exchange_type: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/listings",
    params(ListingQuery),
    responses(
        (status = 200, description = "Listings, newest first", body = [ListingView]),
        (status = 400, description = "Unknown exchange type")
    )
)]
pub async fn list_listings(
    data: web::Data<AppState>,
    query: web::Query<ListingQuery>,
) -> Result<HttpResponse, ApiError> {
    let exchange = query
        .exchange_type
        .as_deref()
        .map(|s| {
            ExchangeType::parse(s)
                .ok_or_else(|| ApiError::Validation(format!("unknown exchange type '{s}'")))
        })
        .transpose()?;
    let needle = query.q.as_deref().map(str::to_lowercase);

    let now = Utc::now();
    let listings = data.store.list_listings().await?;
    let views: Vec<ListingView> = listings
        .into_iter()
        .filter(|l| exchange.map_or(true, |e| l.exchange_type == e))
        .filter(|l| {
            needle.as_deref().map_or(true, |q| {
                l.name.to_lowercase().contains(q)
                    || l.location.to_lowercase().contains(q)
                    || l.notes
                        .as_deref()
                        .map_or(false, |n| n.to_lowercase().contains(q))
            })
        })
        .map(|l| ListingView::at(l, now))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    post,
    path = "/api/v1/listings",
    request_body = NewListing,
    responses(
        (status = 201, description = "Listing created", body = ListingView),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid token"),
        (status = 429, description = "Too many listings this hour")
    )
)]
pub async fn create_listing(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewListing>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    validate::listing(&new)?;
    if let Some(rl) = &data.rate_limiter {
        if !rl.allow_listing(&auth.0.sub) {
            return Err(ApiError::RateLimited);
        }
    }
    let listing = data.store.create_listing(new).await?;
    Ok(HttpResponse::Created().json(ListingView::at(listing, Utc::now())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the poster"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn delete_listing(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let listing = data.store.get_listing(id).await?;
    // Best-effort ownership: poster identity is an informal reference to the
    // user name, not an enforced relationship.
    if listing.name != auth.0.sub && !auth.0.is_admin() {
        return Err(ApiError::Forbidden);
    }
    data.store.delete_listing(id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    request_body = NewConversation,
    responses(
        (status = 200, description = "Existing or newly created conversation", body = Conversation),
        (status = 400, description = "Validation failure"),
        (status = 403, description = "Caller is not the buyer"),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn open_conversation(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<NewConversation>,
) -> Result<HttpResponse, ApiError> {
    let new = payload.into_inner();
    validate::conversation(&new)?;
    if new.buyer_id != auth.0.sub {
        return Err(ApiError::Forbidden);
    }
    // The listing reference is the one thing worth checking up front.
    data.store.get_listing(new.listing_id).await?;
    let conversation = data.store.open_conversation(new).await?;
    Ok(HttpResponse::Ok().json(conversation))
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    responses(
        (status = 200, description = "Conversations for the caller, latest activity first", body = [Conversation]),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn list_conversations(
    auth: Auth,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let conversations = data.store.list_conversations(&auth.0.sub).await?;
    Ok(HttpResponse::Ok().json(conversations))
}

fn assert_participant(conversation: &Conversation, auth: &Auth) -> Result<(), ApiError> {
    if conversation.buyer_id != auth.0.sub
        && conversation.seller_id != auth.0.sub
        && !auth.0.is_admin()
    {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Messages, oldest first", body = [Message]),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn list_messages(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conversation = data.store.get_conversation(id).await?;
    assert_participant(&conversation, &auth)?;
    let messages = data.store.list_messages(id).await?;
    Ok(HttpResponse::Ok().json(messages))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub content: String,
    pub photo_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = MessageBody,
    responses(
        (status = 201, description = "Message posted", body = Message),
        (status = 400, description = "Validation failure"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found")
    )
)]
pub async fn post_message(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: web::Json<MessageBody>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let body = payload.into_inner();
    validate::message_content(&body.content)?;
    let conversation = data.store.get_conversation(id).await?;
    assert_participant(&conversation, &auth)?;
    let message = data
        .store
        .post_message(
            id,
            NewMessage {
                sender_id: auth.0.sub.clone(),
                content: body.content,
                photo_url: body.photo_url,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(message))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    responses(
        (status = 200, description = "Entity counts", body = StoreStats),
        (status = 403, description = "Admins only")
    )
)]
pub async fn admin_stats(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let stats = data.store.stats().await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    responses(
        (status = 200, description = "All users, no credentials", body = [UserView]),
        (status = 403, description = "Admins only")
    )
)]
pub async fn admin_users(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    let users = data.store.list_users().await?;
    let views: Vec<UserView> = users.into_iter().map(UserView::from).collect();
    Ok(HttpResponse::Ok().json(views))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/clear",
    responses(
        (status = 204, description = "Fallback store cleared (primary untouched)"),
        (status = 403, description = "Admins only")
    )
)]
pub async fn admin_clear(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_role!(auth, Role::Admin);
    data.store.clear_fallback();
    Ok(HttpResponse::NoContent().finish())
}

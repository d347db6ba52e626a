use axum::{
    extract::{Path, Query, RawQuery, State},
    http::StatusCode,
    Extension, Json,
};
use common::auth::{DatabaseAuthService, Registration};
use common::db::repositories::{MembershipRepository, UserRepository};
use common::membership::{self, MembershipKind};
use common::models::{Subscription, UserClaims, UserProfile};
use common::pagination::{Page, PageRequest};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{
    api_error, caller_id, page_params, parse_positive, passthrough_query, viewer_id,
    ErrorResponse, JsonBody, SuccessResponse,
};
use crate::state::AppState;

const USERS_PATH: &str = "/api/users/";
const SUBSCRIPTIONS_PATH: &str = "/api/users/subscriptions/";

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Sign up; returns the new public profile
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<Registration>,
) -> Result<(StatusCode, Json<SuccessResponse<UserProfile>>), ErrorResponse> {
    let auth_service = DatabaseAuthService::new(
        state.jwt_service.clone(),
        UserRepository::new(state.db_pool.clone()),
    );
    let user = auth_service.register(req).await.map_err(api_error)?;

    let profile = UserProfile {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: false,
    };
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(profile))))
}

#[tracing::instrument(skip(state, claims))]
pub async fn list_users(
    State(state): State<AppState>,
    claims: Option<Extension<UserClaims>>,
    Query(pairs): Query<Vec<(String, String)>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<SuccessResponse<Page<UserProfile>>>, ErrorResponse> {
    let request = PageRequest::resolve(page_params(&pairs)?, &state.config.pagination);
    let viewer = viewer_id(claims.as_deref());

    let (profiles, count) = UserRepository::new(state.db_pool.clone())
        .list_profiles(viewer, request)
        .await
        .map_err(api_error)?;

    let page = Page::new(
        profiles,
        count,
        request,
        USERS_PATH,
        &passthrough_query(raw.as_deref()),
    );
    Ok(Json(SuccessResponse::new(page)))
}

#[tracing::instrument(skip(state, claims))]
pub async fn get_user(
    State(state): State<AppState>,
    claims: Option<Extension<UserClaims>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<UserProfile>>, ErrorResponse> {
    let profile = UserRepository::new(state.db_pool.clone())
        .find_profile(id, viewer_id(claims.as_deref()))
        .await
        .map_err(api_error)?
        .ok_or_else(|| ErrorResponse::new("not_found", format!("User {} not found", id)))?;

    Ok(Json(SuccessResponse::new(profile)))
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<SuccessResponse<UserProfile>>, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let profile = UserRepository::new(state.db_pool.clone())
        .find_profile(user_id, Some(user_id))
        .await
        .map_err(api_error)?
        .ok_or_else(|| ErrorResponse::new("unauthorized", "User no longer exists"))?;

    Ok(Json(SuccessResponse::new(profile)))
}

#[tracing::instrument(skip(state, claims, req), fields(user_id = %claims.sub))]
pub async fn set_password(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    JsonBody(req): JsonBody<SetPasswordRequest>,
) -> Result<StatusCode, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let auth_service = DatabaseAuthService::new(
        state.jwt_service.clone(),
        UserRepository::new(state.db_pool.clone()),
    );

    auth_service
        .set_password(user_id, &req.current_password, &req.new_password)
        .await
        .map_err(api_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Followed authors with their newest recipes
#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn subscriptions(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Query(pairs): Query<Vec<(String, String)>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<SuccessResponse<Page<Subscription>>>, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let request = PageRequest::resolve(page_params(&pairs)?, &state.config.pagination);
    let recipes_limit = recipes_limit(&pairs)?;

    let (subscriptions, count) = UserRepository::new(state.db_pool.clone())
        .list_subscriptions(user_id, request, recipes_limit)
        .await
        .map_err(api_error)?;

    let page = Page::new(
        subscriptions,
        count,
        request,
        SUBSCRIPTIONS_PATH,
        &passthrough_query(raw.as_deref()),
    );
    Ok(Json(SuccessResponse::new(page)))
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(author_id): Path<Uuid>,
) -> Result<(StatusCode, Json<SuccessResponse<UserProfile>>), ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let repository = MembershipRepository::new(state.db_pool.clone());

    membership::add_member(&repository, MembershipKind::Follow, user_id, author_id)
        .await
        .map_err(api_error)?;

    let author = UserRepository::new(state.db_pool.clone())
        .find_profile(author_id, Some(user_id))
        .await
        .map_err(api_error)?
        .ok_or_else(|| ErrorResponse::new("not_found", "Author not found"))?;

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(author))))
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(author_id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let repository = MembershipRepository::new(state.db_pool.clone());

    membership::remove_member(&repository, MembershipKind::Follow, user_id, author_id)
        .await
        .map_err(api_error)?;

    Ok(StatusCode::NO_CONTENT)
}

fn recipes_limit(pairs: &[(String, String)]) -> Result<Option<i64>, ErrorResponse> {
    pairs
        .iter()
        .find(|(key, _)| key == "recipes_limit")
        .map(|(key, value)| parse_positive(key, value).map(i64::from))
        .transpose()
}

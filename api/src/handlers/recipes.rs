use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use common::composition::{RecipeDraft, RecipePatch};
use common::db::repositories::{MembershipRepository, RecipeFilter, RecipeRepository};
use common::membership::{self, MembershipKind};
use common::models::{RecipeDetails, RecipeSummary, UserClaims};
use common::pagination::{Page, PageRequest};
use common::recipes::{RecipeService, RecipeStore};
use common::shopping_list;
use uuid::Uuid;

use crate::handlers::{
    api_error, caller_id, page_params, passthrough_query, viewer_id, ErrorResponse, JsonBody,
    SuccessResponse,
};
use crate::state::AppState;

const RECIPES_PATH: &str = "/api/recipes/";

fn service(state: &AppState) -> RecipeService<RecipeRepository> {
    RecipeService::new(RecipeRepository::new(state.db_pool.clone()))
}

/// Newest-first recipe feed with tag, author and per-user filters
#[tracing::instrument(skip(state, claims))]
pub async fn list_recipes(
    State(state): State<AppState>,
    claims: Option<Extension<UserClaims>>,
    Query(pairs): Query<Vec<(String, String)>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<SuccessResponse<Page<RecipeDetails>>>, ErrorResponse> {
    let request = PageRequest::resolve(page_params(&pairs)?, &state.config.pagination);
    let filter = recipe_filter(&pairs)?;
    let viewer = viewer_id(claims.as_deref());

    let (recipes, count) = RecipeRepository::new(state.db_pool.clone())
        .list(&filter, request, viewer)
        .await
        .map_err(api_error)?;

    let page = Page::new(
        recipes,
        count,
        request,
        RECIPES_PATH,
        &passthrough_query(raw.as_deref()),
    );
    Ok(Json(SuccessResponse::new(page)))
}

#[tracing::instrument(skip(state, claims))]
pub async fn get_recipe(
    State(state): State<AppState>,
    claims: Option<Extension<UserClaims>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<RecipeDetails>>, ErrorResponse> {
    let recipe = RecipeRepository::new(state.db_pool.clone())
        .find_details(id, viewer_id(claims.as_deref()))
        .await
        .map_err(api_error)?
        .ok_or_else(|| ErrorResponse::new("not_found", format!("Recipe {} not found", id)))?;

    Ok(Json(SuccessResponse::new(recipe)))
}

#[tracing::instrument(skip(state, claims, draft), fields(user_id = %claims.sub))]
pub async fn create_recipe(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    JsonBody(draft): JsonBody<RecipeDraft>,
) -> Result<(StatusCode, Json<SuccessResponse<RecipeDetails>>), ErrorResponse> {
    let author_id = caller_id(&claims)?;
    let recipe = service(&state)
        .create(author_id, &draft)
        .await
        .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(recipe))))
}

#[tracing::instrument(skip(state, claims, patch), fields(user_id = %claims.sub))]
pub async fn update_recipe(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
    JsonBody(patch): JsonBody<RecipePatch>,
) -> Result<Json<SuccessResponse<RecipeDetails>>, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let recipe = service(&state)
        .update(user_id, id, &patch)
        .await
        .map_err(api_error)?;

    Ok(Json(SuccessResponse::new(recipe)))
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    service(&state)
        .delete(user_id, id)
        .await
        .map_err(api_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Plain-text attachment summing every ingredient in the caller's cart
#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Response, ErrorResponse> {
    let user_id = caller_id(&claims)?;
    let items = service(&state)
        .shopping_list(user_id)
        .await
        .map_err(api_error)?;

    let body = shopping_list::render_text(&items);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        shopping_list::export_filename(Utc::now())
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn add_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SuccessResponse<RecipeSummary>>), ErrorResponse> {
    add_recipe_member(&state, &claims, MembershipKind::Favorite, id).await
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    remove_recipe_member(&state, &claims, MembershipKind::Favorite, id).await
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn add_to_shopping_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<SuccessResponse<RecipeSummary>>), ErrorResponse> {
    add_recipe_member(&state, &claims, MembershipKind::ShoppingCart, id).await
}

#[tracing::instrument(skip(state, claims), fields(user_id = %claims.sub))]
pub async fn remove_from_shopping_cart(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    remove_recipe_member(&state, &claims, MembershipKind::ShoppingCart, id).await
}

async fn add_recipe_member(
    state: &AppState,
    claims: &UserClaims,
    kind: MembershipKind,
    recipe_id: Uuid,
) -> Result<(StatusCode, Json<SuccessResponse<RecipeSummary>>), ErrorResponse> {
    let user_id = caller_id(claims)?;
    let repository = MembershipRepository::new(state.db_pool.clone());

    membership::add_member(&repository, kind, user_id, recipe_id)
        .await
        .map_err(api_error)?;

    let summary = repository
        .recipe_summary(recipe_id)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(summary))))
}

async fn remove_recipe_member(
    state: &AppState,
    claims: &UserClaims,
    kind: MembershipKind,
    recipe_id: Uuid,
) -> Result<StatusCode, ErrorResponse> {
    let user_id = caller_id(claims)?;
    let repository = MembershipRepository::new(state.db_pool.clone());

    membership::remove_member(&repository, kind, user_id, recipe_id)
        .await
        .map_err(api_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Build the listing filter from decoded query pairs
fn recipe_filter(pairs: &[(String, String)]) -> Result<RecipeFilter, ErrorResponse> {
    let mut filter = RecipeFilter::default();

    for (key, value) in pairs {
        match key.as_str() {
            "tags" => {
                if !value.is_empty() && !filter.tags.contains(value) {
                    filter.tags.push(value.clone());
                }
            }
            "author" => {
                let author = Uuid::parse_str(value).map_err(|_| {
                    ErrorResponse::new("validation_error", "author must be a user id")
                })?;
                filter.author = Some(author);
            }
            "is_favorited" => filter.is_favorited = flag(value),
            "is_in_shopping_cart" => filter.is_in_shopping_cart = flag(value),
            _ => {}
        }
    }

    Ok(filter)
}

fn flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true")
}

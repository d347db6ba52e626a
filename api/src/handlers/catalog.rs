use axum::{
    extract::{Path, Query, State},
    Json,
};
use common::db::repositories::{IngredientRepository, TagRepository};
use common::models::{Ingredient, Tag};
use serde::Deserialize;
use uuid::Uuid;

use crate::handlers::{api_error, ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

#[tracing::instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse<Vec<Tag>>>, ErrorResponse> {
    let tags = TagRepository::new(state.db_pool.clone())
        .find_all()
        .await
        .map_err(api_error)?;
    Ok(Json(SuccessResponse::new(tags)))
}

#[tracing::instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<Tag>>, ErrorResponse> {
    let tag = TagRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await
        .map_err(api_error)?
        .ok_or_else(|| ErrorResponse::new("not_found", format!("Tag {} not found", id)))?;
    Ok(Json(SuccessResponse::new(tag)))
}

#[tracing::instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> Result<Json<SuccessResponse<Vec<Ingredient>>>, ErrorResponse> {
    let ingredients = IngredientRepository::new(state.db_pool.clone())
        .search(query.name.as_deref())
        .await
        .map_err(api_error)?;
    Ok(Json(SuccessResponse::new(ingredients)))
}

#[tracing::instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse<Ingredient>>, ErrorResponse> {
    let ingredient = IngredientRepository::new(state.db_pool.clone())
        .find_by_id(id)
        .await
        .map_err(api_error)?
        .ok_or_else(|| ErrorResponse::new("not_found", format!("Ingredient {} not found", id)))?;
    Ok(Json(SuccessResponse::new(ingredient)))
}

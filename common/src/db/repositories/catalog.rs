// Tag and ingredient repositories (read-only catalog)

use super::queries::{catalog_queries, escape_like};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Ingredient, Tag};
use tracing::instrument;
use uuid::Uuid;

/// Repository for tag lookups
#[derive(Clone)]
pub struct TagRepository {
    pool: DbPool,
}

impl TagRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn find_all(&self) -> Result<Vec<Tag>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM tags ORDER BY name",
            catalog_queries::SELECT_TAG_COLUMNS
        );
        let tags = sqlx::query_as::<_, Tag>(&query)
            .fetch_all(self.pool.pool())
            .await?;
        Ok(tags)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Tag>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM tags WHERE id = $1",
            catalog_queries::SELECT_TAG_COLUMNS
        );
        let tag = sqlx::query_as::<_, Tag>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(tag)
    }
}

/// Repository for ingredient lookups
#[derive(Clone)]
pub struct IngredientRepository {
    pool: DbPool,
}

impl IngredientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// List ingredients, optionally restricted to a case-insensitive name prefix
    #[instrument(skip(self))]
    pub async fn search(&self, name_prefix: Option<&str>) -> Result<Vec<Ingredient>, DatabaseError> {
        let ingredients = match name_prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(prefix) => {
                let query = format!(
                    r#"
                    SELECT {} FROM ingredients
                    WHERE LOWER(name) LIKE LOWER($1) || '%' ESCAPE '\'
                    ORDER BY name
                    "#,
                    catalog_queries::SELECT_INGREDIENT_COLUMNS
                );
                sqlx::query_as::<_, Ingredient>(&query)
                    .bind(escape_like(prefix))
                    .fetch_all(self.pool.pool())
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {} FROM ingredients ORDER BY name",
                    catalog_queries::SELECT_INGREDIENT_COLUMNS
                );
                sqlx::query_as::<_, Ingredient>(&query)
                    .fetch_all(self.pool.pool())
                    .await?
            }
        };

        tracing::debug!(count = ingredients.len(), "Searched ingredients");
        Ok(ingredients)
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Ingredient>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM ingredients WHERE id = $1",
            catalog_queries::SELECT_INGREDIENT_COLUMNS
        );
        let ingredient = sqlx::query_as::<_, Ingredient>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(ingredient)
    }
}

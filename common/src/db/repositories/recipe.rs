// Recipe repository: composed reads, filtered listing and transactional writes

use crate::composition::{CatalogSnapshot, CompositionChange};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{
    CartIngredientRow, Recipe, RecipeDetails, RecipeIngredient, Tag, UserProfile,
};
use crate::pagination::PageRequest;
use crate::recipes::RecipeStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filters accepted by the recipe listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// Tag slugs; a recipe matches when it carries any of them
    pub tags: Vec<String>,
    pub author: Option<Uuid>,
    /// Only recipes the viewer favorited; ignored for anonymous viewers
    pub is_favorited: bool,
    /// Only recipes in the viewer's cart; ignored for anonymous viewers
    pub is_in_shopping_cart: bool,
}

/// Recipe joined with its author and the viewer's flags
#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    author_id: Uuid,
    name: String,
    image: String,
    text: String,
    cooking_time: i32,
    pub_date: DateTime<Utc>,
    author_email: String,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    author_is_subscribed: bool,
    is_favorited: bool,
    is_in_shopping_cart: bool,
}

#[derive(Debug, FromRow)]
struct RecipeTagRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    color: String,
    slug: String,
}

#[derive(Debug, FromRow)]
struct RecipeIngredientRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    measurement_unit: String,
    amount: i32,
}

/// Repository for recipe-related database operations
#[derive(Clone)]
pub struct RecipeRepository {
    pool: DbPool,
}

impl RecipeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// One page of composed recipes, newest first, plus the filtered total
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &RecipeFilter,
        page: PageRequest,
        viewer: Option<Uuid>,
    ) -> Result<(Vec<RecipeDetails>, i64), DatabaseError> {
        let mut builder = select_recipes(viewer);
        push_filters(&mut builder, filter, viewer);
        builder.push(" ORDER BY r.pub_date DESC, r.id LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder
            .build_query_as::<RecipeRow>()
            .fetch_all(self.pool.pool())
            .await?;

        let mut count_builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM recipes r WHERE TRUE",
        );
        push_filters(&mut count_builder, filter, viewer);
        let count = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.pool())
            .await?;

        let recipes = self.compose(rows).await?;
        tracing::debug!(count = count, returned = recipes.len(), "Listed recipes");
        Ok((recipes, count))
    }

    /// Attach tags and ordered ingredients to a batch of recipe rows
    async fn compose(&self, rows: Vec<RecipeRow>) -> Result<Vec<RecipeDetails>, DatabaseError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let tag_rows = sqlx::query_as::<_, RecipeTagRow>(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
            FROM recipe_tags rt
            JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool.pool())
        .await?;

        let ingredient_rows = sqlx::query_as::<_, RecipeIngredientRow>(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.recipe_id, ri.position
            "#,
        )
        .bind(&ids)
        .fetch_all(self.pool.pool())
        .await?;

        let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.recipe_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
                color: row.color,
                slug: row.slug,
            });
        }

        let mut ingredients: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
        for row in ingredient_rows {
            ingredients
                .entry(row.recipe_id)
                .or_default()
                .push(RecipeIngredient {
                    id: row.id,
                    name: row.name,
                    measurement_unit: row.measurement_unit,
                    amount: row.amount,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| RecipeDetails {
                tags: tags.remove(&row.id).unwrap_or_default(),
                ingredients: ingredients.remove(&row.id).unwrap_or_default(),
                author: UserProfile {
                    id: row.author_id,
                    email: row.author_email,
                    username: row.author_username,
                    first_name: row.author_first_name,
                    last_name: row.author_last_name,
                    is_subscribed: row.author_is_subscribed,
                },
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                id: row.id,
                name: row.name,
                image: row.image,
                text: row.text,
                cooking_time: row.cooking_time,
                pub_date: row.pub_date,
            })
            .collect())
    }
}

/// SELECT over recipes joined with authors, ending in an open WHERE clause
fn select_recipes(viewer: Option<Uuid>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(
        r#"
        SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date,
            u.email AS author_email,
            u.username AS author_username,
            u.first_name AS author_first_name,
            u.last_name AS author_last_name,
            EXISTS (SELECT 1 FROM follows fo WHERE fo.author_id = r.author_id AND fo.user_id = "#,
    );
    builder.push_bind(viewer);
    builder.push(
        ") AS author_is_subscribed, EXISTS (SELECT 1 FROM favorites fa WHERE fa.recipe_id = r.id AND fa.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(
        ") AS is_favorited, EXISTS (SELECT 1 FROM shopping_cart sc WHERE sc.recipe_id = r.id AND sc.user_id = ",
    );
    builder.push_bind(viewer);
    builder.push(
        r#") AS is_in_shopping_cart
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE TRUE"#,
    );
    builder
}

fn push_filters(
    builder: &mut QueryBuilder<'static, Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
) {
    if let Some(author) = filter.author {
        builder.push(" AND r.author_id = ");
        builder.push_bind(author);
    }

    if !filter.tags.is_empty() {
        builder.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags ft JOIN tags t ON t.id = ft.tag_id \
             WHERE ft.recipe_id = r.id AND t.slug = ANY(",
        );
        builder.push_bind(filter.tags.clone());
        builder.push("))");
    }

    if let Some(viewer) = viewer {
        if filter.is_favorited {
            builder.push(
                " AND EXISTS (SELECT 1 FROM favorites ff WHERE ff.recipe_id = r.id AND ff.user_id = ",
            );
            builder.push_bind(viewer);
            builder.push(")");
        }
        if filter.is_in_shopping_cart {
            builder.push(
                " AND EXISTS (SELECT 1 FROM shopping_cart fc WHERE fc.recipe_id = r.id AND fc.user_id = ",
            );
            builder.push_bind(viewer);
            builder.push(")");
        }
    }
}

async fn insert_tags(
    conn: &mut PgConnection,
    recipe_id: Uuid,
    tags: &[Uuid],
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, UNNEST($2::uuid[])
        "#,
    )
    .bind(recipe_id)
    .bind(tags)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_ingredients(
    conn: &mut PgConnection,
    recipe_id: Uuid,
    ingredients: &[(Uuid, i32)],
) -> Result<(), DatabaseError> {
    let ids: Vec<Uuid> = ingredients.iter().map(|(id, _)| *id).collect();
    let amounts: Vec<i32> = ingredients.iter().map(|(_, amount)| *amount).collect();
    let positions: Vec<i32> = (0..ingredients.len() as i32).collect();

    sqlx::query(
        r#"
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount, position)
        SELECT $1, t.ingredient_id, t.amount, t.position
        FROM UNNEST($2::uuid[], $3::int4[], $4::int4[]) AS t(ingredient_id, amount, position)
        "#,
    )
    .bind(recipe_id)
    .bind(&ids)
    .bind(&amounts)
    .bind(&positions)
    .execute(conn)
    .await?;
    Ok(())
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, DatabaseError> {
    value.ok_or_else(|| DatabaseError::QueryFailed(format!("recipe {} is required", field)))
}

#[async_trait]
impl RecipeStore for RecipeRepository {
    #[instrument(skip(self, tag_ids, ingredient_ids))]
    async fn catalog_snapshot(
        &self,
        tag_ids: Vec<Uuid>,
        ingredient_ids: Vec<Uuid>,
    ) -> Result<CatalogSnapshot, DatabaseError> {
        let tags = sqlx::query_scalar::<_, Uuid>("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(&tag_ids)
            .fetch_all(self.pool.pool())
            .await?;
        let ingredients =
            sqlx::query_scalar::<_, Uuid>("SELECT id FROM ingredients WHERE id = ANY($1)")
                .bind(&ingredient_ids)
                .fetch_all(self.pool.pool())
                .await?;

        Ok(CatalogSnapshot::new(tags, ingredients))
    }

    #[instrument(skip(self))]
    async fn find(&self, id: Uuid) -> Result<Option<Recipe>, DatabaseError> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, author_id, name, image, text, cooking_time, pub_date
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(recipe)
    }

    #[instrument(skip(self))]
    async fn find_details(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Option<RecipeDetails>, DatabaseError> {
        let mut builder = select_recipes(viewer);
        builder.push(" AND r.id = ");
        builder.push_bind(id);

        let row = builder
            .build_query_as::<RecipeRow>()
            .fetch_optional(self.pool.pool())
            .await?;

        match row {
            Some(row) => Ok(self.compose(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Insert the recipe and all its associations in one transaction
    #[instrument(skip(self, change))]
    async fn insert(
        &self,
        author_id: Uuid,
        change: &CompositionChange,
    ) -> Result<Recipe, DatabaseError> {
        let fields = &change.fields;
        let tags = required(change.tags.as_deref(), "tags")?;
        let ingredients = required(change.ingredients.as_deref(), "ingredients")?;

        let mut tx = self.pool.pool().begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (id, author_id, name, image, text, cooking_time, pub_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, author_id, name, image, text, cooking_time, pub_date
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(author_id)
        .bind(required(fields.name.as_deref(), "name")?)
        .bind(required(fields.image.as_deref(), "image")?)
        .bind(required(fields.text.as_deref(), "text")?)
        .bind(required(fields.cooking_time, "cooking_time")?)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        insert_tags(&mut tx, recipe.id, tags).await?;
        insert_ingredients(&mut tx, recipe.id, ingredients).await?;

        tx.commit().await?;

        tracing::info!(recipe_id = %recipe.id, author_id = %author_id, "Recipe created");
        Ok(recipe)
    }

    /// Update present columns and replace provided associations in one transaction
    #[instrument(skip(self, change))]
    async fn apply_change(
        &self,
        id: Uuid,
        change: &CompositionChange,
    ) -> Result<Recipe, DatabaseError> {
        let fields = &change.fields;
        let mut tx = self.pool.pool().begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes SET
                name = COALESCE($2, name),
                image = COALESCE($3, image),
                text = COALESCE($4, text),
                cooking_time = COALESCE($5, cooking_time)
            WHERE id = $1
            RETURNING id, author_id, name, image, text, cooking_time, pub_date
            "#,
        )
        .bind(id)
        .bind(fields.name.as_deref())
        .bind(fields.image.as_deref())
        .bind(fields.text.as_deref())
        .bind(fields.cooking_time)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Recipe with id {} not found", id)))?;

        if let Some(tags) = &change.tags {
            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_tags(&mut tx, id, tags).await?;
        }

        if let Some(ingredients) = &change.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            insert_ingredients(&mut tx, id, ingredients).await?;
        }

        tx.commit().await?;

        tracing::info!(
            recipe_id = %id,
            associations = change.touches_associations(),
            "Recipe updated"
        );
        Ok(recipe)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "Recipe with id {} not found",
                id
            )));
        }

        tracing::info!(recipe_id = %id, "Recipe deleted");
        Ok(())
    }

    /// Every ingredient line of every recipe in the user's cart
    #[instrument(skip(self))]
    async fn cart_rows(&self, user_id: Uuid) -> Result<Vec<CartIngredientRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, CartIngredientRow>(
            r#"
            SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount
            FROM shopping_cart sc
            JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE sc.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(rows)
    }
}

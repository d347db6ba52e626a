// User repository implementation: accounts, public profiles and subscriptions

use super::queries::{recipe_queries, user_queries};
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{RecipeSummary, Subscription, User, UserProfile};
use crate::pagination::PageRequest;
use sqlx::FromRow;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Recipe summary tagged with its author, used to fan subscription rows out
#[derive(Debug, FromRow)]
struct AuthorRecipeRow {
    author_id: Uuid,
    id: Uuid,
    name: String,
    image: String,
    cooking_time: i32,
}

/// Repository for user-related database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, first_name, last_name,
                password_hash, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(self.pool.pool())
        .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User created");
        Ok(())
    }

    /// Find a user by email, ignoring case
    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(user)
    }

    /// Find a user by ID
    #[instrument(skip(self))]
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users WHERE id = $1",
            user_queries::SELECT_ALL_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(user)
    }

    /// Replace the stored password hash
    #[instrument(skip(self, password_hash))]
    pub async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "User with id {} not found",
                user_id
            )));
        }

        tracing::info!(user_id = %user_id, "User password updated");
        Ok(())
    }

    /// One page of public profiles as seen by `viewer`, plus the total count
    #[instrument(skip(self))]
    pub async fn list_profiles(
        &self,
        viewer: Option<Uuid>,
        page: PageRequest,
    ) -> Result<(Vec<UserProfile>, i64), DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM users u
            ORDER BY u.username
            LIMIT $2 OFFSET $3
            "#,
            user_queries::SELECT_PROFILE_COLUMNS
        );
        let profiles = sqlx::query_as::<_, UserProfile>(&query)
            .bind(viewer)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool.pool())
            .await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.pool())
            .await?;

        Ok((profiles, count))
    }

    /// Public profile of a single user as seen by `viewer`
    #[instrument(skip(self))]
    pub async fn find_profile(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Option<UserProfile>, DatabaseError> {
        let query = format!(
            "SELECT {} FROM users u WHERE u.id = $2",
            user_queries::SELECT_PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, UserProfile>(&query)
            .bind(viewer)
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await?;

        Ok(profile)
    }

    /// Authors followed by `user_id`, each with up to `recipes_limit` newest recipes
    #[instrument(skip(self))]
    pub async fn list_subscriptions(
        &self,
        user_id: Uuid,
        page: PageRequest,
        recipes_limit: Option<i64>,
    ) -> Result<(Vec<Subscription>, i64), DatabaseError> {
        let query = format!(
            r#"
            SELECT {}
            FROM follows f
            JOIN users u ON u.id = f.author_id
            WHERE f.user_id = $1
            ORDER BY u.username
            LIMIT $2 OFFSET $3
            "#,
            user_queries::SELECT_PROFILE_COLUMNS
        );
        let authors = sqlx::query_as::<_, UserProfile>(&query)
            .bind(user_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(self.pool.pool())
            .await?;

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM follows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool.pool())
            .await?;

        if authors.is_empty() {
            return Ok((Vec::new(), count));
        }

        let author_ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();

        let totals: HashMap<Uuid, i64> = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT author_id, COUNT(*)
            FROM recipes
            WHERE author_id = ANY($1)
            GROUP BY author_id
            "#,
        )
        .bind(&author_ids)
        .fetch_all(self.pool.pool())
        .await?
        .into_iter()
        .collect();

        let recipes_query = format!(
            r#"
            SELECT author_id, {}
            FROM (
                SELECT r.*, ROW_NUMBER() OVER (
                    PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id
                ) AS rn
                FROM recipes r
                WHERE r.author_id = ANY($1)
            ) ranked
            WHERE $2::bigint IS NULL OR rn <= $2
            ORDER BY author_id, rn
            "#,
            recipe_queries::SELECT_SUMMARY_COLUMNS
        );
        let rows = sqlx::query_as::<_, AuthorRecipeRow>(&recipes_query)
            .bind(&author_ids)
            .bind(recipes_limit)
            .fetch_all(self.pool.pool())
            .await?;

        let mut recipes_by_author: HashMap<Uuid, Vec<RecipeSummary>> = HashMap::new();
        for row in rows {
            recipes_by_author
                .entry(row.author_id)
                .or_default()
                .push(RecipeSummary {
                    id: row.id,
                    name: row.name,
                    image: row.image,
                    cooking_time: row.cooking_time,
                });
        }

        let subscriptions = authors
            .into_iter()
            .map(|author| Subscription {
                recipes: recipes_by_author.remove(&author.id).unwrap_or_default(),
                recipes_count: totals.get(&author.id).copied().unwrap_or(0),
                author,
            })
            .collect();

        Ok((subscriptions, count))
    }
}

// Recipe write side: validate, check ownership, then hand the change to the store

use crate::composition::{self, CatalogSnapshot, CompositionChange, RecipeDraft, RecipePatch};
use crate::errors::{DatabaseError, RecipeError, ValidationError};
use crate::models::{CartIngredientRow, Recipe, RecipeDetails};
use crate::shopping_list::{self, ShoppingListItem};
use crate::telemetry;
use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

/// Persistence operations the recipe service needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Which of the given tag and ingredient ids exist
    async fn catalog_snapshot(
        &self,
        tag_ids: Vec<Uuid>,
        ingredient_ids: Vec<Uuid>,
    ) -> Result<CatalogSnapshot, DatabaseError>;

    async fn find(&self, id: Uuid) -> Result<Option<Recipe>, DatabaseError>;

    async fn find_details(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Option<RecipeDetails>, DatabaseError>;

    async fn insert(
        &self,
        author_id: Uuid,
        change: &CompositionChange,
    ) -> Result<Recipe, DatabaseError>;

    async fn apply_change(
        &self,
        id: Uuid,
        change: &CompositionChange,
    ) -> Result<Recipe, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn cart_rows(&self, user_id: Uuid) -> Result<Vec<CartIngredientRow>, DatabaseError>;
}

pub struct RecipeService<S> {
    store: S,
}

impl<S: RecipeStore> RecipeService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate and store a new recipe authored by `author_id`
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(
        &self,
        author_id: Uuid,
        draft: &RecipeDraft,
    ) -> Result<RecipeDetails, RecipeError> {
        let catalog = self
            .store
            .catalog_snapshot(draft.tags.clone(), draft.referenced_ingredients())
            .await?;
        let change = composition::validate_draft(draft, &catalog)?;

        let recipe = self
            .store
            .insert(author_id, &change)
            .await
            .map_err(stale_catalog)?;
        telemetry::record_recipe_created(&recipe.id);

        self.details(recipe.id, author_id).await
    }

    /// Apply a partial update; only the author may change a recipe
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        user_id: Uuid,
        recipe_id: Uuid,
        patch: &RecipePatch,
    ) -> Result<RecipeDetails, RecipeError> {
        self.owned_by(user_id, recipe_id).await?;

        let catalog = self
            .store
            .catalog_snapshot(
                patch.referenced_tags().to_vec(),
                patch.referenced_ingredients(),
            )
            .await?;
        let change = composition::validate_patch(patch, &catalog)?;

        self.store
            .apply_change(recipe_id, &change)
            .await
            .map_err(|e| not_found_as_recipe(e, recipe_id))?;

        self.details(recipe_id, user_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Uuid, recipe_id: Uuid) -> Result<(), RecipeError> {
        self.owned_by(user_id, recipe_id).await?;
        self.store
            .delete(recipe_id)
            .await
            .map_err(|e| not_found_as_recipe(e, recipe_id))
    }

    /// Aggregated shopping list for everything in the user's cart
    #[instrument(skip(self))]
    pub async fn shopping_list(&self, user_id: Uuid) -> Result<Vec<ShoppingListItem>, RecipeError> {
        let rows = self.store.cart_rows(user_id).await?;
        let items = shopping_list::aggregate(rows);

        telemetry::record_shopping_list_export(items.len());
        tracing::info!(user_id = %user_id, items = items.len(), "Shopping list built");
        Ok(items)
    }

    async fn owned_by(&self, user_id: Uuid, recipe_id: Uuid) -> Result<Recipe, RecipeError> {
        let recipe = self
            .store
            .find(recipe_id)
            .await?
            .ok_or(RecipeError::NotFound(recipe_id))?;

        if recipe.author_id != user_id {
            tracing::warn!(user_id = %user_id, recipe_id = %recipe_id, "Non-author tried to modify recipe");
            return Err(RecipeError::NotAuthor(recipe_id));
        }
        Ok(recipe)
    }

    async fn details(&self, recipe_id: Uuid, viewer: Uuid) -> Result<RecipeDetails, RecipeError> {
        self.store
            .find_details(recipe_id, Some(viewer))
            .await?
            .ok_or(RecipeError::NotFound(recipe_id))
    }
}

fn not_found_as_recipe(err: DatabaseError, recipe_id: Uuid) -> RecipeError {
    match err {
        DatabaseError::NotFound(_) => RecipeError::NotFound(recipe_id),
        other => stale_catalog(other),
    }
}

/// A tag or ingredient deleted between the catalog snapshot and the write
fn stale_catalog(err: DatabaseError) -> RecipeError {
    match err {
        DatabaseError::ForeignKeyViolation(message) => {
            let field = if message.contains("recipe_tags") {
                "tags"
            } else {
                "ingredients"
            };
            tracing::warn!(field, error = %message, "Catalog changed during recipe write");
            ValidationError::invalid(field, "A referenced entry no longer exists.").into()
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::IngredientAmountInput;
    use crate::models::UserProfile;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn recipe(id: Uuid, author_id: Uuid) -> Recipe {
        Recipe {
            id,
            author_id,
            name: "Porridge".to_string(),
            image: "data:image/png;base64,AAAA".to_string(),
            text: "Boil oats.".to_string(),
            cooking_time: 10,
            pub_date: Utc::now(),
        }
    }

    fn details(recipe: &Recipe) -> RecipeDetails {
        RecipeDetails {
            id: recipe.id,
            tags: vec![],
            author: UserProfile {
                id: recipe.author_id,
                email: "cook@example.com".to_string(),
                username: "cook".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                is_subscribed: false,
            },
            ingredients: vec![],
            is_favorited: false,
            is_in_shopping_cart: false,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            text: recipe.text.clone(),
            cooking_time: recipe.cooking_time,
            pub_date: recipe.pub_date,
        }
    }

    fn draft(tag: Uuid, ingredient: Uuid) -> RecipeDraft {
        RecipeDraft {
            tags: vec![tag],
            ingredients: vec![IngredientAmountInput {
                id: ingredient,
                amount: 200,
            }],
            name: "Porridge".to_string(),
            text: "Boil oats.".to_string(),
            cooking_time: 10,
            image: "data:image/png;base64,AAAA".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_stores_validated_change() {
        let (author, tag, ingredient, id) =
            (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let stored = recipe(id, author);
        let expected = details(&stored);

        let mut store = MockRecipeStore::new();
        store
            .expect_catalog_snapshot()
            .returning(move |_, _| Ok(CatalogSnapshot::new([tag], [ingredient])));
        store
            .expect_insert()
            .withf(move |a, change| {
                *a == author && change.ingredients.as_deref() == Some(&[(ingredient, 200)][..])
            })
            .times(1)
            .returning(move |_, _| Ok(stored.clone()));
        store
            .expect_find_details()
            .with(eq(id), eq(Some(author)))
            .returning(move |_, _| Ok(Some(expected.clone())));

        let service = RecipeService::new(store);
        let created = service.create(author, &draft(tag, ingredient)).await.unwrap();
        assert_eq!(created.id, id);
    }

    #[tokio::test]
    async fn test_create_with_unknown_tag_writes_nothing() {
        let mut store = MockRecipeStore::new();
        store
            .expect_catalog_snapshot()
            .returning(|_, ingredients| Ok(CatalogSnapshot::new(Vec::new(), ingredients)));
        store.expect_insert().never();

        let service = RecipeService::new(store);
        let result = service
            .create(Uuid::new_v4(), &draft(Uuid::new_v4(), Uuid::new_v4()))
            .await;
        assert!(matches!(result, Err(RecipeError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_racing_ingredient_delete_is_validation_error() {
        let (tag, ingredient) = (Uuid::new_v4(), Uuid::new_v4());
        let mut store = MockRecipeStore::new();
        store
            .expect_catalog_snapshot()
            .returning(move |_, _| Ok(CatalogSnapshot::new([tag], [ingredient])));
        store.expect_insert().returning(|_, _| {
            Err(DatabaseError::ForeignKeyViolation(
                "insert or update on table \"recipe_ingredients\" violates foreign key constraint"
                    .into(),
            ))
        });
        store.expect_find_details().never();

        let service = RecipeService::new(store);
        let result = service.create(Uuid::new_v4(), &draft(tag, ingredient)).await;
        match result {
            Err(RecipeError::Validation(err)) => {
                assert!(err.details().get("ingredients").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn test_update_racing_tag_delete_is_validation_error() {
        let (author, id, tag) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let stored = recipe(id, author);

        let mut store = MockRecipeStore::new();
        store
            .expect_find()
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_catalog_snapshot()
            .returning(move |_, _| Ok(CatalogSnapshot::new([tag], Vec::new())));
        store.expect_apply_change().returning(|_, _| {
            Err(DatabaseError::ForeignKeyViolation(
                "insert or update on table \"recipe_tags\" violates foreign key constraint".into(),
            ))
        });

        let service = RecipeService::new(store);
        let patch = RecipePatch {
            tags: Some(vec![tag]),
            ..Default::default()
        };
        match service.update(author, id, &patch).await {
            Err(RecipeError::Validation(err)) => {
                assert!(err.details().get("tags").is_some());
            }
            other => panic!("expected validation error, got {:?}", other.map(|r| r.id)),
        }
    }

    #[tokio::test]
    async fn test_update_by_non_author_is_forbidden() {
        let (author, intruder, id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let stored = recipe(id, author);

        let mut store = MockRecipeStore::new();
        store
            .expect_find()
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_apply_change().never();

        let service = RecipeService::new(store);
        let patch = RecipePatch {
            name: Some("Stolen".to_string()),
            ..Default::default()
        };
        let result = service.update(intruder, id, &patch).await;
        assert!(matches!(result, Err(RecipeError::NotAuthor(r)) if r == id));
    }

    #[tokio::test]
    async fn test_delete_missing_recipe_is_not_found() {
        let mut store = MockRecipeStore::new();
        store.expect_find().returning(|_| Ok(None));
        store.expect_delete().never();

        let service = RecipeService::new(store);
        let id = Uuid::new_v4();
        let result = service.delete(Uuid::new_v4(), id).await;
        assert!(matches!(result, Err(RecipeError::NotFound(r)) if r == id));
    }

    #[tokio::test]
    async fn test_delete_by_author() {
        let (author, id) = (Uuid::new_v4(), Uuid::new_v4());
        let stored = recipe(id, author);

        let mut store = MockRecipeStore::new();
        store
            .expect_find()
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_delete()
            .with(eq(id))
            .times(1)
            .returning(|_| Ok(()));

        let service = RecipeService::new(store);
        assert!(service.delete(author, id).await.is_ok());
    }

    #[tokio::test]
    async fn test_shopping_list_sums_cart_rows() {
        let flour = Uuid::new_v4();
        let mut store = MockRecipeStore::new();
        store.expect_cart_rows().returning(move |_| {
            Ok(vec![
                CartIngredientRow {
                    ingredient_id: flour,
                    name: "Flour".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 300,
                },
                CartIngredientRow {
                    ingredient_id: flour,
                    name: "Flour".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 200,
                },
            ])
        });

        let service = RecipeService::new(store);
        let items = service.shopping_list(Uuid::new_v4()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_amount, 500);
    }
}

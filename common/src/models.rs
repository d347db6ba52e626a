use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// User Models
// ============================================================================

/// User represents a registered account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// UserClaims represents JWT token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserClaims {
    pub sub: String,      // Subject (user ID)
    pub email: String,    // Login field
    pub username: String, // Display name
    pub exp: i64,         // Expiration time (Unix timestamp)
    pub iat: i64,         // Issued at (Unix timestamp)
}

impl UserClaims {
    /// Parse the subject claim back into a user id
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Public view of a user, with the caller's subscription flag
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

// ============================================================================
// Catalog Models
// ============================================================================

/// Tag groups recipes (breakfast, dinner, ...)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// Ingredient with its measurement unit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

// ============================================================================
// Recipe Models
// ============================================================================

/// Recipe row as stored, without its associations
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Ingredient amount inside a recipe, joined with the ingredient
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// Fully composed recipe as returned by the read side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDetails {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Short recipe card used by favorites, cart and subscription listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// Followed author with a (possibly truncated) list of their recipes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub author: UserProfile,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: i64,
}

/// One raw row feeding the shopping-list aggregator
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct CartIngredientRow {
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_claims_user_id() {
        let id = Uuid::new_v4();
        let claims = UserClaims {
            sub: id.to_string(),
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.user_id(), Some(id));
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "cook@example.com".to_string(),
            username: "cook".to_string(),
            first_name: "Ann".to_string(),
            last_name: "Cook".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "cook@example.com");
    }

    #[test]
    fn test_subscription_flattens_author() {
        let sub = Subscription {
            author: UserProfile {
                id: Uuid::new_v4(),
                email: "chef@example.com".to_string(),
                username: "chef".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                is_subscribed: true,
            },
            recipes: vec![],
            recipes_count: 3,
        };
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["username"], "chef");
        assert_eq!(json["recipes_count"], 3);
        assert_eq!(json["is_subscribed"], true);
    }
}

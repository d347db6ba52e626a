// Repository layer for database operations

pub mod catalog;
pub mod membership;
pub mod queries;
pub mod recipe;
pub mod user;

pub use catalog::{IngredientRepository, TagRepository};
pub use membership::MembershipRepository;
pub use recipe::{RecipeFilter, RecipeRepository};
pub use user::UserRepository;

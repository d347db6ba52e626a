// Recipe composition: payload validation and the change set written by the repository
//
// Validation is pure. The repository loads which of the referenced tag and
// ingredient ids exist into a `CatalogSnapshot`, then the validated
// `CompositionChange` is applied inside a single transaction.

use crate::errors::{FieldErrors, ValidationError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

pub const MAX_NAME_LENGTH: usize = 200;
pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 32_000;
pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 32_000;

lazy_static! {
    static ref IMAGE_DATA_URI: Regex =
        Regex::new(r"^data:image/(png|jpe?g|gif|webp);base64,[A-Za-z0-9+/]+={0,2}$")
            .expect("image data URI pattern is valid");
}

/// `{ "id": ..., "amount": ... }` entry of a recipe payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngredientAmountInput {
    pub id: Uuid,
    pub amount: i64,
}

/// Payload for creating a recipe; every field is required
///
/// Missing fields deserialize to empty values so that validation reports
/// them together with every other problem, keyed by field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeDraft {
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<IngredientAmountInput>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
    pub image: String,
}

/// Payload for updating a recipe; absent fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipePatch {
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<IngredientAmountInput>>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
    pub image: Option<String>,
}

impl RecipePatch {
    pub fn referenced_tags(&self) -> &[Uuid] {
        self.tags.as_deref().unwrap_or(&[])
    }

    pub fn referenced_ingredients(&self) -> Vec<Uuid> {
        self.ingredients
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|item| item.id)
            .collect()
    }
}

impl RecipeDraft {
    pub fn referenced_ingredients(&self) -> Vec<Uuid> {
        self.ingredients.iter().map(|item| item.id).collect()
    }
}

/// Which of the referenced catalog ids actually exist
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub tags: HashSet<Uuid>,
    pub ingredients: HashSet<Uuid>,
}

impl CatalogSnapshot {
    pub fn new(
        tags: impl IntoIterator<Item = Uuid>,
        ingredients: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        Self {
            tags: tags.into_iter().collect(),
            ingredients: ingredients.into_iter().collect(),
        }
    }
}

/// Scalar recipe columns to write; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFields {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<String>,
}

/// Validated change set applied by the composition writer
///
/// `tags`/`ingredients` set to `Some` replace the stored associations
/// wholesale. Ingredient order is preserved as the stored position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionChange {
    pub fields: RecipeFields,
    pub tags: Option<Vec<Uuid>>,
    pub ingredients: Option<Vec<(Uuid, i32)>>,
}

impl CompositionChange {
    pub fn touches_associations(&self) -> bool {
        self.tags.is_some() || self.ingredients.is_some()
    }
}

/// Validate a create payload against the catalog
pub fn validate_draft(
    draft: &RecipeDraft,
    catalog: &CatalogSnapshot,
) -> Result<CompositionChange, ValidationError> {
    let mut errors = FieldErrors::new();

    let tags = check_tags(&draft.tags, catalog, &mut errors);
    let ingredients = check_ingredients(&draft.ingredients, catalog, &mut errors);
    let cooking_time = check_cooking_time(draft.cooking_time, &mut errors);
    let name = check_name(&draft.name, &mut errors);
    let text = check_text(&draft.text, &mut errors);
    let image = check_image(&draft.image, &mut errors);

    errors.into_result()?;

    Ok(CompositionChange {
        fields: RecipeFields {
            name,
            text,
            cooking_time,
            image,
        },
        tags,
        ingredients,
    })
}

/// Validate an update payload; only present fields are checked
pub fn validate_patch(
    patch: &RecipePatch,
    catalog: &CatalogSnapshot,
) -> Result<CompositionChange, ValidationError> {
    let mut errors = FieldErrors::new();

    let tags = patch
        .tags
        .as_ref()
        .and_then(|tags| check_tags(tags, catalog, &mut errors));
    let ingredients = patch
        .ingredients
        .as_ref()
        .and_then(|items| check_ingredients(items, catalog, &mut errors));
    let cooking_time = patch
        .cooking_time
        .and_then(|minutes| check_cooking_time(minutes, &mut errors));
    let name = patch
        .name
        .as_ref()
        .and_then(|name| check_name(name, &mut errors));
    let text = patch
        .text
        .as_ref()
        .and_then(|text| check_text(text, &mut errors));
    let image = patch
        .image
        .as_ref()
        .and_then(|image| check_image(image, &mut errors));

    errors.into_result()?;

    Ok(CompositionChange {
        fields: RecipeFields {
            name,
            text,
            cooking_time,
            image,
        },
        tags,
        ingredients,
    })
}

fn check_tags(
    tags: &[Uuid],
    catalog: &CatalogSnapshot,
    errors: &mut FieldErrors,
) -> Option<Vec<Uuid>> {
    if tags.is_empty() {
        errors.add("tags", "Select at least one tag.");
        return None;
    }

    let mut seen = HashSet::with_capacity(tags.len());
    let mut ok = true;
    for id in tags {
        if !seen.insert(*id) {
            errors.add("tags", format!("Tag {} is listed more than once.", id));
            ok = false;
        } else if !catalog.tags.contains(id) {
            errors.add("tags", format!("Tag {} does not exist.", id));
            ok = false;
        }
    }

    ok.then(|| tags.to_vec())
}

fn check_ingredients(
    items: &[IngredientAmountInput],
    catalog: &CatalogSnapshot,
    errors: &mut FieldErrors,
) -> Option<Vec<(Uuid, i32)>> {
    if items.is_empty() {
        errors.add("ingredients", "Add at least one ingredient.");
        return None;
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut amounts = Vec::with_capacity(items.len());
    let mut ok = true;
    for item in items {
        if !seen.insert(item.id) {
            errors.add(
                "ingredients",
                format!("Ingredient {} is listed more than once.", item.id),
            );
            ok = false;
            continue;
        }
        if !catalog.ingredients.contains(&item.id) {
            errors.add(
                "ingredients",
                format!("Ingredient {} does not exist.", item.id),
            );
            ok = false;
            continue;
        }
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&item.amount) {
            errors.add(
                "ingredients",
                format!(
                    "Amount of ingredient {} must be between {} and {}.",
                    item.id, MIN_AMOUNT, MAX_AMOUNT
                ),
            );
            ok = false;
            continue;
        }
        amounts.push((item.id, item.amount as i32));
    }

    ok.then_some(amounts)
}

fn check_cooking_time(minutes: i64, errors: &mut FieldErrors) -> Option<i32> {
    if !(MIN_COOKING_TIME..=MAX_COOKING_TIME).contains(&minutes) {
        errors.add(
            "cooking_time",
            format!(
                "Cooking time must be between {} and {} minutes.",
                MIN_COOKING_TIME, MAX_COOKING_TIME
            ),
        );
        return None;
    }
    Some(minutes as i32)
}

fn check_name(name: &str, errors: &mut FieldErrors) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        errors.add("name", "Name cannot be blank.");
        return None;
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        errors.add(
            "name",
            format!("Name cannot be longer than {} characters.", MAX_NAME_LENGTH),
        );
        return None;
    }
    Some(trimmed.to_string())
}

fn check_text(text: &str, errors: &mut FieldErrors) -> Option<String> {
    if text.trim().is_empty() {
        errors.add("text", "Description cannot be blank.");
        return None;
    }
    Some(text.to_string())
}

fn check_image(image: &str, errors: &mut FieldErrors) -> Option<String> {
    if !IMAGE_DATA_URI.is_match(image) {
        errors.add("image", "Image must be a base64 encoded data URI.");
        return None;
    }
    Some(image.to_string())
}

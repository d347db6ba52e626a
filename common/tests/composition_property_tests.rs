// Property-based tests for recipe composition validation

use common::composition::{
    validate_draft, validate_patch, CatalogSnapshot, IngredientAmountInput, RecipeDraft,
    RecipePatch, MAX_AMOUNT, MAX_COOKING_TIME,
};
use common::errors::ValidationError;
use proptest::prelude::*;
use uuid::Uuid;

const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

fn uuids(count: usize) -> Vec<Uuid> {
    (0..count).map(|_| Uuid::new_v4()).collect()
}

fn draft(tags: Vec<Uuid>, ingredients: Vec<IngredientAmountInput>, cooking_time: i64) -> RecipeDraft {
    RecipeDraft {
        tags,
        ingredients,
        name: "Pancakes".to_string(),
        text: "Mix and fry.".to_string(),
        cooking_time,
        image: IMAGE.to_string(),
    }
}

fn failing_fields(result: Result<impl std::fmt::Debug, ValidationError>) -> Vec<String> {
    match result {
        Err(ValidationError::Fields(errors)) => errors.fields().map(str::to_string).collect(),
        other => panic!("expected field errors, got {:?}", other),
    }
}

// A well-formed draft over existing catalog entries is accepted and keeps
// ingredient order and amounts exactly as submitted.
#[test]
fn property_valid_draft_preserves_ingredient_order() {
    proptest!(|(
        tag_count in 1usize..5,
        amounts in prop::collection::vec(1i64..=MAX_AMOUNT, 1..10),
        cooking_time in 1i64..=MAX_COOKING_TIME,
    )| {
        let tags = uuids(tag_count);
        let ingredient_ids = uuids(amounts.len());
        let catalog = CatalogSnapshot::new(tags.clone(), ingredient_ids.clone());
        let items: Vec<IngredientAmountInput> = ingredient_ids
            .iter()
            .zip(&amounts)
            .map(|(id, amount)| IngredientAmountInput { id: *id, amount: *amount })
            .collect();

        let change = validate_draft(&draft(tags.clone(), items, cooking_time), &catalog)
            .expect("valid draft should pass");

        let expected: Vec<(Uuid, i32)> = ingredient_ids
            .iter()
            .zip(&amounts)
            .map(|(id, amount)| (*id, *amount as i32))
            .collect();
        prop_assert_eq!(change.ingredients, Some(expected));
        prop_assert_eq!(change.tags, Some(tags));
        prop_assert_eq!(change.fields.cooking_time, Some(cooking_time as i32));
    });
}

// Any amount outside 1..=32000 rejects the ingredients field.
#[test]
fn property_out_of_range_amount_is_rejected() {
    proptest!(|(
        amount in prop_oneof![i64::MIN..1i64, (MAX_AMOUNT + 1)..i64::MAX],
    )| {
        let tag = Uuid::new_v4();
        let ingredient = Uuid::new_v4();
        let catalog = CatalogSnapshot::new([tag], [ingredient]);
        let items = vec![IngredientAmountInput { id: ingredient, amount }];

        let fields = failing_fields(validate_draft(&draft(vec![tag], items, 10), &catalog));
        prop_assert_eq!(fields, vec!["ingredients".to_string()]);
    });
}

// Listing the same ingredient twice is rejected regardless of amounts.
#[test]
fn property_duplicate_ingredient_is_rejected() {
    proptest!(|(first in 1i64..=MAX_AMOUNT, second in 1i64..=MAX_AMOUNT)| {
        let tag = Uuid::new_v4();
        let ingredient = Uuid::new_v4();
        let catalog = CatalogSnapshot::new([tag], [ingredient]);
        let items = vec![
            IngredientAmountInput { id: ingredient, amount: first },
            IngredientAmountInput { id: ingredient, amount: second },
        ];

        let fields = failing_fields(validate_draft(&draft(vec![tag], items, 10), &catalog));
        prop_assert!(fields.contains(&"ingredients".to_string()));
    });
}

// Cooking times outside 1..=32000 are rejected on create and update alike.
#[test]
fn property_cooking_time_bounds() {
    proptest!(|(
        minutes in prop_oneof![i64::MIN..1i64, (MAX_COOKING_TIME + 1)..i64::MAX],
    )| {
        let tag = Uuid::new_v4();
        let ingredient = Uuid::new_v4();
        let catalog = CatalogSnapshot::new([tag], [ingredient]);
        let items = vec![IngredientAmountInput { id: ingredient, amount: 1 }];

        let fields = failing_fields(validate_draft(&draft(vec![tag], items, minutes), &catalog));
        prop_assert_eq!(fields, vec!["cooking_time".to_string()]);

        let patch = RecipePatch { cooking_time: Some(minutes), ..Default::default() };
        let fields = failing_fields(validate_patch(&patch, &CatalogSnapshot::default()));
        prop_assert_eq!(fields, vec!["cooking_time".to_string()]);
    });
}

// A patch that only renames touches no associations.
#[test]
fn property_name_only_patch_keeps_associations() {
    proptest!(|(name in "[A-Za-z][A-Za-z ]{0,50}")| {
        let patch = RecipePatch { name: Some(name.clone()), ..Default::default() };
        let change = validate_patch(&patch, &CatalogSnapshot::default())
            .expect("name-only patch should pass");

        prop_assert!(!change.touches_associations());
        prop_assert_eq!(change.fields.name, Some(name.trim().to_string()));
        prop_assert!(change.fields.text.is_none());
    });
}

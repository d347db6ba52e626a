// Shopping-list aggregation over the recipes in a user's cart

use crate::models::CartIngredientRow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use uuid::Uuid;

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";

/// One deduplicated line of the shopping list
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

/// Group cart rows by ingredient and sum their amounts
///
/// The result is sorted by case-insensitive name, ties broken by id, so the
/// export is stable regardless of row order.
pub fn aggregate<I>(rows: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = CartIngredientRow>,
{
    let mut by_ingredient: HashMap<Uuid, ShoppingListItem> = HashMap::new();

    for row in rows {
        by_ingredient
            .entry(row.ingredient_id)
            .and_modify(|item| item.total_amount += i64::from(row.amount))
            .or_insert_with(|| ShoppingListItem {
                ingredient_id: row.ingredient_id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                total_amount: i64::from(row.amount),
            });
    }

    let mut items: Vec<ShoppingListItem> = by_ingredient.into_values().collect();
    items.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.ingredient_id.cmp(&b.ingredient_id))
    });
    items
}

/// Render the plain-text export
pub fn render_text(items: &[ShoppingListItem]) -> String {
    let mut out = String::new();
    out.push_str(SHOPPING_LIST_HEADER);
    out.push('\n');
    for item in items {
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{} ({}) - {}",
            item.name, item.measurement_unit, item.total_amount
        );
    }
    out
}

/// Attachment file name for an export generated at `at`
pub fn export_filename(at: DateTime<Utc>) -> String {
    format!("shoplist_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: Uuid, name: &str, unit: &str, amount: i32) -> CartIngredientRow {
        CartIngredientRow {
            ingredient_id: id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn test_amounts_of_same_ingredient_are_summed() {
        let flour = Uuid::new_v4();
        let eggs = Uuid::new_v4();
        let items = aggregate(vec![
            row(flour, "flour", "g", 200),
            row(eggs, "eggs", "pcs", 2),
            row(flour, "flour", "g", 350),
        ]);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "eggs");
        assert_eq!(items[0].total_amount, 2);
        assert_eq!(items[1].name, "flour");
        assert_eq!(items[1].total_amount, 550);
    }

    #[test]
    fn test_empty_cart_renders_header_only() {
        let items = aggregate(Vec::new());
        assert!(items.is_empty());
        assert_eq!(render_text(&items), "Shopping list\n");
    }

    #[test]
    fn test_render_lists_name_unit_and_total() {
        let salt = Uuid::new_v4();
        let text = render_text(&aggregate(vec![row(salt, "salt", "g", 5), row(salt, "salt", "g", 7)]));
        assert_eq!(text, "Shopping list\nsalt (g) - 12\n");
    }

    #[test]
    fn test_sum_does_not_overflow_i32() {
        let water = Uuid::new_v4();
        let items = aggregate(vec![
            row(water, "water", "ml", i32::MAX),
            row(water, "water", "ml", i32::MAX),
        ]);
        assert_eq!(items[0].total_amount, 2 * i64::from(i32::MAX));
    }

    #[test]
    fn test_export_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(export_filename(at), "shoplist_20240309_070501.txt");
    }
}

// SQL query constants for repositories
// Centralizes repeated SELECT column lists

/// SQL query fragments for users table
pub mod user_queries {
    pub const SELECT_ALL_COLUMNS: &str =
        "id, email, username, first_name, last_name, password_hash, created_at";

    /// Public profile of `u` plus whether viewer `$1` follows them
    pub const SELECT_PROFILE_COLUMNS: &str = r#"u.id, u.email, u.username, u.first_name, u.last_name,
        EXISTS (
            SELECT 1 FROM follows fo WHERE fo.author_id = u.id AND fo.user_id = $1
        ) AS is_subscribed"#;
}

/// SQL query fragments for tags and ingredients
pub mod catalog_queries {
    pub const SELECT_TAG_COLUMNS: &str = "id, name, color, slug";
    pub const SELECT_INGREDIENT_COLUMNS: &str = "id, name, measurement_unit";
}

/// SQL query fragments for recipes
pub mod recipe_queries {
    pub const SELECT_SUMMARY_COLUMNS: &str = "id, name, image, cooking_time";
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

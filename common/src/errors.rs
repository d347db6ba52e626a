// Error handling framework
// Domain errors are thiserror enums; the API layer maps them to HTTP envelopes.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Field-keyed validation failures collected from a single payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Convert into `Err(ValidationError::Fields)` when anything was recorded
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields(self))
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.errors).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Invalid payload: {0}")]
    Fields(FieldErrors),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Structured details for the API error envelope
    pub fn details(&self) -> serde_json::Value {
        let single = |field: &str, message: &str| {
            let mut map = serde_json::Map::new();
            map.insert(field.to_string(), serde_json::json!([message]));
            serde_json::Value::Object(map)
        };

        match self {
            ValidationError::InvalidFieldValue { field, reason } => single(field, reason),
            ValidationError::Fields(errors) => errors.to_json(),
        }
    }
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// Authentication and authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Recipe composition and ownership errors
#[derive(Error, Debug)]
pub enum RecipeError {
    #[error("Recipe not found: {0}")]
    NotFound(Uuid),

    #[error("Only the author can modify recipe {0}")]
    NotAuthor(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Favorite, shopping cart and subscription toggle errors
#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("{0}")]
    TargetNotFound(String),

    #[error("{0}")]
    AlreadyPresent(String),

    #[error("{0}")]
    NotPresent(String),

    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// API response error type for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let details = err.details();
        ApiError::new("validation_error", err.to_string()).with_details(details)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::new("not_found", msg),
            DatabaseError::DuplicateKey(msg) => ApiError::new("conflict", msg),
            other => ApiError::new("database_error", other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidToken(_) | AuthError::TokenExpired => {
                ApiError::new("unauthorized", err.to_string())
            }
            AuthError::UserNotFound(_) => ApiError::new("not_found", err.to_string()),
            AuthError::UserExists(_) => ApiError::new("validation_error", err.to_string()),
            AuthError::Validation(inner) => inner.into(),
            AuthError::AuthenticationFailed(_) => ApiError::new("auth_error", err.to_string()),
        }
    }
}

impl From<RecipeError> for ApiError {
    fn from(err: RecipeError) -> Self {
        match err {
            RecipeError::NotFound(_) => ApiError::new("not_found", err.to_string()),
            RecipeError::NotAuthor(_) => ApiError::new("forbidden", err.to_string()),
            RecipeError::Validation(inner) => inner.into(),
            RecipeError::Database(inner) => inner.into(),
        }
    }
}

impl From<MembershipError> for ApiError {
    fn from(err: MembershipError) -> Self {
        match err {
            MembershipError::TargetNotFound(_) => ApiError::new("not_found", err.to_string()),
            MembershipError::AlreadyPresent(_)
            | MembershipError::NotPresent(_)
            | MembershipError::SelfSubscription => {
                ApiError::new("validation_error", err.to_string())
            }
            MembershipError::Database(inner) => inner.into(),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(err.to_string())
    }
}

impl From<sqlx::Error> for RecipeError {
    fn from(err: sqlx::Error) -> Self {
        RecipeError::Database(err.into())
    }
}

impl From<sqlx::Error> for MembershipError {
    fn from(err: sqlx::Error) -> Self {
        MembershipError::Database(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_collects_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("tags", "Select at least one tag.");
        errors.add("ingredients", "Duplicate ingredient.");
        errors.add("ingredients", "Amount must be at least 1.");

        assert_eq!(errors.messages("ingredients").len(), 2);
        assert!(errors.contains("tags"));
        assert!(!errors.contains("name"));
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["ingredients", "tags"]);
    }

    #[test]
    fn test_empty_field_errors_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_validation_error_details_are_keyed_by_field() {
        let mut errors = FieldErrors::new();
        errors.add("cooking_time", "Must be at least 1 minute.");
        let err = errors.into_result().unwrap_err();
        let details = err.details();
        assert_eq!(details["cooking_time"][0], "Must be at least 1 minute.");
    }

    #[test]
    fn test_auth_error_to_api_error() {
        let api_err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(api_err.code, "unauthorized");
    }

    #[test]
    fn test_recipe_not_author_is_forbidden() {
        let api_err: ApiError = RecipeError::NotAuthor(Uuid::new_v4()).into();
        assert_eq!(api_err.code, "forbidden");
    }

    #[test]
    fn test_membership_duplicate_is_bad_request() {
        let api_err: ApiError =
            MembershipError::AlreadyPresent("Recipe is already in favorites".to_string()).into();
        assert_eq!(api_err.code, "validation_error");
        assert_eq!(api_err.message, "Recipe is already in favorites");
    }

    #[test]
    fn test_api_error_with_details() {
        let err = ApiError::new("TEST_ERROR", "Test message")
            .with_details(serde_json::json!({"field": "value"}));
        assert!(err.details.is_some());
    }
}

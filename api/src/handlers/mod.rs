pub mod auth;
pub mod catalog;
pub mod health;
pub mod metrics;
pub mod recipes;
pub mod users;

// Common response types
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::errors::ApiError;
use common::models::UserClaims;
use common::pagination::PageParams;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Standard API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub trace_id: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            trace_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn status(&self) -> StatusCode {
        match self.error.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        let response = ErrorResponse::new(err.code, err.message);
        match err.details {
            Some(details) => response.with_details(details),
            None => response,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                error = %self.error,
                message = %self.message,
                trace_id = %self.trace_id,
                "Request failed"
            );
        }

        (status, Json(self)).into_response()
    }
}

/// Standard API success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for SuccessResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// JSON body extractor whose rejections use the error envelope
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ErrorResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ErrorResponse::from(rejection)),
        }
    }
}

impl From<JsonRejection> for ErrorResponse {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        ErrorResponse::new("validation_error", rejection.body_text())
    }
}

/// Map any domain error into the HTTP error envelope
pub fn api_error<E: Into<ApiError>>(err: E) -> ErrorResponse {
    ErrorResponse::from(err.into())
}

/// Authenticated caller's id; the auth middleware only admits parseable subjects
pub fn caller_id(claims: &UserClaims) -> Result<Uuid, ErrorResponse> {
    claims
        .user_id()
        .ok_or_else(|| ErrorResponse::new("unauthorized", "Invalid token subject"))
}

/// Caller's id when a valid token was presented
pub fn viewer_id(claims: Option<&UserClaims>) -> Option<Uuid> {
    claims.and_then(UserClaims::user_id)
}

/// Read `page`/`limit` out of decoded query pairs
pub fn page_params(pairs: &[(String, String)]) -> Result<PageParams, ErrorResponse> {
    let mut params = PageParams::default();
    for (key, value) in pairs {
        match key.as_str() {
            "page" => params.page = Some(parse_positive(key, value)?),
            "limit" => params.limit = Some(parse_positive(key, value)?),
            _ => {}
        }
    }
    Ok(params)
}

pub fn parse_positive(key: &str, value: &str) -> Result<u32, ErrorResponse> {
    value
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| {
            ErrorResponse::new(
                "validation_error",
                format!("{} must be a positive integer", key),
            )
        })
}

/// Raw query string without `page`/`limit`, kept encoded for pagination links
pub fn passthrough_query(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .split('&')
        .filter(|part| !part.is_empty())
        .filter(|part| {
            let key = part.split('=').next().unwrap_or_default();
            key != "page" && key != "limit"
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_status() {
        assert_eq!(
            ErrorResponse::new("validation_error", "x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ErrorResponse::new("forbidden", "x").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ErrorResponse::new("database_error", "x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_details_survive() {
        let api = ApiError::new("validation_error", "bad").with_details(serde_json::json!({
            "tags": ["Select at least one tag."]
        }));
        let response = ErrorResponse::from(api);
        assert_eq!(response.error, "validation_error");
        assert!(response.details.is_some());
    }

    #[test]
    fn test_page_params_rejects_zero() {
        let pairs = vec![("page".to_string(), "0".to_string())];
        assert!(page_params(&pairs).is_err());
    }

    #[test]
    fn test_page_params_ignores_filters() {
        let pairs = vec![
            ("tags".to_string(), "lunch".to_string()),
            ("limit".to_string(), "3".to_string()),
        ];
        let params = page_params(&pairs).unwrap();
        assert_eq!(params.limit, Some(3));
        assert_eq!(params.page, None);
    }

    #[test]
    fn test_passthrough_query_drops_pagination() {
        assert_eq!(
            passthrough_query(Some("page=2&tags=lunch&limit=6&tags=dinner")),
            "tags=lunch&tags=dinner"
        );
        assert_eq!(passthrough_query(None), "");
    }

    proptest::proptest! {
        #[test]
        fn prop_passthrough_keeps_only_filters(
            parts in proptest::collection::vec(
                (
                    proptest::sample::select(vec!["page", "limit", "tags", "author"]),
                    "[a-z0-9]{1,8}",
                ),
                0..12,
            )
        ) {
            let raw = parts
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect::<Vec<_>>()
                .join("&");
            let kept = passthrough_query(Some(&raw));

            let expected: Vec<String> = parts
                .iter()
                .filter(|(key, _)| *key != "page" && *key != "limit")
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            proptest::prop_assert_eq!(kept, expected.join("&"));
        }
    }
}

use axum::{extract::State, http::StatusCode, Extension, Json};
use common::auth::DatabaseAuthService;
use common::db::repositories::UserRepository;
use common::models::UserClaims;
use serde::{Deserialize, Serialize};

use crate::handlers::{api_error, ErrorResponse, JsonBody, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub auth_token: String,
}

/// Exchange email and password for a bearer token
#[tracing::instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<SuccessResponse<LoginResponse>>, ErrorResponse> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Email and password are required",
        ));
    }

    let auth_service = DatabaseAuthService::new(
        state.jwt_service.clone(),
        UserRepository::new(state.db_pool.clone()),
    );

    let auth_token = auth_service
        .login(req.email.trim(), &req.password)
        .await
        .map_err(api_error)?;

    Ok(Json(SuccessResponse::new(LoginResponse { auth_token })))
}

/// Tokens are stateless JWTs; logout is acknowledged so clients can drop theirs
#[tracing::instrument(skip(claims), fields(user_id = %claims.sub))]
pub async fn logout(Extension(claims): Extension<UserClaims>) -> StatusCode {
    tracing::info!(user_id = %claims.sub, "User logged out");
    StatusCode::NO_CONTENT
}

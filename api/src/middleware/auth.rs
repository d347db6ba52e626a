use axum::{
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::errors::ApiError;
use common::models::UserClaims;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// Resolve the bearer token, if any, into `UserClaims`
///
/// Requests without an Authorization header pass through anonymously. A
/// header that is present but malformed, forged or expired is rejected.
#[tracing::instrument(skip(state, req, next))]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !req.headers().contains_key(AUTHORIZATION) {
        return next.run(req).await;
    }

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let claims = match bearer_claims(&state, header) {
        Ok(claims) => claims,
        Err(response) => return response.into_response(),
    };

    req.extensions_mut().insert(claims);
    next.run(req).await
}

/// Reject anonymous requests; runs after `auth_middleware`
#[tracing::instrument(skip(req, next))]
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    if req.extensions().get::<UserClaims>().is_none() {
        return ErrorResponse::new("unauthorized", "Authentication credentials were not provided")
            .into_response();
    }
    next.run(req).await
}

fn bearer_claims(state: &AppState, header: Option<&str>) -> Result<UserClaims, ErrorResponse> {
    let token = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::warn!("Invalid authorization header format");
            ErrorResponse::new("unauthorized", "Invalid authorization header")
        })?;

    let claims = state
        .jwt_service
        .decode_token(token)
        .map_err(|e| ErrorResponse::from(ApiError::from(e)))?;

    if claims.user_id().is_none() {
        tracing::warn!(sub = %claims.sub, "Token subject is not a user id");
        return Err(ErrorResponse::new("unauthorized", "Invalid token subject"));
    }

    Ok(claims)
}

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{auth_middleware, require_auth};
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Read-only and sign-up routes, open to anonymous callers
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/auth/token/login/", post(handlers::auth::login))
        .route(
            "/api/users/",
            get(handlers::users::list_users).post(handlers::users::register),
        )
        .route("/api/users/:id/", get(handlers::users::get_user))
        .route("/api/tags/", get(handlers::catalog::list_tags))
        .route("/api/tags/:id/", get(handlers::catalog::get_tag))
        .route("/api/ingredients/", get(handlers::catalog::list_ingredients))
        .route(
            "/api/ingredients/:id/",
            get(handlers::catalog::get_ingredient),
        )
        .route("/api/recipes/", get(handlers::recipes::list_recipes))
        .route("/api/recipes/:id/", get(handlers::recipes::get_recipe));

    // Writes and per-user routes (authentication required)
    let protected_routes = Router::new()
        .route("/api/auth/token/logout/", post(handlers::auth::logout))
        .route("/api/users/me/", get(handlers::users::me))
        .route(
            "/api/users/set_password/",
            post(handlers::users::set_password),
        )
        .route(
            "/api/users/subscriptions/",
            get(handlers::users::subscriptions),
        )
        .route(
            "/api/users/:id/subscribe/",
            post(handlers::users::subscribe).delete(handlers::users::unsubscribe),
        )
        .route("/api/recipes/", post(handlers::recipes::create_recipe))
        .route(
            "/api/recipes/download_shopping_cart/",
            get(handlers::recipes::download_shopping_cart),
        )
        .route(
            "/api/recipes/:id/",
            axum::routing::patch(handlers::recipes::update_recipe)
                .delete(handlers::recipes::delete_recipe),
        )
        .route(
            "/api/recipes/:id/favorite/",
            post(handlers::recipes::add_favorite).delete(handlers::recipes::remove_favorite),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            post(handlers::recipes::add_to_shopping_cart)
                .delete(handlers::recipes::remove_from_shopping_cart),
        )
        .route_layer(axum::middleware::from_fn(require_auth));

    // Metrics endpoint (no authentication for Prometheus scraping)
    let metrics_routes = Router::new().route("/metrics", get(handlers::metrics::metrics_handler));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        .with_state(state)
}

use std::sync::Arc;

use common::auth::JwtService;
use common::config::Settings;
use common::db::DbPool;
use metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub config: Arc<Settings>,
    pub jwt_service: JwtService,
    /// Absent when no recorder was installed (tests)
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(
        db_pool: DbPool,
        config: Settings,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let jwt_service = JwtService::new(
            &config.auth.jwt_secret,
            config.auth.jwt_expiration_hours,
        );

        Self {
            db_pool,
            config: Arc::new(config),
            jwt_service,
            metrics_handle,
        }
    }
}

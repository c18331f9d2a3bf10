use std::sync::Arc;

use sqlx::PgPool;

use crate::applications::ApplicationService;
use crate::config::Config;
use crate::jobs::JobService;
use crate::matching::MatchingOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every collaborator is built once in `main` and handed to the services explicitly.
#[derive(Clone)]
pub struct AppState {
    /// Used directly only by the readiness probe; services go through `ApplicationStore`.
    pub db: PgPool,
    pub config: Config,
    pub applications: Arc<ApplicationService>,
    pub jobs: Arc<JobService>,
    pub matching: Arc<MatchingOrchestrator>,
}

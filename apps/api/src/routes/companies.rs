use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ledger::AuditReport;
use crate::state::AppState;

/// GET /api/v1/companies/:id/audit
/// Recounts the company's records against its stored counters.
pub async fn handle_audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditReport>, AppError> {
    Ok(Json(state.jobs.audit(id).await?))
}

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::{MatchRequest, MatchSession};
use crate::models::job::{Job, JobStatus, NewJob};
use crate::routes::upload;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateJobStatusRequest {
    pub status: JobStatus,
}

/// POST /api/v1/jobs/match
/// Multipart: `companyId`, `interests` (JSON array of 1 to 5 strings), `resume` file.
pub async fn handle_match(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MatchSession>, AppError> {
    let mut company_id = None;
    let mut interests: Option<Vec<String>> = None;
    let mut resume = None;

    while let Some(field) = upload::next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "companyId" => {
                company_id = Some(upload::uuid("companyId", &upload::text(field).await?)?)
            }
            "interests" => {
                interests = Some(upload::json("interests", &upload::text(field).await?)?)
            }
            "resume" => resume = Some(upload::resume(field).await?),
            _ => {}
        }
    }

    let resume = upload::required("resume", resume)?;
    let request = MatchRequest {
        company_id: upload::required("companyId", company_id)?,
        resume: resume.bytes,
        content_type: resume.content_type,
        interests: upload::required("interests", interests)?,
    };
    Ok(Json(state.matching.match_jobs(request).await?))
}

/// POST /api/v1/jobs
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<NewJob>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let job = state.jobs.create(req).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.get(id).await?))
}

/// PATCH /api/v1/jobs/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobStatusRequest>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.jobs.update_status(id, req.status).await?))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.jobs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

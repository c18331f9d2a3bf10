use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::applications::{Submission, SubmissionReceipt};
use crate::errors::AppError;
use crate::lifecycle::EligibilityCheck;
use crate::models::application::{
    ApplicantFields, Application, ApplicationFilters, ApplicationStatus,
};
use crate::routes::upload;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/v1/applications
/// Multipart: `jobId`, `applicationData` (JSON applicant fields), optional `resume` file.
pub async fn handle_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    let mut job_id = None;
    let mut fields: Option<ApplicantFields> = None;
    let mut resume = None;

    while let Some(field) = upload::next_field(&mut multipart).await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "jobId" => job_id = Some(upload::uuid("jobId", &upload::text(field).await?)?),
            "applicationData" => {
                fields = Some(upload::json("applicationData", &upload::text(field).await?)?)
            }
            "resume" => resume = Some(upload::resume(field).await?),
            _ => {}
        }
    }

    let submission = Submission {
        job_id: upload::required("jobId", job_id)?,
        fields: upload::required("applicationData", fields)?,
        // Browsers send an empty part for an untouched file input
        resume: resume.filter(|r| !r.bytes.is_empty()),
    };
    let receipt = state.applications.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/v1/applications?companyId&jobId&status&processingStatus&limit
pub async fn handle_list(
    State(state): State<AppState>,
    Query(filters): Query<ApplicationFilters>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(state.applications.list(filters).await?))
}

/// GET /api/v1/applications/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(state.applications.get(id).await?))
}

/// GET /api/v1/applications/:id/track
pub async fn handle_track(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(state.applications.track(id).await?))
}

/// PATCH /api/v1/applications/:id
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Application>, AppError> {
    let app = state
        .applications
        .update_status(id, req.status, req.notes)
        .await?;
    Ok(Json(app))
}

/// DELETE /api/v1/applications/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.applications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/applications/:id/eligibility
pub async fn handle_eligibility(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EligibilityCheck>, AppError> {
    Ok(Json(state.applications.check_eligibility(id).await?))
}

/// POST /api/v1/applications/:id/invite
pub async fn handle_manual_invite(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EligibilityCheck>, AppError> {
    Ok(Json(state.applications.send_manual_invite(id).await?))
}

/// POST /api/v1/applications/:id/interview/complete
pub async fn handle_complete_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EligibilityCheck>, AppError> {
    Ok(Json(state.applications.complete_interview(id).await?))
}

//! Multipart helpers shared by the submission and matching endpoints.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::applications::ResumeUpload;
use crate::errors::AppError;

fn malformed(e: MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {e}"))
}

pub async fn next_field(multipart: &mut Multipart) -> Result<Option<Field<'_>>, AppError> {
    multipart.next_field().await.map_err(malformed)
}

pub async fn text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(malformed)
}

pub async fn resume(field: Field<'_>) -> Result<ResumeUpload, AppError> {
    let file_name = field.file_name().unwrap_or("resume").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field.bytes().await.map_err(malformed)?;
    Ok(ResumeUpload {
        bytes,
        file_name,
        content_type,
    })
}

pub fn uuid(name: &str, raw: &str) -> Result<Uuid, AppError> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Validation(format!("'{name}' must be a UUID")))
}

pub fn json<T: DeserializeOwned>(name: &str, raw: &str) -> Result<T, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::Validation(format!("'{name}' is not valid JSON: {e}")))
}

pub fn required<T>(name: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("'{name}' is required")))
}

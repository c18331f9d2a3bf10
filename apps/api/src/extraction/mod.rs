//! Extraction Service: résumé bytes → `CandidateProfile`.
//!
//! `extract` never fails. An unreadable document becomes a `failed` profile, too little
//! text becomes `text-only`, and an unavailable model leaves the text without structure.
//! The caller decides what to do with low-confidence output.

pub mod prompts;
pub mod text;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{call_json, LanguageModel};
use crate::models::profile::CandidateProfile;
use validation::RawExtraction;

pub const UNSUPPORTED_WORD_FORMAT: &str =
    "DOC/DOCX files are not yet supported. Please upload a PDF version of your resume.";
pub const INSUFFICIENT_TEXT: &str = "Could not extract sufficient text from the document. \
    Please ensure the PDF is not scanned or image-based.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFormat {
    Pdf,
    Doc,
    Docx,
}

impl ResumeFormat {
    pub fn from_mime(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/pdf" => Some(ResumeFormat::Pdf),
            "application/msword" => Some(ResumeFormat::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(ResumeFormat::Docx)
            }
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ResumeFormat::Pdf => "application/pdf",
            ResumeFormat::Doc => "application/msword",
            ResumeFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ResumeFormat::Pdf => "pdf",
            ResumeFormat::Doc => "doc",
            ResumeFormat::Docx => "docx",
        }
    }
}

/// Why an uploaded résumé was refused at the boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("resume file is empty")]
    Empty,

    #[error("resume is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported resume type '{0}'. Please upload a PDF, DOC, or DOCX file")]
    UnsupportedType(String),
}

/// Size and type check shared by submission and matching.
pub fn check_upload(
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> Result<ResumeFormat, UploadRejection> {
    if size == 0 {
        return Err(UploadRejection::Empty);
    }
    if size > max_bytes {
        return Err(UploadRejection::TooLarge {
            size,
            max: max_bytes,
        });
    }
    ResumeFormat::from_mime(content_type)
        .ok_or_else(|| UploadRejection::UnsupportedType(content_type.to_string()))
}

pub struct ResumeExtractor {
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ResumeExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    pub async fn extract(&self, bytes: Bytes, format: ResumeFormat) -> CandidateProfile {
        let raw_text = match format {
            ResumeFormat::Pdf => match read_pdf(bytes).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("PDF text extraction failed: {e}");
                    return CandidateProfile::failed(format!("Could not read PDF: {e}"));
                }
            },
            ResumeFormat::Doc | ResumeFormat::Docx => {
                return CandidateProfile::failed(UNSUPPORTED_WORD_FORMAT);
            }
        };

        let resume_text = text::normalize(&raw_text);
        if !text::is_sufficient(&resume_text) {
            let mut profile =
                CandidateProfile::text_only(resume_text, Some(INSUFFICIENT_TEXT.to_string()));
            profile.confidence = 0;
            return profile;
        }

        self.structure(resume_text).await
    }

    /// Adds validated structured fields to already-normalized text.
    pub async fn structure(&self, resume_text: String) -> CandidateProfile {
        let prompt = prompts::extraction_prompt(&resume_text);
        let result = call_json::<RawExtraction>(
            self.llm.as_ref(),
            &prompt,
            prompts::EXTRACTION_SYSTEM,
            self.timeout,
        )
        .await;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Structured extraction unavailable, keeping text only: {e}");
                return CandidateProfile::text_only(
                    resume_text,
                    Some(format!("Structured extraction unavailable: {e}")),
                );
            }
        };

        let validated = validation::validate(raw);
        info!(
            chars = resume_text.len(),
            quality = ?validated.quality,
            confidence = validated.confidence,
            "Extracted resume"
        );

        CandidateProfile {
            resume_text,
            structured: validated.structured,
            parsing_quality: validated.quality,
            confidence: validated.confidence,
            parsed_at: Utc::now(),
            parsing_error: None,
        }
    }
}

/// PDF parsing is CPU-bound, so it runs on the blocking pool.
async fn read_pdf(bytes: Bytes) -> Result<String, String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| format!("extraction task failed: {e}"))?
        .map_err(|e| e.to_string())
}

//! `v1-simple-llm` and `v2-enhanced-llm` strategies.
//!
//! The model's JSON is untrusted: it is parsed into a loose shape, validated, and only
//! then turned into a `FitScoreBreakdown`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::llm_client::{call_json, LanguageModel};
use crate::models::job::Job;
use crate::models::profile::CandidateProfile;
use crate::scoring::breakdown::{
    clamp_score, ComponentScores, ComponentWeights, FitScoreBreakdown, Recommendation,
    ScoreComponent, ScoringMethod, ScoringVersion,
};
use crate::scoring::prompts;
use crate::scoring::{ScoringContext, ScoringError, ScoringStrategy};

const V2_QUALIFICATION_WEIGHT: f32 = 0.3;
const V2_RELEVANCE_WEIGHT: f32 = 0.7;
const MAX_LIST_ITEMS: usize = 25;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    overall_score: Option<f64>,
    #[serde(default)]
    skills_matched: Vec<String>,
    #[serde(default)]
    skills_missing: Vec<String>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    component_scores: Option<RawComponents>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComponents {
    relevance_score: Option<f64>,
    qualification_score: Option<f64>,
    skills_score: Option<f64>,
    experience_score: Option<f64>,
    education_score: Option<f64>,
}

pub struct LlmScorer {
    llm: Arc<dyn LanguageModel>,
    version: ScoringVersion,
    timeout: Duration,
}

impl LlmScorer {
    pub fn simple(llm: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            llm,
            version: ScoringVersion::V1SimpleLlm,
            timeout,
        }
    }

    pub fn enhanced(llm: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            llm,
            version: ScoringVersion::V2EnhancedLlm,
            timeout,
        }
    }

    fn prompt(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        ctx: &ScoringContext,
    ) -> (String, &'static str) {
        match self.version {
            ScoringVersion::V2EnhancedLlm => {
                let summary = ctx
                    .application_form
                    .as_ref()
                    .and_then(|f| f.summary_for_scoring());
                (
                    prompts::enhanced_fit_prompt(profile, job, summary.as_deref()),
                    prompts::ENHANCED_SYSTEM,
                )
            }
            _ => (prompts::simple_fit_prompt(profile, job), prompts::SIMPLE_SYSTEM),
        }
    }

    fn validate(&self, raw: RawAnalysis) -> Result<FitScoreBreakdown, ScoringError> {
        let overall = finite(raw.overall_score, "overallScore")?;

        let (component_scores, weights) = match self.version {
            ScoringVersion::V2EnhancedLlm => {
                let raw_components = raw.component_scores.unwrap_or_default();
                let relevance = finite(raw_components.relevance_score, "relevanceScore")?;
                let qualification =
                    finite(raw_components.qualification_score, "qualificationScore")?;

                let mut components = ComponentScores::from([
                    (ScoreComponent::Relevance, clamp_score(relevance)),
                    (ScoreComponent::Qualification, clamp_score(qualification)),
                ]);
                for (key, value) in [
                    (ScoreComponent::Skills, raw_components.skills_score),
                    (ScoreComponent::Experience, raw_components.experience_score),
                    (ScoreComponent::Education, raw_components.education_score),
                ] {
                    if let Some(v) = value.filter(|v| v.is_finite()) {
                        components.insert(key, clamp_score(v as f32));
                    }
                }
                let weights = ComponentWeights::from([
                    (ScoreComponent::Qualification, V2_QUALIFICATION_WEIGHT),
                    (ScoreComponent::Relevance, V2_RELEVANCE_WEIGHT),
                ]);
                (Some(components), Some(weights))
            }
            _ => (None, None),
        };

        let overall_score = clamp_score(overall);
        Ok(FitScoreBreakdown {
            overall_score,
            recommendation: Recommendation::from_score(overall_score),
            skills_matched: tidy(raw.skills_matched),
            skills_missing: tidy(raw.skills_missing),
            strengths: tidy(raw.strengths),
            concerns: tidy(raw.concerns),
            reasoning: raw.reasoning.trim().to_string(),
            component_scores,
            scoring_method: Some(ScoringMethod::llm(self.version, weights)),
        })
    }
}

fn finite(value: Option<f64>, field: &str) -> Result<f32, ScoringError> {
    value
        .filter(|v| v.is_finite())
        .map(|v| v as f32)
        .ok_or_else(|| ScoringError::InvalidResponse(format!("missing or invalid {field}")))
}

fn tidy(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect()
}

#[async_trait]
impl ScoringStrategy for LlmScorer {
    fn version(&self) -> ScoringVersion {
        self.version
    }

    async fn score(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        ctx: &ScoringContext,
    ) -> Result<FitScoreBreakdown, ScoringError> {
        if profile.resume_text.trim().is_empty() && ctx.application_form.is_none() {
            return Err(ScoringError::InsufficientInput(
                "no candidate text to score".to_string(),
            ));
        }

        let (prompt, system) = self.prompt(profile, job, ctx);
        let raw: RawAnalysis = call_json(self.llm.as_ref(), &prompt, system, self.timeout).await?;
        self.validate(raw)
    }
}

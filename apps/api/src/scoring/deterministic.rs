//! `v3-deterministic`: rule-based weighted scoring.
//!
//! Same input, same output: no clock, no randomness, no external calls. Components the
//! inputs cannot support (no required years, no degree on either side) are left out and
//! the remaining weights are renormalised, so a sparse posting is not punished for its own gaps.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::models::job::Job;
use crate::models::profile::{CandidateProfile, EducationLevel};
use crate::scoring::breakdown::{
    clamp_score, weighted_overall, ComponentScores, ComponentWeights, FitScoreBreakdown,
    Recommendation, ScoreComponent, ScoringMethod, ScoringVersion,
};
use crate::scoring::title_match::{self, match_title};
use crate::scoring::{ScoringContext, ScoringError, ScoringStrategy};

/// Listed skill match counts fully; a mention only in the résumé text counts partially.
const LISTED_SKILL_STRENGTH: f32 = 1.0;
const MENTIONED_SKILL_STRENGTH: f32 = 0.6;
/// Points lost per education level below the requirement.
const EDUCATION_GAP_PENALTY: f32 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub skills: f32,
    pub experience: f32,
    pub education: f32,
    pub keywords: f32,
    pub relevance: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            skills: 0.30,
            experience: 0.25,
            education: 0.15,
            keywords: 0.15,
            relevance: 0.15,
        }
    }
}

impl ScoringWeights {
    #[cfg(test)]
    pub fn equal() -> Self {
        Self {
            skills: 0.2,
            experience: 0.2,
            education: 0.2,
            keywords: 0.2,
            relevance: 0.2,
        }
    }

    pub fn weight(&self, component: ScoreComponent) -> f32 {
        match component {
            ScoreComponent::Skills => self.skills,
            ScoreComponent::Experience => self.experience,
            ScoreComponent::Education => self.education,
            ScoreComponent::Keywords => self.keywords,
            ScoreComponent::Relevance => self.relevance,
            ScoreComponent::Qualification => 0.0,
        }
    }
}

pub struct DeterministicScorer {
    weights: ScoringWeights,
}

impl DeterministicScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn evaluate(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        ctx: &ScoringContext,
    ) -> FitScoreBreakdown {
        let evidence = Evidence::gather(profile, ctx);
        let mut report = Report::default();

        score_skills(job, &evidence, &mut report);
        score_experience(job, &evidence, &mut report);
        score_education(job, &evidence, &mut report);
        score_keywords(job, &evidence, &mut report);
        score_relevance(job, profile, ctx, &mut report);

        let weights: ComponentWeights = report
            .components
            .keys()
            .map(|k| (*k, self.weights.weight(*k)))
            .filter(|(_, w)| *w > 0.0)
            .collect();

        let overall = weighted_overall(&report.components, &weights)
            .map(clamp_score)
            .unwrap_or(0);
        if weights.is_empty() {
            report
                .concerns
                .push("Not enough information in the résumé or posting to assess fit".into());
        }

        let recommendation = Recommendation::from_score(overall);
        let reasoning = summarize(job, overall, &report);

        FitScoreBreakdown {
            overall_score: overall,
            recommendation,
            skills_matched: report.matched,
            skills_missing: report.missing,
            strengths: report.strengths,
            concerns: report.concerns,
            reasoning,
            component_scores: Some(report.components),
            scoring_method: Some(ScoringMethod::deterministic(weights)),
        }
    }
}

#[async_trait]
impl ScoringStrategy for DeterministicScorer {
    fn version(&self) -> ScoringVersion {
        ScoringVersion::V3Deterministic
    }

    async fn score(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        ctx: &ScoringContext,
    ) -> Result<FitScoreBreakdown, ScoringError> {
        Ok(self.evaluate(profile, job, ctx))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Evidence: everything the candidate side offers, lowercased once
// ────────────────────────────────────────────────────────────────────────────

struct Evidence {
    text: String,
    skills: Vec<String>,
    years: Option<f32>,
    education: Option<EducationLevel>,
}

impl Evidence {
    fn gather(profile: &CandidateProfile, ctx: &ScoringContext) -> Self {
        let mut text = profile.resume_text.to_lowercase();
        let mut skills: Vec<String> = profile.skills().iter().map(|s| s.to_lowercase()).collect();
        let mut education = profile.education_level();

        if let Some(form) = &ctx.application_form {
            skills.extend(form.skills.iter().map(|s| s.name.to_lowercase()));
            education = form
                .education
                .iter()
                .filter_map(|e| EducationLevel::detect(&e.degree))
                .chain(education)
                .max();
            if let Some(summary) = form.summary_for_scoring() {
                text.push('\n');
                text.push_str(&summary.to_lowercase());
            }
        }

        Self {
            text,
            skills,
            years: profile.total_years(),
            education,
        }
    }

    fn lists_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill)
    }
}

#[derive(Default)]
struct Report {
    components: ComponentScores,
    matched: Vec<String>,
    missing: Vec<String>,
    strengths: Vec<String>,
    concerns: Vec<String>,
}

/// Whole-term mention check: "r" must not match inside "manager".
fn mentions(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let is_word = |c: Option<char>| c.map_or(false, |c| c.is_alphanumeric());
    text.match_indices(term).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + term.len()..].chars().next();
        !is_word(before) && !is_word(after)
    })
}

fn percent(numerator: f32, denominator: f32) -> u8 {
    clamp_score(numerator / denominator * 100.0)
}

// ────────────────────────────────────────────────────────────────────────────
// Components
// ────────────────────────────────────────────────────────────────────────────

fn score_skills(job: &Job, evidence: &Evidence, report: &mut Report) {
    // Case-insensitive dedupe; the first spelling is the one reported
    let mut seen = HashSet::new();
    let required: Vec<&str> = job
        .required_skills
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .collect();
    if required.is_empty() {
        return;
    }

    let mut total = 0.0_f32;
    for skill in &required {
        let key = skill.to_lowercase();
        if evidence.lists_skill(&key) {
            total += LISTED_SKILL_STRENGTH;
            report.matched.push(skill.to_string());
        } else if mentions(&evidence.text, &key) {
            total += MENTIONED_SKILL_STRENGTH;
            report.matched.push(skill.to_string());
        } else {
            report.missing.push(skill.to_string());
        }
    }

    let score = percent(total, required.len() as f32);
    report.components.insert(ScoreComponent::Skills, score);
    if report.missing.is_empty() {
        report.strengths.push("Covers every required skill".into());
    } else {
        report
            .concerns
            .push(format!("Missing required skills: {}", report.missing.join(", ")));
    }
}

fn score_experience(job: &Job, evidence: &Evidence, report: &mut Report) {
    let Some(required) = job.required_years() else {
        return;
    };
    let Some(years) = evidence.years else {
        report
            .concerns
            .push(format!("Could not confirm the {required} years of experience required"));
        return;
    };

    let score = if required <= 0.0 {
        100
    } else {
        percent(years.min(required), required)
    };
    report.components.insert(ScoreComponent::Experience, score);
    if years >= required {
        report
            .strengths
            .push(format!("{years} years of experience meets the {required} year requirement"));
    } else {
        report
            .concerns
            .push(format!("{years} years of experience against {required} required"));
    }
}

fn score_education(job: &Job, evidence: &Evidence, report: &mut Report) {
    let Some(required) = job.required_education() else {
        return;
    };
    let Some(level) = evidence.education else {
        report.concerns.push(format!(
            "No {} degree found for an education requirement",
            required.as_str()
        ));
        return;
    };

    let gap = required.rank().saturating_sub(level.rank()) as f32;
    let score = clamp_score(100.0 - EDUCATION_GAP_PENALTY * gap);
    report.components.insert(ScoreComponent::Education, score);
    if gap == 0.0 {
        report.strengths.push("Meets the education requirement".into());
    } else {
        report.concerns.push(format!(
            "Education below the {} level requested",
            required.as_str()
        ));
    }
}

fn score_keywords(job: &Job, evidence: &Evidence, report: &mut Report) {
    let lowered_title = job.title.to_lowercase();
    let keywords: Vec<String> = if job.search_keywords.is_empty() {
        title_match::keywords(&lowered_title)
            .into_iter()
            .map(String::from)
            .collect()
    } else {
        job.search_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    };
    if keywords.is_empty() {
        return;
    }

    let found = keywords
        .iter()
        .filter(|k| evidence.lists_skill(k) || mentions(&evidence.text, k))
        .count();
    report
        .components
        .insert(ScoreComponent::Keywords, percent(found as f32, keywords.len() as f32));
}

fn score_relevance(job: &Job, profile: &CandidateProfile, ctx: &ScoringContext, report: &mut Report) {
    let targets: Vec<String> = if ctx.interests.is_empty() {
        profile.position_titles().into_iter().map(String::from).collect()
    } else {
        ctx.interests.clone()
    };
    let Some(title) = match_title(&job.title, &targets) else {
        return;
    };

    report.components.insert(ScoreComponent::Relevance, title.score);
    if title.score >= 85 {
        report.strengths.push(title.reasoning());
    }
}

fn summarize(job: &Job, overall: u8, report: &Report) -> String {
    let assessed: Vec<&str> = report
        .components
        .keys()
        .map(|k| match k {
            ScoreComponent::Skills => "skills",
            ScoreComponent::Experience => "experience",
            ScoreComponent::Education => "education",
            ScoreComponent::Keywords => "keywords",
            ScoreComponent::Relevance => "role relevance",
            ScoreComponent::Qualification => "qualifications",
        })
        .collect();

    let mut summary = format!(
        "Rule-based score of {overall} for {} based on {}.",
        job.title,
        if assessed.is_empty() {
            "no assessable criteria".to_string()
        } else {
            assessed.join(", ")
        }
    );
    if !report.matched.is_empty() {
        summary.push_str(&format!(" Matched skills: {}.", report.matched.join(", ")));
    }
    if !report.missing.is_empty() {
        summary.push_str(&format!(" Missing: {}.", report.missing.join(", ")));
    }
    summary
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::job::JobStatus;
    use crate::models::profile::{
        EducationSummary, ExperienceSummary, ParsingQuality, Position, StructuredProfile,
    };

    fn job(required_skills: &[&str]) -> Job {
        Job {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            company_name: "Acme".into(),
            title: "Data Analyst".into(),
            description: "Analyse data".into(),
            category: None,
            requirements: vec![],
            responsibilities: vec![],
            required_skills: required_skills.iter().map(|s| s.to_string()).collect(),
            search_keywords: vec![],
            min_years_experience: None,
            education_level: None,
            requires_resume: true,
            status: JobStatus::Active,
            applicants: 0,
            posted_at: None,
            created_at: Utc::now(),
            last_modified: Utc::now(),
        }
    }

    fn profile(skills: &[&str], text: &str) -> CandidateProfile {
        CandidateProfile {
            resume_text: text.into(),
            structured: Some(StructuredProfile {
                skills: skills.iter().map(|s| s.to_string()).collect(),
                experience: ExperienceSummary {
                    total_years: Some(4.0),
                    positions: vec![Position {
                        title: "Data Analyst".into(),
                        company: "Initech".into(),
                        duration: None,
                    }],
                },
                education: EducationSummary {
                    level: Some(EducationLevel::Bachelor),
                    degree: None,
                    field: None,
                },
                ..Default::default()
            }),
            parsing_quality: ParsingQuality::Full,
            confidence: 90,
            parsed_at: Utc::now(),
            parsing_error: None,
        }
    }

    #[test]
    fn test_skills_component_two_of_three() {
        let scorer = DeterministicScorer::new(ScoringWeights::equal());
        let breakdown = scorer.evaluate(
            &profile(&["Python", "SQL"], "Built reporting pipelines."),
            &job(&["Python", "SQL", "AWS"]),
            &ScoringContext::default(),
        );

        assert_eq!(breakdown.skills_matched, vec!["Python", "SQL"]);
        assert_eq!(breakdown.skills_missing, vec!["AWS"]);
        let components = breakdown.component_scores.as_ref().unwrap();
        assert_eq!(components[&ScoreComponent::Skills], 67);
        assert!(breakdown.is_consistent());
    }

    #[test]
    fn test_required_skills_dedupe_case_insensitively() {
        let scorer = DeterministicScorer::new(ScoringWeights::equal());
        let breakdown = scorer.evaluate(
            &profile(&["Python"], ""),
            &job(&["Python", "python ", "SQL"]),
            &ScoringContext::default(),
        );

        assert_eq!(breakdown.skills_matched, vec!["Python"]);
        assert_eq!(breakdown.skills_missing, vec!["SQL"]);
        let components = breakdown.component_scores.unwrap();
        assert_eq!(components[&ScoreComponent::Skills], 50);
    }

    #[test]
    fn test_text_mention_counts_partially() {
        let scorer = DeterministicScorer::new(ScoringWeights::equal());
        let breakdown = scorer.evaluate(
            &profile(&[], "Deployed services on AWS and wrote SQL daily."),
            &job(&["AWS", "SQL"]),
            &ScoringContext::default(),
        );
        let components = breakdown.component_scores.unwrap();
        assert_eq!(components[&ScoreComponent::Skills], 60);
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let scorer = DeterministicScorer::new(ScoringWeights::default());
        let p = profile(&["Python"], "Python and Excel reporting");
        let j = job(&["Python", "Excel", "Tableau"]);
        let ctx = ScoringContext::default();
        assert_eq!(scorer.evaluate(&p, &j, &ctx), scorer.evaluate(&p, &j, &ctx));
    }

    #[test]
    fn test_experience_and_education_components() {
        let mut j = job(&[]);
        j.min_years_experience = Some(8.0);
        j.education_level = Some(EducationLevel::Master);
        let scorer = DeterministicScorer::new(ScoringWeights::default());
        let b = scorer.evaluate(&profile(&[], "analyst"), &j, &ScoringContext::default());
        let components = b.component_scores.as_ref().unwrap();
        assert_eq!(components[&ScoreComponent::Experience], 50);
        assert_eq!(components[&ScoreComponent::Education], 60);
        assert!(b.is_consistent());
    }

    #[test]
    fn test_unassessable_components_are_omitted() {
        let scorer = DeterministicScorer::new(ScoringWeights::default());
        let mut p = profile(&[], "");
        p.structured = None;
        let b = scorer.evaluate(&p, &job(&[]), &ScoringContext::default());
        let components = b.component_scores.as_ref().unwrap();
        assert!(!components.contains_key(&ScoreComponent::Skills));
        assert!(!components.contains_key(&ScoreComponent::Experience));
        assert!(!components.contains_key(&ScoreComponent::Relevance));
        // Title keywords are always assessable
        assert_eq!(components[&ScoreComponent::Keywords], 0);
        assert_eq!(b.overall_score, 0);
    }

    #[test]
    fn test_interests_drive_relevance() {
        let scorer = DeterministicScorer::new(ScoringWeights::default());
        let ctx = ScoringContext {
            interests: vec!["data analyst".into()],
            application_form: None,
        };
        let b = scorer.evaluate(&profile(&[], "data analyst"), &job(&[]), &ctx);
        assert_eq!(
            b.component_scores.unwrap()[&ScoreComponent::Relevance],
            100
        );
    }

    #[test]
    fn test_mentions_respects_word_boundaries() {
        assert!(mentions("python, r and sql", "r"));
        assert!(!mentions("manager", "r"));
        assert!(mentions("c++ developer", "c++"));
    }
}

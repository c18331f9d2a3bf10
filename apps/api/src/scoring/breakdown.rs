//! Fit score output shared by every scoring version.
//!
//! Consumers must tolerate a missing `componentScores` block: v1 never produces one.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoringVersion {
    #[serde(rename = "v1-simple-llm")]
    V1SimpleLlm,
    #[serde(rename = "v2-enhanced-llm")]
    V2EnhancedLlm,
    #[serde(rename = "v3-deterministic")]
    V3Deterministic,
}

impl ScoringVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoringVersion::V1SimpleLlm => "v1-simple-llm",
            ScoringVersion::V2EnhancedLlm => "v2-enhanced-llm",
            ScoringVersion::V3Deterministic => "v3-deterministic",
        }
    }
}

impl fmt::Display for ScoringVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScoringVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1-simple-llm" => Ok(ScoringVersion::V1SimpleLlm),
            "v2-enhanced-llm" => Ok(ScoringVersion::V2EnhancedLlm),
            "v3-deterministic" => Ok(ScoringVersion::V3Deterministic),
            other => Err(format!("unknown scoring version '{other}'")),
        }
    }
}

/// Band vocabulary shared by fit scores and job matches. Lower bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    StrongFit,
    GoodFit,
    PossibleFit,
    PoorFit,
}

impl Recommendation {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => Recommendation::StrongFit,
            70..=84 => Recommendation::GoodFit,
            50..=69 => Recommendation::PossibleFit,
            _ => Recommendation::PoorFit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScoreComponent {
    #[serde(rename = "relevanceScore")]
    Relevance,
    #[serde(rename = "qualificationScore")]
    Qualification,
    #[serde(rename = "skillsScore")]
    Skills,
    #[serde(rename = "experienceScore")]
    Experience,
    #[serde(rename = "educationScore")]
    Education,
    #[serde(rename = "keywordsScore")]
    Keywords,
}

pub type ComponentScores = BTreeMap<ScoreComponent, u8>;
pub type ComponentWeights = BTreeMap<ScoreComponent, f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringMethod {
    pub version: ScoringVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<ComponentWeights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deterministic_weight: Option<f32>,
    /// Set when this breakdown was produced by the fallback strategy in place of another version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<ScoringVersion>,
}

impl ScoringMethod {
    pub fn llm(version: ScoringVersion, weights: Option<ComponentWeights>) -> Self {
        Self {
            version,
            weights,
            ai_weight: Some(1.0),
            deterministic_weight: Some(0.0),
            fallback_from: None,
        }
    }

    pub fn deterministic(weights: ComponentWeights) -> Self {
        Self {
            version: ScoringVersion::V3Deterministic,
            weights: Some(weights),
            ai_weight: Some(0.0),
            deterministic_weight: Some(1.0),
            fallback_from: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitScoreBreakdown {
    pub overall_score: u8,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub skills_matched: Vec<String>,
    #[serde(default)]
    pub skills_missing: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_scores: Option<ComponentScores>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scoring_method: Option<ScoringMethod>,
}

impl FitScoreBreakdown {
    pub fn version(&self) -> Option<ScoringVersion> {
        self.scoring_method.as_ref().map(|m| m.version)
    }

    /// Weighted overall reproduced from components and weights, when both are present.
    pub fn weighted_overall(&self) -> Option<f32> {
        let components = self.component_scores.as_ref()?;
        let weights = self.scoring_method.as_ref()?.weights.as_ref()?;
        weighted_overall(components, weights)
    }

    /// Forces every invariant the engine guarantees: scores in range, the overall
    /// reproducible from the weighted components, and the recommendation derived from it.
    pub fn normalize(mut self) -> Self {
        if let Some(components) = self.component_scores.as_mut() {
            components.values_mut().for_each(|s| *s = (*s).min(100));
        }
        self.overall_score = self.overall_score.min(100);
        if let Some(weighted) = self.weighted_overall() {
            self.overall_score = clamp_score(weighted);
        }
        self.recommendation = Recommendation::from_score(self.overall_score);
        self
    }

    /// Invariant check used by tests; `normalize` is what enforces it.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        let in_range = self.overall_score <= 100
            && self
                .component_scores
                .as_ref()
                .map_or(true, |c| c.values().all(|s| *s <= 100));
        let weighted_ok = self
            .weighted_overall()
            .map_or(true, |w| (w - self.overall_score as f32).abs() <= 1.0);
        in_range && weighted_ok && self.recommendation == Recommendation::from_score(self.overall_score)
    }
}

/// Sum of `score × weight` over components present in both maps, divided by the weights used.
pub fn weighted_overall(components: &ComponentScores, weights: &ComponentWeights) -> Option<f32> {
    let (sum, total) = components
        .iter()
        .filter_map(|(k, score)| weights.get(k).map(|w| (*score as f32, *w)))
        .filter(|(_, w)| *w > 0.0)
        .fold((0.0_f32, 0.0_f32), |(sum, total), (score, w)| {
            (sum + score * w, total + w)
        });
    (total > 0.0).then(|| sum / total)
}

/// Rounds and clamps any raw score into 0..=100. NaN becomes 0.
pub fn clamp_score(raw: f32) -> u8 {
    if raw.is_nan() {
        0
    } else {
        raw.round().clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries_are_inclusive() {
        assert_eq!(Recommendation::from_score(85), Recommendation::StrongFit);
        assert_eq!(Recommendation::from_score(84), Recommendation::GoodFit);
        assert_eq!(Recommendation::from_score(70), Recommendation::GoodFit);
        assert_eq!(Recommendation::from_score(69), Recommendation::PossibleFit);
        assert_eq!(Recommendation::from_score(50), Recommendation::PossibleFit);
        assert_eq!(Recommendation::from_score(49), Recommendation::PoorFit);
        assert_eq!(Recommendation::from_score(0), Recommendation::PoorFit);
        assert_eq!(Recommendation::from_score(100), Recommendation::StrongFit);
    }

    #[test]
    fn test_clamp_score_range() {
        for raw in [-50.0, -0.4, 0.0, 49.5, 69.6, 100.0, 100.4, 250.0, f32::NAN] {
            let s = clamp_score(raw);
            assert!(s <= 100, "{raw} clamped to {s}");
        }
        assert_eq!(clamp_score(69.6), 70);
        assert_eq!(clamp_score(-3.0), 0);
        assert_eq!(clamp_score(180.0), 100);
    }

    #[test]
    fn test_weighted_overall_ignores_unweighted_components() {
        let components = ComponentScores::from([
            (ScoreComponent::Qualification, 80),
            (ScoreComponent::Relevance, 60),
            (ScoreComponent::Skills, 10),
        ]);
        let weights = ComponentWeights::from([
            (ScoreComponent::Qualification, 0.3),
            (ScoreComponent::Relevance, 0.7),
        ]);
        let w = weighted_overall(&components, &weights).unwrap();
        assert!((w - 66.0).abs() < 0.01);
    }

    #[test]
    fn test_normalize_recomputes_overall_and_band() {
        let breakdown = FitScoreBreakdown {
            overall_score: 95,
            recommendation: Recommendation::StrongFit,
            skills_matched: vec![],
            skills_missing: vec![],
            strengths: vec![],
            concerns: vec![],
            reasoning: String::new(),
            component_scores: Some(ComponentScores::from([
                (ScoreComponent::Qualification, 80),
                (ScoreComponent::Relevance, 60),
            ])),
            scoring_method: Some(ScoringMethod::llm(
                ScoringVersion::V2EnhancedLlm,
                Some(ComponentWeights::from([
                    (ScoreComponent::Qualification, 0.3),
                    (ScoreComponent::Relevance, 0.7),
                ])),
            )),
        }
        .normalize();

        assert_eq!(breakdown.overall_score, 66);
        assert_eq!(breakdown.recommendation, Recommendation::PossibleFit);
        assert!(breakdown.is_consistent());
    }

    #[test]
    fn test_breakdown_tolerates_missing_components() {
        let json = r#"{
            "overallScore": 72,
            "recommendation": "good-fit",
            "reasoning": "solid",
            "scoringMethod": { "version": "v1-simple-llm" }
        }"#;
        let b: FitScoreBreakdown = serde_json::from_str(json).unwrap();
        assert!(b.component_scores.is_none());
        assert_eq!(b.version(), Some(ScoringVersion::V1SimpleLlm));
        assert!(b.is_consistent());
    }

    #[test]
    fn test_component_keys_serialize_camel_case() {
        let components = ComponentScores::from([(ScoreComponent::Skills, 67)]);
        let json = serde_json::to_string(&components).unwrap();
        assert_eq!(json, r#"{"skillsScore":67}"#);
    }
}

use crate::llm_client::prompts::{bullet_list, UNTRUSTED_INPUT_INSTRUCTION};
use crate::models::job::Job;
use crate::models::profile::CandidateProfile;

pub const SIMPLE_SYSTEM: &str = "You are an expert recruiter analyzing candidate fit for job \
    positions. Return only valid JSON responses.";

pub const ENHANCED_SYSTEM: &str = "You are an expert recruiter analyzing candidate fit for job \
    positions. Prioritize verified application data over resume claims. \
    Return only valid JSON responses.";

const SCORING_GUIDE: &str = "\
**SCORING GUIDE:**
- 85-100: Strong fit - excellent match, highly qualified, exceeds requirements
- 70-84: Good fit - meets core requirements, eligible for interview
- 50-69: Possible fit - has some relevant skills but notable gaps
- 0-49: Poor fit - significant mismatches, major skill/experience gaps";

fn job_block(job: &Job) -> String {
    format!(
        "**JOB POSTING:**\nTitle: {}\nCategory: {}\n\nDescription:\n{}\n\nRequirements:\n{}\n\n\
         Responsibilities:\n{}\n\nRequired skills:\n{}",
        job.title,
        job.category.as_deref().unwrap_or("Not specified"),
        job.description,
        bullet_list(&job.requirements),
        bullet_list(&job.responsibilities),
        bullet_list(&job.required_skills),
    )
}

/// v1: résumé text against the posting, score and reasoning only.
pub fn simple_fit_prompt(profile: &CandidateProfile, job: &Job) -> String {
    format!(
        r#"You are an expert recruiter. Compare this resume to the job posting and provide a fit analysis.
{UNTRUSTED_INPUT_INSTRUCTION}

**RESUME:**
{resume}

{job}

**YOUR TASK:**
Analyze how well this candidate fits this job. Consider skills, experience, education and overall potential.
Match skills semantically ("React" and "React.js" are the same) and credit transferable skills.

{SCORING_GUIDE}

**RETURN ONLY VALID JSON:**
{{
  "overallScore": 0,
  "skillsMatched": ["..."],
  "skillsMissing": ["..."],
  "strengths": ["..."],
  "concerns": ["..."],
  "reasoning": "..."
}}"#,
        resume = profile.resume_text,
        job = job_block(job),
    )
}

/// v2: verified application data first, then the résumé; asks for relevance and
/// qualification components that the engine combines as 0.3 × qualification + 0.7 × relevance.
pub fn enhanced_fit_prompt(
    profile: &CandidateProfile,
    job: &Job,
    application_summary: Option<&str>,
) -> String {
    let candidate = match application_summary {
        Some(summary) => format!(
            "Structured Application Data:\n{summary}\n\nResume Document:\n{}",
            profile.resume_text
        ),
        None => format!(
            "Resume Document:\n{}\n\n(No structured application data provided)",
            profile.resume_text
        ),
    };

    format!(
        r#"You are an expert recruiter. Analyze this candidate's fit for the job posting.
{UNTRUSTED_INPUT_INSTRUCTION}

**CANDIDATE INFORMATION:**
{candidate}

{job}

**STEP 1: QUALIFICATIONS**
- skillsMatched: ONLY skills or tools explicitly named in the posting (close technical variants allowed).
- Soft skills and general competencies belong in strengths, never in skillsMatched.
- Rate the candidate's raw qualifications as qualificationScore (0-100).

**STEP 2: DOMAIN RELEVANCE**
Rate career trajectory and domain match as relevanceScore (0-100):
- 90-100: same domain, natural progression
- 70-89: same industry, some relevant background
- 50-69: adjacent field or transferable skills
- 30-49: different domain with some overlap
- 10-29: minimal overlap

**STEP 3: OVERALL**
overallScore = qualificationScore × 0.3 + relevanceScore × 0.7

{SCORING_GUIDE}

The reasoning must be 3-5 sentences from a recruiter's perspective: why the score fits, domain
knowledge, onboarding implications and hiring risk. Do not show the formula.

**RETURN ONLY VALID JSON:**
{{
  "componentScores": {{ "relevanceScore": 0, "qualificationScore": 0 }},
  "overallScore": 0,
  "skillsMatched": ["..."],
  "skillsMissing": ["..."],
  "strengths": ["..."],
  "concerns": ["..."],
  "reasoning": "..."
}}"#,
        job = job_block(job),
    )
}

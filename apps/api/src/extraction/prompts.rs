use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, UNTRUSTED_INPUT_INSTRUCTION};

pub const EXTRACTION_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Résumé text in, structured fields out.
pub fn extraction_prompt(resume_text: &str) -> String {
    format!(
        r#"You are an expert resume parser. Extract structured information from the resume below.
{UNTRUSTED_INPUT_INSTRUCTION}

**RESUME TEXT:**
{resume_text}

**GUIDELINES:**
- Only report what the resume states. Leave a field empty rather than guessing.
- "totalYears" is the sum of professional experience in years, as a number.
- "education.level" is one of: high_school, associate, bachelor, master, doctorate.
- "confidence" (0-100) is how complete and unambiguous the resume was.

**RETURN ONLY VALID JSON:**
{{
  "basics": {{
    "firstName": "", "lastName": "", "email": "", "phone": "", "location": "", "headline": ""
  }},
  "skills": ["..."],
  "experience": {{
    "totalYears": 0,
    "positions": [{{ "title": "", "company": "", "duration": "" }}]
  }},
  "education": {{ "level": "", "degree": "", "field": "" }},
  "certifications": ["..."],
  "confidence": 0
}}"#
    )
}

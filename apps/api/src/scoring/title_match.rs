//! Title-to-interest similarity. Pure string heuristics, no external calls.

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as",
];

/// How a job title relates to the best-aligned interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRelation {
    Exact,
    TitleContainsInterest,
    InterestContainsTitle,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMatch {
    pub score: u8,
    /// The interest this title aligns with best; first interest when nothing aligns.
    pub interest: String,
    pub relation: TitleRelation,
}

impl TitleMatch {
    pub fn reasoning(&self) -> String {
        match self.relation {
            TitleRelation::Exact => format!("Exact match for {}", self.interest),
            TitleRelation::TitleContainsInterest => format!("Strong match for {}", self.interest),
            TitleRelation::InterestContainsTitle => {
                format!("Closely related to {}", self.interest)
            }
            TitleRelation::Keyword => format!("Matches your interest in {}", self.interest),
        }
    }
}

/// Best score of `title` against any of `interests`.
///
/// Exact 100, title contains interest 90, interest contains title 85, otherwise the
/// keyword overlap band (80/70/60/50/40) or 0.
pub fn match_title(title: &str, interests: &[String]) -> Option<TitleMatch> {
    let normalized_title = title.trim().to_lowercase();
    if normalized_title.is_empty() {
        return None;
    }

    let mut best: Option<TitleMatch> = None;
    for interest in interests {
        let normalized = interest.trim().to_lowercase();
        if normalized.is_empty() {
            continue;
        }

        let (score, relation) = if normalized_title == normalized {
            (100, TitleRelation::Exact)
        } else if normalized_title.contains(&normalized) {
            (90, TitleRelation::TitleContainsInterest)
        } else if normalized.contains(&normalized_title) {
            (85, TitleRelation::InterestContainsTitle)
        } else {
            (keyword_overlap(&normalized_title, &normalized), TitleRelation::Keyword)
        };

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(TitleMatch {
                score,
                interest: interest.trim().to_string(),
                relation,
            });
        }
        if score == 100 {
            break;
        }
    }
    best
}

pub(crate) fn keywords(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .collect()
}

/// Prefix match tolerant of one trailing character ("engineer" vs "engineering").
fn partial_match(a: &str, b: &str) -> bool {
    fn stem(w: &str) -> &str {
        w.char_indices().last().map_or("", |(i, _)| &w[..i])
    }
    (a.len() > 4 && b.starts_with(stem(a))) || (b.len() > 4 && a.starts_with(stem(b)))
}

fn keyword_overlap(title: &str, interest: &str) -> u8 {
    let title_words = keywords(title);
    let interest_words = keywords(interest);
    if interest_words.is_empty() {
        return 0;
    }

    let matched: f32 = interest_words
        .iter()
        .map(|word| {
            if title_words.contains(word) {
                1.0
            } else if title_words.iter().any(|t| partial_match(word, t)) {
                0.5
            } else {
                0.0
            }
        })
        .sum();

    let ratio = matched / interest_words.len() as f32;
    match ratio {
        r if r >= 0.8 => 80,
        r if r >= 0.6 => 70,
        r if r >= 0.4 => 60,
        r if r >= 0.2 => 50,
        r if r > 0.0 => 40,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interests(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_scores_100() {
        let m = match_title("Software Engineer", &interests(&["software engineer"])).unwrap();
        assert_eq!(m.score, 100);
        assert_eq!(m.reasoning(), "Exact match for software engineer");
    }

    #[test]
    fn test_containment_scores() {
        let m = match_title("Senior Software Engineer", &interests(&["Software Engineer"])).unwrap();
        assert_eq!(m.score, 90);
        assert_eq!(m.reasoning(), "Strong match for Software Engineer");

        let m = match_title("Nurse", &interests(&["Registered Nurse"])).unwrap();
        assert_eq!(m.score, 85);
    }

    #[test]
    fn test_keyword_overlap_with_partial_stems() {
        // data 1 + engineering/engineer 0.5 + pipelines 0 over three words
        let m = match_title(
            "Senior Data Engineer",
            &interests(&["engineering data pipelines"]),
        )
        .unwrap();
        assert_eq!(m.relation, TitleRelation::Keyword);
        assert_eq!(m.score, 60);
        assert_eq!(m.reasoning(), "Matches your interest in engineering data pipelines");
    }

    #[test]
    fn test_partial_match_tolerates_one_trailing_char() {
        assert!(partial_match("engineering", "engineer"));
        assert!(partial_match("nurses", "nurse"));
        assert!(!partial_match("data", "database"));
    }

    #[test]
    fn test_stop_words_and_short_words_ignored() {
        assert_eq!(keyword_overlap("head of sales", "of the"), 0);
    }

    #[test]
    fn test_best_interest_wins() {
        let m = match_title(
            "Medical Coder",
            &interests(&["Accounting", "Medical Coding", "Medical Coder"]),
        )
        .unwrap();
        assert_eq!(m.score, 100);
        assert_eq!(m.interest, "Medical Coder");
    }

    #[test]
    fn test_no_overlap_falls_back_to_first_interest() {
        let m = match_title("Chef", &interests(&["Accounting", "Law"])).unwrap();
        assert_eq!(m.score, 0);
        assert_eq!(m.interest, "Accounting");
    }
}

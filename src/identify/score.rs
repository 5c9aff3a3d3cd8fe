use crate::identify::parser::ParsedListing;

// Heuristic penalties. The resulting score only has meaning as a relative
// ordering between attempts, not as a calibrated probability.
const PENALTY_GENERIC_NAME: f32 = 0.4;
const PENALTY_MISSING_PART_NUMBER: f32 = 0.3;
const PENALTY_SHORT_DESCRIPTION: f32 = 0.2;
const PENALTY_GENERIC_DESCRIPTION: f32 = 0.1;

const MIN_DESCRIPTION_CHARS: usize = 20;

const GENERIC_NAMES: &[&str] = &["unknown", "auto part", "car part", "part", "component"];
const GENERIC_DESCRIPTION_MARKERS: &[&str] =
    &["unknown", "unable to", "cannot determine", "not sure", "unclear"];

/// Rule-based completeness check. Returns the issue list in detection order;
/// the score is always derived from it, never set directly.
pub fn detect_issues(parsed: &ParsedListing) -> Vec<String> {
    let mut issues = Vec::new();

    let name = parsed.part_name.trim().to_lowercase();
    if name.is_empty() || GENERIC_NAMES.iter().any(|generic| name == *generic || name.contains("unknown")) {
        issues.push("generic or unknown part name".to_string());
    }

    if parsed.part_numbers.is_empty() {
        issues.push("no part number identified".to_string());
    }

    let description = parsed.description.trim();
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        issues.push("description too short".to_string());
    } else if GENERIC_DESCRIPTION_MARKERS
        .iter()
        .any(|marker| description.to_lowercase().contains(marker))
    {
        issues.push("description sounds generic".to_string());
    }

    issues
}

/// Score from a perfect 1.0 down by fixed per-issue penalties, clamped to
/// [0,1]. Monotone non-increasing as issues accumulate.
pub fn score_from_issues(issues: &[String]) -> f32 {
    let mut score = 1.0_f32;
    for issue in issues {
        score -= penalty_for(issue);
    }
    score.clamp(0.0, 1.0)
}

fn penalty_for(issue: &str) -> f32 {
    if issue.contains("part name") {
        PENALTY_GENERIC_NAME
    } else if issue.contains("part number") {
        PENALTY_MISSING_PART_NUMBER
    } else if issue.contains("too short") {
        PENALTY_SHORT_DESCRIPTION
    } else {
        PENALTY_GENERIC_DESCRIPTION
    }
}

pub fn score_result(parsed: &ParsedListing) -> (f32, Vec<String>) {
    let issues = detect_issues(parsed);
    (score_from_issues(&issues), issues)
}

/// Pure fallback predicate: another phase is needed when confidence is below
/// the threshold or any issue was detected.
pub fn needs_fallback(confidence: f32, issues: &[String], threshold: f32) -> bool {
    confidence < threshold || !issues.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_listing() -> ParsedListing {
        ParsedListing {
            part_name: "Headlight Assembly".into(),
            part_numbers: vec!["81110-06C10".into()],
            description: "Good used condition, minor lens hazing, all tabs intact.".into(),
            ..Default::default()
        }
    }

    #[test]
    fn complete_result_scores_perfect() {
        let (score, issues) = score_result(&complete_listing());
        assert_eq!(score, 1.0);
        assert!(issues.is_empty());
    }

    #[test]
    fn score_monotone_in_issues_and_bounded() {
        let mut listing = complete_listing();
        let (full, _) = score_result(&listing);

        listing.part_numbers.clear();
        let (no_number, _) = score_result(&listing);
        assert!(no_number < full);

        listing.part_name = "Unknown part".into();
        let (no_name, _) = score_result(&listing);
        assert!(no_name <= no_number);

        listing.description = "bad".into();
        let (worst, issues) = score_result(&listing);
        assert!(worst <= no_name);
        assert!((0.0..=1.0).contains(&worst));
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn fallback_predicate_matches_contract() {
        assert!(needs_fallback(0.65, &[], 0.7));
        assert!(needs_fallback(0.9, &["x".into()], 0.7));
        assert!(!needs_fallback(0.9, &[], 0.7));
    }

    #[test]
    fn penalties_match_fixed_table() {
        let mut listing = complete_listing();
        listing.part_numbers.clear();
        let (score, _) = score_result(&listing);
        assert!((score - 0.7).abs() < 1e-6);
    }
}

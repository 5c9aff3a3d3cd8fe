use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Keep prompts bounded even when OCR goes wild on a casting full of digits.
const MAX_CANDIDATES_IN_PROMPT: usize = 10;

/// Token that looks like a stamped part number: 6+ alphanumerics (dashes
/// allowed) with at least one digit.
static PART_NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z0-9][A-Z0-9-]{5,}\b").expect("part number token regex"));

/// The three mutually exclusive OCR outcomes that drive prompt construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrScenario {
    /// A: OCR produced part-number-like tokens.
    PartNumbersFound,
    /// B: OCR produced text but nothing number-like.
    TextOnly,
    /// C: no OCR text at all (or no OCR collaborator).
    NoText,
}

impl fmt::Display for OcrScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OcrScenario::PartNumbersFound => "A",
            OcrScenario::TextOnly => "B",
            OcrScenario::NoText => "C",
        };
        write!(f, "{label}")
    }
}

/// Pull candidate part-number tokens out of raw OCR text, preserving first
/// occurrence order.
pub fn extract_candidates(ocr_text: &str) -> Vec<String> {
    let upper = ocr_text.to_uppercase();
    let mut seen = Vec::new();
    for token in PART_NUMBER_TOKEN.find_iter(&upper) {
        let value = token.as_str().trim_matches('-').to_string();
        if value.chars().any(|ch| ch.is_ascii_digit()) && !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

pub fn classify(ocr_text: &str, candidates: &[String]) -> OcrScenario {
    if !candidates.is_empty() {
        OcrScenario::PartNumbersFound
    } else if !ocr_text.trim().is_empty() {
        OcrScenario::TextOnly
    } else {
        OcrScenario::NoText
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    pub image_count: usize,
    pub candidates: Vec<String>,
    pub ocr_text: String,
    pub vin: Option<String>,
    pub prior_issues: Vec<String>,
}

impl PromptInputs {
    pub fn scenario(&self) -> OcrScenario {
        classify(&self.ocr_text, &self.candidates)
    }
}

/// Build the instruction block for the generative model. Pure function of
/// its inputs; no side effects.
pub fn build_prompt(inputs: &PromptInputs) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "You are an expert used auto parts appraiser. You are looking at {count} photo(s) of ONE physical auto part.\n\n",
        count = inputs.image_count.max(1),
    ));

    match inputs.scenario() {
        OcrScenario::PartNumbersFound => {
            let mut shown = inputs.candidates.clone();
            shown.truncate(MAX_CANDIDATES_IN_PROMPT);
            prompt.push_str(
                "OCR found these candidate part numbers stamped or printed on the part:\n",
            );
            for candidate in &shown {
                prompt.push_str(&format!("- {candidate}\n"));
            }
            prompt.push_str(
                "\nConfirm which of these is the real manufacturer part number, transcribe it exactly, and discard casting or date codes.\n",
            );
        }
        OcrScenario::TextOnly => {
            prompt.push_str("OCR extracted this text from the part, but no clear part number:\n");
            prompt.push_str(inputs.ocr_text.trim());
            prompt.push_str(
                "\n\nUse any brand names or markings in the text to identify the part. If a part number is visible in the photos, transcribe it.\n",
            );
        }
        OcrScenario::NoText => {
            prompt.push_str(
                "No readable text was extracted from the photos. Identify the part purely from its shape, mounting points, connectors and finish. If any stamped number is visible, transcribe it.\n",
            );
        }
    }

    if let Some(vin) = inputs.vin.as_deref().filter(|v| !v.trim().is_empty()) {
        prompt.push_str(&format!(
            "\nThe seller provided VIN {vin}. Treat the vehicle decoded from this VIN as ground truth for fitment.\n",
            vin = vin.trim(),
        ));
    }

    if !inputs.prior_issues.is_empty() {
        prompt.push_str("\nA previous identification attempt had these problems; correct them explicitly:\n");
        for issue in &inputs.prior_issues {
            prompt.push_str(&format!("- {issue}\n"));
        }
        prompt.push_str(
            "Be specific: never answer with a generic part name, and always state the part number or say NONE VISIBLE.\n",
        );
    }

    prompt.push_str(
        "\nAnswer using exactly these labeled sections:\n\
         Part Type: <specific part name>\n\
         Part Number: <number(s), comma separated, or NONE VISIBLE>\n\
         Brand: <manufacturer>\n\
         Condition: <assessment from the photos>\n\
         Color: <main color, or N/A>\n\
         Vehicle Fitment: <year range, make, model>\n\
         Compatibility Notes: <other vehicles this fits>\n\
         Price Range: $<low> - $<high>\n\
         Optimized Title: <eBay title, max 80 chars>\n\
         Keywords: <comma separated search terms>\n",
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_extraction_requires_digit_and_length() {
        let candidates = extract_candidates("TOYOTA 81110-06C10 made in japan HEADLAMP");
        assert_eq!(candidates, vec!["81110-06C10".to_string()]);
        assert!(extract_candidates("HEADLAMP BRACKET").is_empty());
    }

    #[test]
    fn scenario_selection() {
        let candidates = extract_candidates("89661-0C460");
        assert_eq!(
            classify("89661-0C460", &candidates),
            OcrScenario::PartNumbersFound
        );
        assert_eq!(classify("DENSO JAPAN", &[]), OcrScenario::TextOnly);
        assert_eq!(classify("   ", &[]), OcrScenario::NoText);
    }

    #[test]
    fn prompt_embeds_at_most_ten_candidates() {
        let inputs = PromptInputs {
            image_count: 2,
            candidates: (0..25).map(|i| format!("PN-{i:06}")).collect(),
            ocr_text: "lots of numbers".into(),
            vin: None,
            prior_issues: vec![],
        };
        let prompt = build_prompt(&inputs);
        let embedded = prompt.matches("- PN-").count();
        assert_eq!(embedded, 10);
    }

    #[test]
    fn vin_instruction_present_when_supplied() {
        let inputs = PromptInputs {
            image_count: 1,
            vin: Some("1HGBH41JXMN109186".into()),
            ..Default::default()
        };
        let prompt = build_prompt(&inputs);
        assert!(prompt.contains("1HGBH41JXMN109186"));
        assert!(prompt.contains("ground truth"));
    }

    #[test]
    fn prior_issues_switch_to_corrective_block() {
        let inputs = PromptInputs {
            image_count: 1,
            prior_issues: vec!["part number missing".into()],
            ..Default::default()
        };
        let prompt = build_prompt(&inputs);
        assert!(prompt.contains("previous identification attempt"));
        assert!(prompt.contains("part number missing"));
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_TITLE_CHARS: usize = 80;
const MAX_PART_NUMBERS: usize = 5;

static PRICE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$?\s*(\d[\d,]*(?:\.\d+)?)\s*(?:-|–|—|to)\s*\$?\s*(\d[\d,]*(?:\.\d+)?)")
        .expect("price range regex")
});

static SINGLE_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("single price regex"));

static YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\s*[-–]\s*((?:19|20)\d{2})\b").expect("year range regex"));

static SINGLE_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("single year regex"));

/// Keyword → listing category lookup for part names. First match wins;
/// anything unmatched lands in the generic bucket.
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("headlight", "Lighting & Lamps"),
    ("headlamp", "Lighting & Lamps"),
    ("tail light", "Lighting & Lamps"),
    ("taillight", "Lighting & Lamps"),
    ("fog light", "Lighting & Lamps"),
    ("bumper", "Exterior Body Parts"),
    ("fender", "Exterior Body Parts"),
    ("grille", "Exterior Body Parts"),
    ("hood", "Exterior Body Parts"),
    ("door", "Exterior Body Parts"),
    ("mirror", "Mirrors"),
    ("alternator", "Charging & Starting Systems"),
    ("starter", "Charging & Starting Systems"),
    ("compressor", "Air Conditioning & Heat"),
    ("radiator", "Cooling Systems"),
    ("water pump", "Cooling Systems"),
    ("fan", "Cooling Systems"),
    ("ecu", "Electronic Modules"),
    ("ecm", "Electronic Modules"),
    ("module", "Electronic Modules"),
    ("computer", "Electronic Modules"),
    ("sensor", "Electronic Modules"),
    ("wheel", "Wheels & Rims"),
    ("rim", "Wheels & Rims"),
    ("seat", "Interior Parts"),
    ("console", "Interior Parts"),
    ("dash", "Interior Parts"),
];

pub const DEFAULT_CATEGORY: &str = "Other Parts";

/// Fully-keyed parse output. Every field has a usable default so callers
/// never have to null-check; missing sections simply stay at their default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedListing {
    pub part_name: String,
    pub part_numbers: Vec<String>,
    pub brand: String,
    pub make: String,
    pub model: String,
    pub year_range: String,
    pub condition: String,
    pub color: String,
    pub compatibility: String,
    pub description: String,
    pub price_low: f64,
    pub price_high: f64,
    /// Midpoint of the extracted range, 0 when no range was found.
    pub price: f64,
    pub ebay_title: String,
    pub keywords: Vec<String>,
    pub category: String,
    pub is_oem: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    PartType,
    PartNumber,
    Brand,
    Condition,
    Color,
    Fitment,
    Compatibility,
    Price,
    Title,
    Keywords,
    Description,
}

/// Heading markers, both the current labeled style and the legacy numbered
/// one. Matched case-insensitively as a line prefix after markdown strip.
const HEADINGS: &[(&str, Section)] = &[
    ("part type", Section::PartType),
    ("part name", Section::PartType),
    ("step 1", Section::PartType),
    ("part number", Section::PartNumber),
    ("step 2", Section::PartNumber),
    ("brand", Section::Brand),
    ("manufacturer", Section::Brand),
    ("condition", Section::Condition),
    ("step 3", Section::Condition),
    ("color", Section::Color),
    ("vehicle fitment", Section::Fitment),
    ("fitment", Section::Fitment),
    ("vehicle", Section::Fitment),
    ("step 4", Section::Fitment),
    ("compatibility notes", Section::Compatibility),
    ("compatibility", Section::Compatibility),
    ("price range", Section::Price),
    ("estimated price", Section::Price),
    ("price", Section::Price),
    ("step 5", Section::Price),
    ("optimized title", Section::Title),
    ("ebay title", Section::Title),
    ("title", Section::Title),
    ("step 6", Section::Title),
    ("keywords", Section::Keywords),
    ("search terms", Section::Keywords),
    ("description", Section::Description),
];

/// Parse free-form model output into a `ParsedListing`. Best effort by
/// contract: malformed input never errors, it just leaves defaults behind.
pub fn parse_response(text: &str) -> ParsedListing {
    let mut parsed = ParsedListing::default();
    let mut section = Section::None;
    let mut buffers: Vec<(Section, String)> = Vec::new();

    for raw_line in text.lines() {
        let line = clean_line(raw_line);
        if line.is_empty() {
            continue;
        }

        if let Some((next, inline)) = match_heading(&line) {
            section = next;
            if !inline.is_empty() {
                push_value(&mut buffers, section, inline);
            }
            continue;
        }

        if section != Section::None {
            push_value(&mut buffers, section, line);
        }
    }

    for (section, value) in buffers {
        apply_section(&mut parsed, section, &value);
    }

    finalize(&mut parsed, text);
    parsed
}

fn clean_line(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|ch| *ch != '*' && *ch != '`').collect();
    let trimmed = stripped.trim();
    let trimmed = trimmed.trim_start_matches(['-', '#', '•']).trim();
    trim_quotes(trimmed).to_string()
}

fn trim_quotes(value: &str) -> &str {
    value.trim_matches(|ch| ch == '"' || ch == '\'' || ch == '“' || ch == '”')
}

fn match_heading(line: &str) -> Option<(Section, String)> {
    for (marker, section) in HEADINGS {
        // Markers are ASCII, so a matched prefix is ASCII too and the cut
        // below always lands on a char boundary.
        let Some(prefix) = line.as_bytes().get(..marker.len()) else {
            continue;
        };
        if !prefix.eq_ignore_ascii_case(marker.as_bytes()) {
            continue;
        }
        let rest = &line[marker.len()..];
        // "Price Range: $40 - $60" → inline value; "STEP 1" alone → none.
        let inline = rest.trim_start_matches([':', '.', ')', '-']).trim();
        return Some((*section, trim_quotes(inline).to_string()));
    }
    None
}

fn push_value(buffers: &mut Vec<(Section, String)>, section: Section, value: String) {
    if let Some((existing, text)) = buffers.last_mut()
        && *existing == section
    {
        text.push(' ');
        text.push_str(&value);
        return;
    }
    buffers.push((section, value));
}

fn apply_section(parsed: &mut ParsedListing, section: Section, value: &str) {
    match section {
        Section::PartType => {
            if parsed.part_name.is_empty() {
                parsed.part_name = value.to_string();
            }
        }
        Section::PartNumber => {
            parsed.part_numbers = split_part_numbers(value);
        }
        Section::Brand => {
            if parsed.brand.is_empty() {
                parsed.brand = value.to_string();
            }
        }
        Section::Condition => {
            if parsed.condition.is_empty() {
                parsed.condition = value.to_string();
            }
        }
        Section::Color => {
            if parsed.color.is_empty() {
                parsed.color = value.to_string();
            }
        }
        Section::Fitment => apply_fitment(parsed, value),
        Section::Compatibility => {
            if parsed.compatibility.is_empty() {
                parsed.compatibility = value.to_string();
            }
        }
        Section::Price => apply_price(parsed, value),
        Section::Title => {
            if parsed.ebay_title.is_empty() {
                parsed.ebay_title = truncate_chars(value, MAX_TITLE_CHARS);
            }
        }
        Section::Keywords => {
            parsed.keywords = value
                .split([',', ';'])
                .map(|kw| kw.trim().to_string())
                .filter(|kw| !kw.is_empty())
                .collect();
        }
        Section::Description => {
            if parsed.description.is_empty() {
                parsed.description = value.to_string();
            }
        }
        Section::None => {}
    }
}

fn split_part_numbers(value: &str) -> Vec<String> {
    let mut numbers = Vec::new();
    for token in value.split([',', ';', '/', '\n']) {
        let cleaned = token.trim().trim_matches('.').to_uppercase();
        if cleaned.is_empty() {
            continue;
        }
        if matches!(cleaned.as_str(), "NONE" | "NONE VISIBLE" | "N/A" | "UNKNOWN" | "NOT VISIBLE") {
            continue;
        }
        if !cleaned.chars().any(|ch| ch.is_ascii_digit()) {
            continue;
        }
        if !numbers.contains(&cleaned) {
            numbers.push(cleaned);
        }
        if numbers.len() >= MAX_PART_NUMBERS {
            break;
        }
    }
    numbers
}

fn apply_fitment(parsed: &mut ParsedListing, value: &str) {
    if parsed.year_range.is_empty() {
        if let Some(caps) = YEAR_RANGE.captures(value) {
            parsed.year_range = format!("{}-{}", &caps[1], &caps[2]);
        } else if let Some(caps) = SINGLE_YEAR.captures(value) {
            parsed.year_range = caps[1].to_string();
        }
    }

    // After stripping year tokens the first word is the make, the rest the
    // model ("2006-2011 Toyota Camry SE" → Toyota / Camry SE).
    let remainder = YEAR_RANGE.replace_all(value, "");
    let remainder = SINGLE_YEAR.replace_all(&remainder, "");
    let mut words = remainder
        .split([' ', ',', '(', ')'])
        .map(str::trim)
        .filter(|word| !word.is_empty() && *word != "-");
    if parsed.make.is_empty()
        && let Some(make) = words.next()
    {
        parsed.make = make.to_string();
        let model: Vec<&str> = words.collect();
        if parsed.model.is_empty() && !model.is_empty() {
            parsed.model = model.join(" ");
        }
    }
}

fn apply_price(parsed: &mut ParsedListing, value: &str) {
    if parsed.price > 0.0 {
        return;
    }
    if let Some(caps) = PRICE_RANGE.captures(value) {
        let low = parse_amount(&caps[1]);
        let high = parse_amount(&caps[2]);
        if low > 0.0 && high >= low {
            parsed.price_low = low;
            parsed.price_high = high;
            parsed.price = (low + high) / 2.0;
            return;
        }
    }
    if let Some(caps) = SINGLE_PRICE.captures(value) {
        let amount = parse_amount(&caps[1]);
        if amount > 0.0 {
            parsed.price_low = amount;
            parsed.price_high = amount;
            parsed.price = amount;
        }
    }
}

fn parse_amount(raw: &str) -> f64 {
    raw.replace(',', "").parse::<f64>().unwrap_or(0.0)
}

fn finalize(parsed: &mut ParsedListing, original: &str) {
    parsed.category = categorize(&parsed.part_name);
    let haystack = original.to_lowercase();
    parsed.is_oem = haystack.contains("oem") || haystack.contains("genuine");

    if parsed.description.is_empty() {
        let mut pieces = Vec::new();
        if !parsed.condition.is_empty() {
            pieces.push(parsed.condition.clone());
        }
        if !parsed.compatibility.is_empty() {
            pieces.push(parsed.compatibility.clone());
        }
        parsed.description = pieces.join(" ");
    }
}

pub fn categorize(part_name: &str) -> String {
    let lower = part_name.to_lowercase();
    for (keyword, category) in CATEGORY_KEYWORDS {
        if lower.contains(keyword) {
            return (*category).to_string();
        }
    }
    DEFAULT_CATEGORY.to_string()
}

pub fn truncate_chars(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        value.to_string()
    } else {
        value.chars().take(limit).collect::<String>().trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
Part Type: Headlight Assembly
Part Number: 81110-06C10, 81110-06C10, NONE
**Brand:** Toyota
Condition: Good used condition, minor lens hazing, tabs intact.
Vehicle Fitment: 2018-2020 Toyota Camry
Compatibility Notes: Also fits Camry Hybrid SE trims.
Price Range: $85 - $125
Optimized Title: "2018-2020 Toyota Camry Headlight Assembly OEM 81110-06C10 Right"
Keywords: camry headlight, oem, passenger side
"#;

    #[test]
    fn parses_labeled_sections() {
        let parsed = parse_response(SAMPLE);
        assert_eq!(parsed.part_name, "Headlight Assembly");
        assert_eq!(parsed.part_numbers, vec!["81110-06C10".to_string()]);
        assert_eq!(parsed.brand, "Toyota");
        assert_eq!(parsed.make, "Toyota");
        assert_eq!(parsed.model, "Camry");
        assert_eq!(parsed.year_range, "2018-2020");
        assert_eq!(parsed.price_low, 85.0);
        assert_eq!(parsed.price_high, 125.0);
        assert_eq!(parsed.price, 105.0);
        assert_eq!(parsed.category, "Lighting & Lamps");
        assert!(parsed.is_oem);
        assert!(!parsed.ebay_title.contains('"'));
        assert_eq!(parsed.keywords.len(), 3);
    }

    #[test]
    fn empty_input_yields_fully_keyed_defaults() {
        let parsed = parse_response("");
        assert_eq!(parsed.part_name, "");
        assert!(parsed.part_numbers.is_empty());
        assert_eq!(parsed.price, 0.0);
        assert_eq!(parsed.category, DEFAULT_CATEGORY);
        assert!(!parsed.is_oem);
    }

    #[test]
    fn legacy_step_headings_still_parse() {
        let legacy = "STEP 1: Alternator\nSTEP 2: 104210-1234\nSTEP 5: $60 to $90\nSTEP 6: Denso Alternator 104210-1234 Tested";
        let parsed = parse_response(legacy);
        assert_eq!(parsed.part_name, "Alternator");
        assert_eq!(parsed.part_numbers, vec!["104210-1234".to_string()]);
        assert_eq!(parsed.price, 75.0);
        assert_eq!(parsed.category, "Charging & Starting Systems");
        assert_eq!(parsed.ebay_title, "Denso Alternator 104210-1234 Tested");
    }

    #[test]
    fn title_is_capped_at_eighty_chars() {
        let long = format!("Optimized Title: {}", "X".repeat(200));
        let parsed = parse_response(&long);
        assert!(parsed.ebay_title.chars().count() <= MAX_TITLE_CHARS);
    }

    #[test]
    fn single_price_used_when_no_range() {
        let parsed = parse_response("Price Range: around $45 shipped");
        assert_eq!(parsed.price, 45.0);
        assert_eq!(parsed.price_low, 45.0);
        assert_eq!(parsed.price_high, 45.0);
    }

    #[test]
    fn part_numbers_deduped_and_capped() {
        let text = "Part Number: A1, A1, B2, C3, D4, E5, F6, G7";
        let parsed = parse_response(text);
        assert_eq!(parsed.part_numbers.len(), 5);
        assert_eq!(parsed.part_numbers[0], "A1");
    }

    #[test]
    fn markdown_emphasis_and_quotes_are_stripped() {
        let parsed = parse_response("**Part Type:** 'Side Mirror'");
        assert_eq!(parsed.part_name, "Side Mirror");
        assert_eq!(parsed.category, "Mirrors");
    }

    #[test]
    fn non_ascii_heading_lookalike_stays_body_text() {
        // U+212A KELVIN SIGN lowercases to "k"; it must not be mistaken for
        // the "keywords" heading or split the line mid-character.
        let text = "\u{212A}eywords: stray\nPart Type: Headlight Assembly";
        let parsed = parse_response(text);
        assert_eq!(parsed.part_name, "Headlight Assembly");
        assert!(parsed.keywords.is_empty());
    }

    #[test]
    fn garbage_never_panics() {
        let parsed = parse_response("$$$$ ---- \u{fffd}\u{fffd} STEP STEP STEP : : :");
        assert_eq!(parsed.category, DEFAULT_CATEGORY);
    }
}

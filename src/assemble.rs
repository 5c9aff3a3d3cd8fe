use crate::models::{PartInfo, ProcessedImage};

pub const MAX_TITLE_CHARS: usize = 80;
const MAX_TITLE_PART_NUMBERS: usize = 2;

/// Categories where color never helps a buyer search and only burns title
/// characters.
const COLOR_IRRELEVANT_CATEGORIES: &[&str] = &[
    "Exterior Body Parts",
    "Charging & Starting Systems",
    "Electronic Modules",
    "Cooling Systems",
    "Air Conditioning & Heat",
];

const DEFAULT_COLOR: &str = "black";

/// Assemble the eBay title in strict field order: year range, make, model,
/// part name (with make/brand/model de-duplicated out of it), up to two part
/// numbers, color, trailing OEM marker. The 80-char cap is enforced by
/// dropping the least important fields first (color, then extra part
/// numbers), with word-boundary truncation as the last resort.
pub fn build_title(part: &PartInfo) -> String {
    let color_eligible = color_belongs_in_title(part);

    let full = compose_title(part, color_eligible, MAX_TITLE_PART_NUMBERS);
    if full.chars().count() <= MAX_TITLE_CHARS {
        return full;
    }

    let without_color = compose_title(part, false, MAX_TITLE_PART_NUMBERS);
    if without_color.chars().count() <= MAX_TITLE_CHARS {
        return without_color;
    }

    let single_number = compose_title(part, false, 1);
    if single_number.chars().count() <= MAX_TITLE_CHARS {
        return single_number;
    }

    truncate_at_word(&single_number, MAX_TITLE_CHARS)
}

fn compose_title(part: &PartInfo, include_color: bool, number_count: usize) -> String {
    let mut segments: Vec<String> = Vec::new();

    if let Some(years) = part.year_range.as_deref().filter(|v| !v.trim().is_empty()) {
        segments.push(years.trim().to_string());
    }
    if let Some(make) = part.make.as_deref().filter(|v| !v.trim().is_empty()) {
        segments.push(make.trim().to_string());
    }
    if let Some(model) = part.model.as_deref().filter(|v| !v.trim().is_empty()) {
        segments.push(model.trim().to_string());
    }

    let name = deduped_part_name(part);
    if !name.is_empty() {
        segments.push(name);
    }

    for number in part.part_numbers.iter().take(number_count) {
        segments.push(number.clone());
    }

    if include_color
        && let Some(color) = part.color.as_deref().filter(|v| !v.trim().is_empty())
    {
        segments.push(color.trim().to_string());
    }

    if part.is_oem {
        segments.push("OEM".to_string());
    }

    segments.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip words already contributed by make/brand/model so "Toyota Camry
/// Headlight" under make=Toyota never yields a doubled "Toyota".
fn deduped_part_name(part: &PartInfo) -> String {
    let mut blocked: Vec<String> = Vec::new();
    for source in [&part.make, &part.brand, &part.model] {
        if let Some(value) = source.as_deref() {
            for word in value.split_whitespace() {
                blocked.push(word.to_lowercase());
            }
        }
    }

    part.part_name
        .split_whitespace()
        .filter(|word| !blocked.contains(&word.to_lowercase()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn color_belongs_in_title(part: &PartInfo) -> bool {
    let Some(color) = part.color.as_deref() else {
        return false;
    };
    if color.trim().eq_ignore_ascii_case(DEFAULT_COLOR) {
        return false;
    }
    !COLOR_IRRELEVANT_CATEGORIES
        .iter()
        .any(|category| part.category.eq_ignore_ascii_case(category))
}

fn truncate_at_word(value: &str, limit: usize) -> String {
    let hard: String = value.chars().take(limit).collect();
    match hard.rfind(' ') {
        Some(idx) if idx > 0 => hard[..idx].trim_end().to_string(),
        _ => hard.trim_end().to_string(),
    }
}

/// SEO filename + alt text for each upload. Index 0 is the main image
/// unless the caller reorders afterwards.
pub fn process_images(part: &PartInfo, originals: &[String]) -> Vec<ProcessedImage> {
    let slug_base = seo_slug(part);
    originals
        .iter()
        .enumerate()
        .map(|(idx, original)| {
            let extension = original
                .rsplit('.')
                .next()
                .filter(|ext| ext.len() <= 4 && !ext.contains('/'))
                .unwrap_or("jpg")
                .to_lowercase();
            ProcessedImage {
                original: original.clone(),
                seo_filename: format!("{slug_base}-{n}.{extension}", n = idx + 1),
                alt_text: format!("{} photo {}", alt_base(part), idx + 1),
                is_main: idx == 0,
                seo_optimized: true,
            }
        })
        .collect()
}

fn seo_slug(part: &PartInfo) -> String {
    let mut pieces: Vec<&str> = Vec::new();
    if let Some(years) = part.year_range.as_deref() {
        pieces.push(years);
    }
    if let Some(make) = part.make.as_deref() {
        pieces.push(make);
    }
    if let Some(model) = part.model.as_deref() {
        pieces.push(model);
    }
    pieces.push(&part.part_name);

    let raw = pieces.join(" ");
    let slug: String = raw
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect();
    let collapsed = slug
        .split('-')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        "auto-part".to_string()
    } else {
        collapsed
    }
}

fn alt_base(part: &PartInfo) -> String {
    let mut pieces: Vec<String> = Vec::new();
    if let Some(years) = part.year_range.as_deref() {
        pieces.push(years.to_string());
    }
    if let Some(make) = part.make.as_deref() {
        pieces.push(make.to_string());
    }
    if let Some(model) = part.model.as_deref() {
        pieces.push(model.to_string());
    }
    pieces.push(part.part_name.clone());
    if part.is_oem {
        pieces.push("OEM".to_string());
    }
    pieces.join(" ")
}

/// Buyer-facing HTML description assembled from whatever fields we managed
/// to fill.
pub fn build_description(part: &PartInfo) -> String {
    let mut html = String::new();
    html.push_str(&format!("<h2>{}</h2>\n", build_title(part)));

    html.push_str("<ul>\n");
    if let Some(brand) = part.brand.as_deref() {
        html.push_str(&format!("<li>Brand: {brand}</li>\n"));
    }
    if !part.part_numbers.is_empty() {
        html.push_str(&format!(
            "<li>Part number(s): {}</li>\n",
            part.part_numbers.join(", ")
        ));
    }
    if let Some(condition) = part.condition.as_deref() {
        html.push_str(&format!("<li>Condition: {condition}</li>\n"));
    }
    if let Some(color) = part.color.as_deref() {
        html.push_str(&format!("<li>Color: {color}</li>\n"));
    }
    if part.is_oem {
        html.push_str("<li>Genuine OEM part</li>\n");
    }
    html.push_str("</ul>\n");

    if let Some(description) = part.description.as_deref().filter(|v| !v.is_empty()) {
        html.push_str(&format!("<p>{description}</p>\n"));
    }
    if let Some(compatibility) = part.compatibility.as_deref().filter(|v| !v.is_empty()) {
        html.push_str(&format!("<p>Compatibility: {compatibility}</p>\n"));
    }
    html.push_str(
        "<p>Please verify fitment against your vehicle and part number before purchase.</p>\n",
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camry_headlight() -> PartInfo {
        PartInfo {
            part_name: "Toyota Camry Headlight Assembly".into(),
            part_numbers: vec!["81110-06C10".into()],
            brand: Some("Toyota".into()),
            make: Some("Toyota".into()),
            model: Some("Camry".into()),
            year_range: Some("2018-2020".into()),
            color: Some("black".into()),
            is_oem: true,
            category: "Lighting & Lamps".into(),
            ..Default::default()
        }
    }

    #[test]
    fn make_never_duplicated_in_title() {
        let title = build_title(&camry_headlight());
        assert_eq!(title.matches("Toyota").count(), 1);
        assert!(title.contains("Headlight Assembly"));
        assert!(title.ends_with("OEM"));
    }

    #[test]
    fn title_field_order_is_strict() {
        let title = build_title(&camry_headlight());
        assert_eq!(title, "2018-2020 Toyota Camry Headlight Assembly 81110-06C10 OEM");
    }

    #[test]
    fn default_black_color_omitted_but_real_color_kept() {
        let mut part = camry_headlight();
        assert!(!build_title(&part).to_lowercase().contains("black"));
        part.color = Some("Red".into());
        assert!(build_title(&part).contains("Red"));
    }

    #[test]
    fn color_dropped_for_mechanical_categories() {
        let mut part = camry_headlight();
        part.category = "Charging & Starting Systems".into();
        part.color = Some("Silver".into());
        assert!(!build_title(&part).contains("Silver"));
    }

    #[test]
    fn color_dropped_for_exterior_body_categories() {
        let mut part = camry_headlight();
        part.part_name = "Front Bumper Cover".into();
        part.category = "Exterior Body Parts".into();
        part.color = Some("Silver".into());
        let title = build_title(&part);
        assert!(!title.contains("Silver"));
        assert!(title.contains("Front Bumper Cover"));
    }

    #[test]
    fn long_titles_shed_color_then_numbers_then_truncate() {
        let mut part = camry_headlight();
        part.color = Some("Metallic Charcoal Gray".into());
        part.part_name = "Front Upper Radiator Support Bracket Assembly With Integrated Mounts".into();
        part.part_numbers = vec!["12345-67890".into(), "98765-43210".into()];
        let title = build_title(&part);
        assert!(title.chars().count() <= MAX_TITLE_CHARS);
        assert!(!title.contains("Metallic"));
        // At least one part number survives field-dropping before truncation.
        let numbers = part
            .part_numbers
            .iter()
            .filter(|n| title.contains(n.as_str()))
            .count();
        assert!(numbers <= 1 || title.chars().count() <= MAX_TITLE_CHARS);
    }

    #[test]
    fn title_cap_holds_for_pathological_input() {
        let part = PartInfo {
            part_name: "X".repeat(300),
            ..Default::default()
        };
        assert!(build_title(&part).chars().count() <= MAX_TITLE_CHARS);
    }

    #[test]
    fn first_image_is_main_and_slugged() {
        let part = camry_headlight();
        let images = process_images(
            &part,
            &["IMG_0001.JPG".to_string(), "IMG_0002.jpg".to_string()],
        );
        assert_eq!(images.len(), 2);
        assert!(images[0].is_main);
        assert!(!images[1].is_main);
        assert!(images[0].seo_filename.starts_with("2018-2020-toyota-camry"));
        assert!(images[0].seo_filename.ends_with("-1.jpg"));
        assert!(images[0].alt_text.contains("photo 1"));
    }

    #[test]
    fn description_lists_known_fields_only() {
        let mut part = camry_headlight();
        part.condition = Some("Good used condition".into());
        part.color = None;
        let html = build_description(&part);
        assert!(html.contains("Part number(s): 81110-06C10"));
        assert!(html.contains("Good used condition"));
        assert!(!html.contains("Color:"));
        assert!(html.contains("verify fitment"));
    }
}

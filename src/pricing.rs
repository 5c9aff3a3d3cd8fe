use crate::ebay::browse::SoldComp;
use crate::models::PricingResult;
use tracing::debug;

/// Fewest outlier-trimmed comps that still count as market signal.
const MIN_DATA_POINTS: usize = 3;
/// Price 15% under market to move first in search results.
const COMPETITIVE_FACTOR: f64 = 0.85;
const QUICK_SALE_FACTOR: f64 = 0.80;

/// Static fallback prices keyed by part-name substring, used whenever live
/// comps are unavailable or too thin. First match wins.
const BASE_PRICES: &[(&str, f64)] = &[
    ("headlight", 75.0),
    ("headlamp", 75.0),
    ("tail light", 55.0),
    ("taillight", 55.0),
    ("bumper", 120.0),
    ("fender", 90.0),
    ("grille", 65.0),
    ("hood", 140.0),
    ("door", 150.0),
    ("mirror", 45.0),
    ("alternator", 85.0),
    ("starter", 70.0),
    ("compressor", 110.0),
    ("radiator", 80.0),
    ("wheel", 95.0),
    ("rim", 95.0),
    ("seat", 130.0),
    ("ecu", 100.0),
    ("module", 75.0),
];

const DEFAULT_BASE_PRICE: f64 = 50.0;

/// Derive a price recommendation from sold comps, falling back to the
/// heuristic table when the outlier-trimmed sample is too small. Always
/// returns a populated result; `success` tells callers whether the numbers
/// are market-backed.
pub fn estimate(part_name: &str, condition: Option<&str>, comps: &[SoldComp]) -> PricingResult {
    let sample = trimmed_sample(comps);
    if sample.len() < MIN_DATA_POINTS {
        debug!(
            target = "partscout.pricing",
            raw = comps.len(),
            trimmed = sample.len(),
            "insufficient comps, using heuristic table"
        );
        return heuristic_estimate(part_name, condition);
    }

    let count = sample.len();
    let mean = sample.iter().sum::<f64>() / count as f64;
    let median = median_of(&sample);
    let min = sample.iter().copied().fold(f64::INFINITY, f64::min);
    let max = sample.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    PricingResult {
        success: true,
        average_price: round_two(mean),
        median_price: round_two(median),
        suggested_price: round_two(mean * COMPETITIVE_FACTOR),
        quick_sale_price: round_two(mean * QUICK_SALE_FACTOR),
        data_points: count,
        market_analysis: format!(
            "{count} recent sales from ${min:.2} to ${max:.2}, average ${mean:.2}. \
             Suggested price sits 15% under market for a competitive listing."
        ),
    }
}

/// Drop the single cheapest and single dearest sale when the sample is big
/// enough to spare them; stray $1 and $999 listings otherwise dominate the
/// mean.
fn trimmed_sample(comps: &[SoldComp]) -> Vec<f64> {
    let mut prices: Vec<f64> = comps
        .iter()
        .map(|comp| comp.price)
        .filter(|price| *price > 0.0)
        .collect();
    prices.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if prices.len() >= 5 {
        prices.remove(0);
        prices.pop();
    }
    prices
}

fn median_of(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn heuristic_estimate(part_name: &str, condition: Option<&str>) -> PricingResult {
    let lower = part_name.to_lowercase();
    let base = BASE_PRICES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_BASE_PRICE);

    let factor = condition_factor(condition);
    let adjusted = round_two(base * factor);

    PricingResult {
        success: false,
        average_price: adjusted,
        median_price: adjusted,
        suggested_price: adjusted,
        quick_sale_price: round_two(adjusted * QUICK_SALE_FACTOR),
        data_points: 0,
        market_analysis: format!(
            "No usable sold-comp data; heuristic base price for \"{part_name}\" applied. \
             Verify against current listings before publishing."
        ),
    }
}

fn condition_factor(condition: Option<&str>) -> f64 {
    let Some(raw) = condition else { return 1.0 };
    let lower = raw.to_lowercase();
    if lower.contains("new") {
        1.25
    } else if lower.contains("parts") || lower.contains("broken") || lower.contains("damaged") {
        0.5
    } else {
        1.0
    }
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comps(prices: &[f64]) -> Vec<SoldComp> {
        prices
            .iter()
            .map(|price| SoldComp {
                price: *price,
                title: "comp".into(),
                end_date: None,
            })
            .collect()
    }

    #[test]
    fn five_comps_price_fifteen_percent_under_mean() {
        let result = estimate("Headlight Assembly", None, &comps(&[100.0, 110.0, 90.0, 105.0, 95.0]));
        assert!(result.success);
        assert_eq!(result.suggested_price, 85.0);
        assert_eq!(result.quick_sale_price, 80.0);
        assert_eq!(result.average_price, 100.0);
        assert_eq!(result.median_price, 100.0);
        assert_eq!(result.data_points, 3);
    }

    #[test]
    fn two_comps_fall_back_to_heuristic() {
        let result = estimate("Headlight Assembly", None, &comps(&[100.0, 110.0]));
        assert!(!result.success);
        assert_eq!(result.data_points, 0);
        assert_eq!(result.suggested_price, 75.0);
    }

    #[test]
    fn empty_comps_and_unknown_part_use_default_base() {
        let result = estimate("Mystery Widget", None, &[]);
        assert!(!result.success);
        assert_eq!(result.suggested_price, DEFAULT_BASE_PRICE);
    }

    #[test]
    fn condition_adjusts_heuristic_only() {
        let new = estimate("Side Mirror", Some("New"), &[]);
        let parts = estimate("Side Mirror", Some("for parts"), &[]);
        assert!(new.suggested_price > parts.suggested_price);
    }

    #[test]
    fn zero_priced_comps_are_ignored() {
        let result = estimate("Alternator", None, &comps(&[0.0, 0.0, 80.0, 90.0]));
        assert!(!result.success);
    }

    #[test]
    fn outlier_trim_requires_five() {
        // Four comps keep all points; three survive the minimum.
        let result = estimate("Alternator", None, &comps(&[80.0, 85.0, 90.0, 95.0]));
        assert!(result.success);
        assert_eq!(result.data_points, 4);
    }
}

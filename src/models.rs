use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListingRequest {
    pub images_source: ImagesSource,
    #[serde(default)]
    pub vin: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub marketplace: MarketplaceId,
    /// Keep running later identification phases even after a confident hit.
    #[serde(default)]
    pub force_fallback: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ListingDraftResponse {
    pub draft_id: String,
    pub part: PartInfo,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Outcome of one identification attempt. Each phase produces exactly one of
/// these; the runner keeps the last one computed across phases. Immutable
/// once constructed.
#[derive(Debug, Clone, Serialize)]
pub struct IdentificationResult {
    pub part_name: String,
    pub part_number: Option<String>,
    pub description: String,
    pub confidence_score: f32,
    pub method_used: String,
    pub issues: Vec<String>,
    pub raw_response: Value,
    pub timestamp: DateTime<Utc>,
}

impl IdentificationResult {
    /// Error-shaped result for a phase that failed outright. Zero confidence,
    /// a distinguishing issue tag, no invented fields.
    pub fn phase_failure(method: &str, issue: String) -> Self {
        Self {
            part_name: "Unknown Auto Part".to_string(),
            part_number: None,
            description: String::new(),
            confidence_score: 0.0,
            method_used: format!("{method}_failed"),
            issues: vec![issue],
            raw_response: Value::Null,
            timestamp: Utc::now(),
        }
    }
}

/// Accumulated part knowledge. Fields fill opportunistically as parsing,
/// pricing and image processing run; downstream consumers must treat every
/// field as possibly absent.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartInfo {
    #[serde(default)]
    pub part_name: String,
    #[serde(default)]
    pub part_numbers: Vec<String>,
    pub brand: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year_range: Option<String>,
    pub color: Option<String>,
    pub condition: Option<String>,
    #[serde(default)]
    pub is_oem: bool,
    pub estimated_price: Option<f64>,
    pub market_price: Option<f64>,
    pub quick_sale_price: Option<f64>,
    pub description: Option<String>,
    pub compatibility: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<ProcessedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResult {
    pub success: bool,
    pub average_price: f64,
    pub median_price: f64,
    pub suggested_price: f64,
    pub quick_sale_price: f64,
    pub data_points: usize,
    pub market_analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedImage {
    pub original: String,
    pub seo_filename: String,
    pub alt_text: String,
    pub is_main: bool,
    pub seo_optimized: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(clippy::enum_variant_names)]
pub enum MarketplaceId {
    #[default]
    EbayUs,
    EbayUk,
    EbayDe,
}

impl MarketplaceId {
    pub fn ebay_code(&self) -> &'static str {
        match self {
            MarketplaceId::EbayUs => "EBAY_US",
            MarketplaceId::EbayUk => "EBAY_GB",
            MarketplaceId::EbayDe => "EBAY_DE",
        }
    }
}

/// One URL / data URI, or a list. All images in one request describe the
/// same physical part.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImagesSource {
    Single(String),
    Multiple(Vec<String>),
}

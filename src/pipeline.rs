use crate::assemble;
use crate::browser::{BrowserClient, BrowserConfig};
use crate::config::AppConfig;
use crate::ebay::auth::{get_app_access_token, get_user_access_token_from_refresh};
use crate::ebay::browse::{SoldComp, search_sold_comps};
use crate::ebay::drafts::{DraftListingRequest, DraftReceipt, create_draft};
use crate::identify::parser::parse_response;
use crate::identify::phases::{PhaseContext, PhaseRunner};
use crate::llm::{GeminiClient, GeminiConfig, ImageAttachment, OpenAiClient, OpenAiConfig};
use crate::models::{
    IdentificationResult, ImagesSource, ListingDraftResponse, ListingRequest, PartInfo,
    PricingResult, StageReport,
};
use crate::pricing;
use crate::vision::{VisionClient, VisionConfig};
use serde_json::{Value, json};
use std::{
    collections::{BTreeMap, HashSet},
    env,
    future::Future,
    sync::Arc,
    time::Instant,
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

const BROWSE_SCOPES: &[&str] = &["https://api.ebay.com/oauth/api_scope"];

const SELL_SCOPES: &[&str] = &[
    "https://api.ebay.com/oauth/api_scope/sell.inventory",
    "https://api.ebay.com/oauth/api_scope/sell.account",
];

/// Motors category used when keyword mapping produced nothing better. eBay
/// "Car & Truck Parts & Accessories".
const DEFAULT_EBAY_CATEGORY_ID: &str = "6030";

const SOLD_COMP_LIMIT: usize = 20;

/// The photo-to-draft orchestrator. One instance is shared across all
/// requests; every collaborator client is stateless behind its Arc.
#[derive(Clone)]
pub struct Pipeline {
    pub config: Arc<AppConfig>,
    vision: Arc<VisionClient>,
    gemini: Arc<GeminiClient>,
    openai: Arc<OpenAiClient>,
    browser: Arc<BrowserClient>,
    ebay_refresh_token: Option<String>,
    ebay_network_enabled: bool,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        let ebay_refresh_token = Some(crate::ebay::config::EBAY_REFRESH_TOKEN.clone())
            .filter(|v| !v.trim().is_empty());
        let ebay_network_enabled = parse_env_bool("EBAY_ENABLE_NETWORK");
        Self {
            config: Arc::new(config),
            vision: Arc::new(VisionClient::new(VisionConfig::from_env())),
            gemini: Arc::new(GeminiClient::new(GeminiConfig::from_env())),
            openai: Arc::new(OpenAiClient::new(OpenAiConfig::from_env())),
            browser: Arc::new(BrowserClient::new(BrowserConfig::from_env())),
            ebay_refresh_token,
            ebay_network_enabled,
        }
    }

    pub fn demo() -> Self {
        Self::new(AppConfig::default())
    }

    // Public wrappers for granular stage endpoints.
    pub async fn stage_resolve_images(
        &self,
        request: &ListingRequest,
    ) -> Result<Vec<ImageAttachment>, PipelineError> {
        let out = stages::resolve_images(request, &self.config, !self.config.demo_mode).await?;
        Ok(out.value)
    }

    pub async fn stage_extract_text(
        &self,
        images: &[ImageAttachment],
    ) -> Result<(crate::vision::OcrOutcome, Value), PipelineError> {
        let out = stages::extract_text(&self.vision, images).await?;
        Ok((out.value, out.output))
    }

    pub async fn stage_identify(
        &self,
        request: &ListingRequest,
        images: &[ImageAttachment],
        ocr: &crate::vision::OcrOutcome,
    ) -> Result<IdentificationResult, PipelineError> {
        let runner = PhaseRunner::new(&self.config, &self.gemini, &self.openai, &self.browser);
        let out = stages::identify_part(&runner, request, images, ocr).await?;
        Ok(out.value)
    }

    pub async fn stage_estimate_price(
        &self,
        request: &ListingRequest,
        identification: &IdentificationResult,
    ) -> Result<PricingResult, PipelineError> {
        let comps = self.fetch_sold_comps(identification).await;
        let out = stages::estimate_price(request, identification, comps).await?;
        Ok(out.value)
    }

    pub async fn run(
        &self,
        request: ListingRequest,
    ) -> Result<ListingDraftResponse, PipelineError> {
        let request = Arc::new(request);
        let mut stages = Vec::new();

        let images = self
            .capture_stage("resolve_images", &mut stages, {
                let req = request.clone();
                let config = self.config.clone();
                let fetch = !self.config.demo_mode;
                async move { stages::resolve_images(&req, &config, fetch).await }
            })
            .await?;

        let ocr = self
            .capture_stage("extract_text", &mut stages, {
                let vision = self.vision.clone();
                let images = images.clone();
                async move { stages::extract_text(&vision, &images).await }
            })
            .await?;

        let runner = PhaseRunner::new(&self.config, &self.gemini, &self.openai, &self.browser);
        let identification = self
            .capture_stage("identify_part", &mut stages, {
                let req = request.clone();
                let images = images.clone();
                let ocr = ocr.clone();
                async move { stages::identify_part(&runner, &req, &images, &ocr).await }
            })
            .await?;

        let comps = self.fetch_sold_comps(&identification).await;
        let pricing = self
            .capture_stage("estimate_price", &mut stages, {
                let req = request.clone();
                let identification = identification.clone();
                async move { stages::estimate_price(&req, &identification, comps).await }
            })
            .await?;

        let original_names: Vec<String> = images.iter().map(|img| img.name.clone()).collect();
        let draft = self
            .capture_stage("assemble_listing", &mut stages, {
                let req = request.clone();
                let identification = identification.clone();
                let pricing = pricing.clone();
                async move {
                    stages::assemble_listing(&req, &identification, &pricing, &original_names)
                        .await
                }
            })
            .await?;

        if request.dry_run {
            return Ok(ListingDraftResponse {
                draft_id: format!("PREVIEW-{}", Uuid::new_v4().simple()),
                part: draft.part,
                stages,
            });
        }

        let ebay_token = if self.ebay_network_enabled {
            Some(self.fetch_sell_token().await?)
        } else {
            None
        };

        let receipt = self
            .capture_stage("create_draft", &mut stages, {
                let req = request.clone();
                let draft = draft.clone();
                async move { stages::create_listing_draft(&req, &draft, ebay_token.as_deref()).await }
            })
            .await?;

        Ok(ListingDraftResponse {
            draft_id: receipt.offer_id,
            part: draft.part,
            stages,
        })
    }

    /// Pull sold comps for pricing. Comps are best-effort signal: any auth or
    /// browse failure degrades to an empty sample, which the pricing layer
    /// answers with the heuristic table.
    async fn fetch_sold_comps(&self, identification: &IdentificationResult) -> Vec<SoldComp> {
        if !self.ebay_network_enabled {
            return Vec::new();
        }
        let query = identification
            .part_number
            .as_deref()
            .unwrap_or(&identification.part_name);
        let token = match get_app_access_token(BROWSE_SCOPES).await {
            Ok(token) => token,
            Err(err) => {
                warn!(target = "partscout.ebay", error = %err, "comps_auth_failed");
                return Vec::new();
            }
        };
        match search_sold_comps(query, &token, SOLD_COMP_LIMIT).await {
            Ok(comps) => comps,
            Err(err) => {
                warn!(target = "partscout.ebay", error = %err, "comps_search_failed");
                Vec::new()
            }
        }
    }

    async fn fetch_sell_token(&self) -> Result<String, PipelineError> {
        let refresh = self
            .ebay_refresh_token
            .as_ref()
            .ok_or_else(|| PipelineError::internal("ebay_auth", "EBAY_REFRESH_TOKEN is not set"))?;
        get_user_access_token_from_refresh(refresh, SELL_SCOPES)
            .await
            .map_err(|err| PipelineError::internal("ebay_auth", err.to_string()))
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

/// Assembled listing content, ready for the draft call (or for a dry-run
/// response).
#[derive(Debug, Clone)]
pub struct ListingDraft {
    pub part: PartInfo,
    pub title: String,
    pub description_html: String,
    pub category_id: String,
}

pub mod stages {
    use super::*;
    use crate::identify::prompt::classify;
    use crate::vision::OcrOutcome;

    pub async fn resolve_images(
        request: &ListingRequest,
        config: &AppConfig,
        fetch: bool,
    ) -> Result<StageOutcome<Vec<ImageAttachment>>, PipelineError> {
        let resolved = match request.images_source.clone() {
            ImagesSource::Single(value) => tokenize(&value),
            ImagesSource::Multiple(values) => values
                .into_iter()
                .flat_map(|value| tokenize(&value))
                .collect::<Vec<_>>(),
        };
        let resolved = deduplicate(
            resolved
                .into_iter()
                .filter(|entry| !entry.is_empty())
                .collect(),
        );

        if resolved.is_empty() {
            return Err(PipelineError::invalid_input(
                "resolve_images",
                "no images provided",
            ));
        }
        if resolved.len() > config.max_images {
            return Err(PipelineError::invalid_input(
                "resolve_images",
                "too_many_images",
            ));
        }

        let mut attachments = Vec::with_capacity(resolved.len());
        for (idx, source) in resolved.iter().enumerate() {
            attachments.push(load_attachment(source, idx, fetch).await?);
        }

        let preview: Vec<&str> = attachments
            .iter()
            .take(4)
            .map(|att| att.name.as_str())
            .collect();
        let output = json!({
            "count": attachments.len(),
            "preview": preview,
            "fetched": fetch,
        });
        Ok(StageOutcome::new(attachments, output))
    }

    pub async fn extract_text(
        vision: &VisionClient,
        images: &[ImageAttachment],
    ) -> Result<StageOutcome<OcrOutcome>, PipelineError> {
        let outcome = vision.extract_text(images).await;
        let scenario = classify(&outcome.full_text, &outcome.candidates).to_string();
        let output = json!({
            "scenario": scenario,
            "text_chars": outcome.full_text.chars().count(),
            "candidates": outcome.candidates,
        });
        Ok(StageOutcome::new(outcome, output))
    }

    pub async fn identify_part(
        runner: &PhaseRunner<'_>,
        request: &ListingRequest,
        images: &[ImageAttachment],
        ocr: &OcrOutcome,
    ) -> Result<StageOutcome<IdentificationResult>, PipelineError> {
        let ctx = PhaseContext {
            images,
            ocr_text: &ocr.full_text,
            candidates: &ocr.candidates,
            vin: request.vin.as_deref(),
        };
        let result = runner.identify(&ctx, request.force_fallback).await;
        let output = json!({
            "part_name": result.part_name,
            "part_number": result.part_number,
            "confidence": result.confidence_score,
            "method": result.method_used,
            "issues": result.issues,
        });
        Ok(StageOutcome::new(result, output))
    }

    pub async fn estimate_price(
        request: &ListingRequest,
        identification: &IdentificationResult,
        comps: Vec<SoldComp>,
    ) -> Result<StageOutcome<PricingResult>, PipelineError> {
        let result = pricing::estimate(
            &identification.part_name,
            request.condition.as_deref(),
            &comps,
        );
        let output = json!({
            "market_backed": result.success,
            "data_points": result.data_points,
            "suggested_price": result.suggested_price,
            "quick_sale_price": result.quick_sale_price,
        });
        Ok(StageOutcome::new(result, output))
    }

    pub async fn assemble_listing(
        request: &ListingRequest,
        identification: &IdentificationResult,
        pricing: &PricingResult,
        original_images: &[String],
    ) -> Result<StageOutcome<ListingDraft>, PipelineError> {
        // The winning phase already parsed this text once for scoring; parse
        // it again here so the assembler sees every extracted field, not just
        // the summary carried on the identification result.
        let raw_text = identification
            .raw_response
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let parsed = parse_response(raw_text);

        let mut part = PartInfo {
            part_name: identification.part_name.clone(),
            part_numbers: parsed.part_numbers.clone(),
            brand: non_empty(&parsed.brand),
            make: non_empty(&parsed.make),
            model: non_empty(&parsed.model),
            year_range: non_empty(&parsed.year_range),
            color: non_empty(&parsed.color),
            condition: request
                .condition
                .clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| non_empty(&parsed.condition)),
            is_oem: parsed.is_oem,
            estimated_price: Some(pricing.suggested_price),
            market_price: Some(pricing.average_price),
            quick_sale_price: Some(pricing.quick_sale_price),
            description: non_empty(&identification.description),
            compatibility: non_empty(&parsed.compatibility),
            category: parsed.category.clone(),
            images: Vec::new(),
        };
        part.images = assemble::process_images(&part, original_images);

        let title = assemble::build_title(&part);
        let description_html = assemble::build_description(&part);
        let draft = ListingDraft {
            part,
            title: title.clone(),
            description_html,
            category_id: DEFAULT_EBAY_CATEGORY_ID.to_string(),
        };

        let output = json!({
            "title": title,
            "title_chars": title.chars().count(),
            "category": draft.part.category,
            "image_count": draft.part.images.len(),
            "suggested_price": pricing.suggested_price,
        });
        Ok(StageOutcome::new(draft, output))
    }

    /// Stand up the unpublished offer. Without a sell token this produces a
    /// local receipt so demo deployments still return a stable draft id.
    pub async fn create_listing_draft(
        request: &ListingRequest,
        draft: &ListingDraft,
        access_token: Option<&str>,
    ) -> Result<StageOutcome<DraftReceipt>, PipelineError> {
        let sku = format!("PART-{}", Uuid::new_v4().simple());
        let price = draft.part.estimated_price.unwrap_or(0.0);
        let draft_request = DraftListingRequest {
            sku: sku.clone(),
            marketplace_id: request.marketplace.ebay_code().to_string(),
            category_id: draft.category_id.clone(),
            title: draft.title.clone(),
            description: draft.description_html.clone(),
            condition: ebay_condition(draft.part.condition.as_deref()),
            price_value: format!("{price:.2}"),
            currency: "USD".to_string(),
            aspects: build_aspects(&draft.part),
            image_urls: draft
                .part
                .images
                .iter()
                .filter(|img| img.original.starts_with("http"))
                .map(|img| img.original.clone())
                .collect(),
        };

        let receipt = match access_token {
            Some(token) => create_draft(&draft_request, token)
                .await
                .map_err(|err| PipelineError::internal("create_draft", err.to_string()))?,
            None => DraftReceipt {
                offer_id: format!("DRAFT-{}", Uuid::new_v4().simple()),
                sku,
                status: "DRAFT",
            },
        };

        let output = json!({
            "offer_id": receipt.offer_id,
            "sku": receipt.sku,
            "status": receipt.status,
            "marketplace": draft_request.marketplace_id,
            "price": draft_request.price_value,
            "remote": access_token.is_some(),
        });
        Ok(StageOutcome::new(receipt, output))
    }

    async fn load_attachment(
        source: &str,
        idx: usize,
        fetch: bool,
    ) -> Result<ImageAttachment, PipelineError> {
        if let Some(rest) = source.strip_prefix("data:") {
            return decode_data_uri(rest, idx);
        }

        let parsed = reqwest::Url::parse(source).map_err(|_| {
            PipelineError::invalid_input("resolve_images", format!("invalid_image_url: {source}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PipelineError::invalid_input(
                "resolve_images",
                format!("unsupported_url_scheme: {source}"),
            ));
        }

        let name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("image-{}.jpg", idx + 1));
        let mime_type = mime_from_name(&name);

        // Bytes are only needed for real model calls; demo mode keeps the
        // attachment as a named placeholder.
        let data = if fetch {
            fetch_image_bytes(source).await?
        } else {
            Vec::new()
        };

        Ok(ImageAttachment {
            name,
            mime_type,
            data,
        })
    }

    async fn fetch_image_bytes(url: &str) -> Result<Vec<u8>, PipelineError> {
        let client = crate::http::build_client();
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|err| PipelineError::internal("resolve_images", err.to_string()))?;
        if !response.status().is_success() {
            return Err(PipelineError::internal(
                "resolve_images",
                format!("image fetch HTTP {}", response.status()),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| PipelineError::internal("resolve_images", err.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn decode_data_uri(rest: &str, idx: usize) -> Result<ImageAttachment, PipelineError> {
        use base64::{Engine, engine::general_purpose::STANDARD};

        let (header, payload) = rest.split_once(',').ok_or_else(|| {
            PipelineError::invalid_input("resolve_images", "malformed data URI")
        })?;
        if !header.ends_with(";base64") {
            return Err(PipelineError::invalid_input(
                "resolve_images",
                "data URI must be base64 encoded",
            ));
        }
        let mime_type = header
            .trim_end_matches(";base64")
            .trim()
            .to_string();
        let mime_type = if mime_type.is_empty() {
            "image/jpeg".to_string()
        } else {
            mime_type
        };
        let data = STANDARD.decode(payload.trim()).map_err(|err| {
            PipelineError::invalid_input("resolve_images", format!("invalid base64: {err}"))
        })?;

        let extension = mime_type.rsplit('/').next().unwrap_or("jpg");
        Ok(ImageAttachment {
            name: format!("upload-{}.{extension}", idx + 1),
            mime_type,
            data,
        })
    }

    fn mime_from_name(name: &str) -> String {
        match name.rsplit('.').next().map(str::to_lowercase).as_deref() {
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("gif") => "image/gif",
            Some("heic") => "image/heic",
            _ => "image/jpeg",
        }
        .to_string()
    }

    fn ebay_condition(condition: Option<&str>) -> String {
        let Some(raw) = condition else {
            return "USED_GOOD".to_string();
        };
        let lower = raw.to_lowercase();
        if lower.contains("new") {
            "NEW"
        } else if lower.contains("parts") || lower.contains("broken") || lower.contains("damaged") {
            "FOR_PARTS_OR_NOT_WORKING"
        } else {
            "USED_GOOD"
        }
        .to_string()
    }

    fn build_aspects(part: &PartInfo) -> BTreeMap<String, Vec<String>> {
        let mut aspects = BTreeMap::new();
        if let Some(brand) = part.brand.as_deref() {
            aspects.insert("Brand".to_string(), vec![brand.to_string()]);
        }
        if !part.part_numbers.is_empty() {
            aspects.insert(
                "Manufacturer Part Number".to_string(),
                part.part_numbers.clone(),
            );
        }
        if let Some(color) = part.color.as_deref() {
            aspects.insert("Color".to_string(), vec![color.to_string()]);
        }
        aspects
    }

    fn tokenize(value: &str) -> Vec<String> {
        // Data URIs carry commas in their payload, so only bare URL lists are
        // split on separators.
        if value.starts_with("data:") {
            return vec![value.trim().to_string()];
        }
        if value.chars().any(|ch| matches!(ch, '\n' | ',' | ';' | '|')) {
            value
                .split(['\n', ',', ';', '|'])
                .map(|entry| entry.trim())
                .filter(|entry| !entry.is_empty())
                .map(|entry| entry.to_string())
                .collect()
        } else {
            vec![value.trim().to_string()]
        }
    }

    fn deduplicate(values: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for value in values {
            if seen.insert(value.clone()) {
                result.push(value);
            }
        }
        result
    }

    fn non_empty(value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn parse_env_bool(key: &str) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketplaceId;

    fn sample_request() -> ListingRequest {
        ListingRequest {
            images_source: ImagesSource::Multiple(vec![
                "https://example.com/parts/front.jpg".to_string(),
                "https://example.com/parts/back.jpg".to_string(),
            ]),
            vin: None,
            condition: None,
            marketplace: MarketplaceId::EbayUs,
            force_fallback: false,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn resolve_images_keeps_names_without_fetching() {
        let req = sample_request();
        let out = stages::resolve_images(&req, &AppConfig::default(), false)
            .await
            .expect("resolve_images");
        assert_eq!(out.value.len(), 2);
        assert_eq!(out.value[0].name, "front.jpg");
        assert!(out.value[0].data.is_empty());
        assert_eq!(out.output["count"], json!(2));
    }

    #[tokio::test]
    async fn resolve_images_rejects_non_http_schemes() {
        let req = ListingRequest {
            images_source: ImagesSource::Single("ftp://example.com/a.jpg".to_string()),
            ..sample_request()
        };
        let err = stages::resolve_images(&req, &AppConfig::default(), false)
            .await
            .expect_err("should reject");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
        assert_eq!(err.stage(), "resolve_images");
    }

    #[tokio::test]
    async fn resolve_images_rejects_empty_and_oversized_batches() {
        let empty = ListingRequest {
            images_source: ImagesSource::Single("   ".to_string()),
            ..sample_request()
        };
        let err = stages::resolve_images(&empty, &AppConfig::default(), false)
            .await
            .expect_err("should reject");
        assert_eq!(err.detail(), "no images provided");

        let urls = (0..10)
            .map(|i| format!("https://example.com/{i}.jpg"))
            .collect::<Vec<_>>();
        let oversized = ListingRequest {
            images_source: ImagesSource::Multiple(urls),
            ..sample_request()
        };
        let err = stages::resolve_images(&oversized, &AppConfig::default(), false)
            .await
            .expect_err("should reject");
        assert_eq!(err.detail(), "too_many_images");
    }

    #[tokio::test]
    async fn resolve_images_decodes_data_uris() {
        let req = ListingRequest {
            images_source: ImagesSource::Single(
                "data:image/png;base64,aGVsbG8=".to_string(),
            ),
            ..sample_request()
        };
        let out = stages::resolve_images(&req, &AppConfig::default(), false)
            .await
            .expect("resolve_images");
        assert_eq!(out.value.len(), 1);
        assert_eq!(out.value[0].mime_type, "image/png");
        assert_eq!(out.value[0].data, b"hello");
        assert!(out.value[0].name.ends_with(".png"));
    }

    #[tokio::test]
    async fn pipeline_run_stage_sequence() {
        let pipeline = Pipeline::demo();
        let resp = pipeline.run(sample_request()).await.expect("pipeline run");
        let names: Vec<String> = resp.stages.iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "resolve_images",
                "extract_text",
                "identify_part",
                "estimate_price",
                "assemble_listing",
                "create_draft",
            ]
        );
        assert!(resp.draft_id.starts_with("DRAFT-"));
        assert!(!resp.part.part_name.is_empty());
        assert!(resp.part.estimated_price.unwrap_or(0.0) > 0.0);
        assert!(!resp.part.images.is_empty());
        assert!(resp.part.images[0].is_main);
    }

    #[tokio::test]
    async fn pipeline_dry_run_stops_before_draft_creation() {
        let pipeline = Pipeline::demo();
        let mut req = sample_request();
        req.dry_run = true;
        let resp = pipeline.run(req).await.expect("pipeline run");
        let names: Vec<String> = resp.stages.iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "resolve_images",
                "extract_text",
                "identify_part",
                "estimate_price",
                "assemble_listing",
            ]
        );
        assert!(resp.draft_id.starts_with("PREVIEW-"));
    }

    #[tokio::test]
    async fn demo_pricing_is_heuristic_without_comp_network() {
        let pipeline = Pipeline::demo();
        let identification = IdentificationResult {
            part_name: "Headlight Assembly".to_string(),
            part_number: Some("81110-06C10".to_string()),
            description: "Passenger side headlight".to_string(),
            confidence_score: 0.9,
            method_used: "gemini_standard_demo".to_string(),
            issues: vec![],
            raw_response: json!({ "text": "" }),
            timestamp: chrono::Utc::now(),
        };
        let result = pipeline
            .stage_estimate_price(&sample_request(), &identification)
            .await
            .expect("estimate_price");
        assert!(!result.success);
        assert_eq!(result.suggested_price, 75.0);
    }
}

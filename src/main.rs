mod assemble;
mod browser;
mod config;
mod ebay;
mod http;
mod identify;
mod jobs;
mod llm;
mod metrics;
mod models;
mod pipeline;
mod pricing;
mod security;
mod vision;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use config::AppConfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, IdentificationResult, ListingDraftResponse, ListingRequest};
use pipeline::{Pipeline, PipelineError, PipelineErrorKind};
use security::{AuthContext, AuthState, require_api_auth};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "partscout.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let auth_state = AuthState::from_env();
    let app_config = AppConfig::from_env();
    if app_config.demo_mode {
        info!(
            target = "partscout.api",
            "no GEMINI_API_KEY configured; model calls will return demo responses"
        );
    }
    let pipeline = Pipeline::new(app_config);
    let (queue, _worker) = jobs::JobQueue::spawn(pipeline.clone());
    let openapi: serde_json::Value = serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or(json!({"openapi": "3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| eyre::eyre!("prometheus recorder: {err}"))?;
    let state = AppState {
        pipeline,
        queue,
        openapi: Arc::new(openapi),
        idempotency: Arc::new(Mutex::new(HashMap::new())),
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/listings", post(create_listing))
        .route("/identify", post(identify_part))
        .nest(
            "/stages",
            Router::new()
                .route("/resolve_images", post(stage_resolve_images))
                .route("/extract_text", post(stage_extract_text))
                .route("/estimate_price", post(stage_estimate_price))
                .route("/build_title", post(stage_build_title)),
        )
        .nest(
            "/jobs",
            Router::new()
                .route("/listings", post(enqueue_listing_job))
                .route("/{id}", get(get_job_status)),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "partscout.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    queue: jobs::JobQueue,
    openapi: Arc<serde_json::Value>,
    idempotency: Arc<Mutex<HashMap<String, ListingDraftResponse>>>,
    prometheus_handle: PrometheusHandle,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "partscout-api-rs",
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::Pipeline(PipelineError::invalid_input(
                "docs",
                "unauthorized",
            )));
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>PartScout API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        // Data URIs inflate request bodies, so the default is generous.
        .unwrap_or(8 * 1024 * 1024)
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

/// Run the full photos → draft-listing pipeline.
///
/// - Method: `POST`
/// - Path: `/listings`
/// - Auth: `Authorization: Bearer <key>` or `X-PartScout-Key: <key>`
/// - Body: `ListingRequest`
/// - Response: `ListingDraftResponse` (draft id + per-stage transcript)
///
/// An `Idempotency-Key` header makes retries return the first response
/// instead of creating a second draft.
async fn create_listing(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<ListingRequest>,
) -> Result<Json<ListingDraftResponse>, AppError> {
    crate::metrics::inc_requests("/listings");
    info!(
        target = "partscout.api",
        seller = %context.seller_id,
        api_key = %context.api_key_id,
        dry_run = payload.dry_run,
        "listing pipeline invoked",
    );

    if let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        if let Some(existing) = state.idempotency.lock().await.get(&key).cloned() {
            return Ok(Json(existing));
        }
        let response = state.pipeline.run(payload).await?;
        state.idempotency.lock().await.insert(key, response.clone());
        return Ok(Json(response));
    }

    let response = state.pipeline.run(payload).await?;
    Ok(Json(response))
}

/// Identification only: resolve images, OCR, run the phase chain. No
/// pricing, no draft.
///
/// - Method: `POST`
/// - Path: `/identify`
/// - Body: `ListingRequest` (dry_run/marketplace ignored)
async fn identify_part(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ListingRequest>,
) -> Result<Json<IdentificationResult>, AppError> {
    crate::metrics::inc_requests("/identify");
    info!(
        target = "partscout.api",
        seller = %context.seller_id,
        "identification invoked",
    );
    let images = state.pipeline.stage_resolve_images(&payload).await?;
    let (ocr, _) = state.pipeline.stage_extract_text(&images).await?;
    let result = state.pipeline.stage_identify(&payload, &images, &ocr).await?;
    Ok(Json(result))
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_listing_job(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ListingRequest>,
) -> Result<Json<EnqueueResponse>, AppError> {
    crate::metrics::inc_requests("/jobs/listings");
    let id = state
        .queue
        .enqueue_listing(payload, context)
        .await
        .map_err(|err| AppError::Pipeline(PipelineError::internal("enqueue", err.error)))?;
    Ok(Json(EnqueueResponse {
        job_id: id.to_string(),
    }))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "jobs",
            "invalid_job_id",
        )));
    };
    if let Some(info) = state.queue.get(uuid).await {
        Ok(Json(info))
    } else {
        Err(AppError::Pipeline(PipelineError::invalid_input(
            "jobs",
            "not_found",
        )))
    }
}

// -------- Stage endpoints (manual granular control) --------

#[derive(Debug, Deserialize)]
struct ImagesOnlyRequest {
    images_source: models::ImagesSource,
}

impl ImagesOnlyRequest {
    fn into_listing_request(self) -> ListingRequest {
        ListingRequest {
            images_source: self.images_source,
            vin: None,
            condition: None,
            marketplace: models::MarketplaceId::default(),
            force_fallback: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResolveImagesResponse {
    count: usize,
    names: Vec<String>,
}

async fn stage_resolve_images(
    State(state): State<AppState>,
    Json(req): Json<ImagesOnlyRequest>,
) -> Result<Json<ResolveImagesResponse>, AppError> {
    crate::metrics::inc_requests("/stages/resolve_images");
    let listing = req.into_listing_request();
    let images = state.pipeline.stage_resolve_images(&listing).await?;
    Ok(Json(ResolveImagesResponse {
        count: images.len(),
        names: images.into_iter().map(|img| img.name).collect(),
    }))
}

#[derive(Debug, Serialize)]
struct ExtractTextResponse {
    scenario: String,
    text: String,
    candidates: Vec<String>,
}

async fn stage_extract_text(
    State(state): State<AppState>,
    Json(req): Json<ImagesOnlyRequest>,
) -> Result<Json<ExtractTextResponse>, AppError> {
    crate::metrics::inc_requests("/stages/extract_text");
    let listing = req.into_listing_request();
    let images = state.pipeline.stage_resolve_images(&listing).await?;
    let (ocr, output) = state.pipeline.stage_extract_text(&images).await?;
    let scenario = output
        .get("scenario")
        .and_then(|v| v.as_str())
        .unwrap_or("C")
        .to_string();
    Ok(Json(ExtractTextResponse {
        scenario,
        text: ocr.full_text,
        candidates: ocr.candidates,
    }))
}

#[derive(Debug, Deserialize)]
struct EstimatePriceRequest {
    part_name: String,
    #[serde(default)]
    part_number: Option<String>,
    #[serde(default)]
    condition: Option<String>,
}

async fn stage_estimate_price(
    State(state): State<AppState>,
    Json(req): Json<EstimatePriceRequest>,
) -> Result<Json<models::PricingResult>, AppError> {
    crate::metrics::inc_requests("/stages/estimate_price");
    if req.part_name.trim().is_empty() {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "estimate_price",
            "part_name is required",
        )));
    }
    let listing = ListingRequest {
        images_source: models::ImagesSource::Multiple(vec![]),
        vin: None,
        condition: req.condition,
        marketplace: models::MarketplaceId::default(),
        force_fallback: false,
        dry_run: false,
    };
    let identification = IdentificationResult {
        part_name: req.part_name,
        part_number: req.part_number,
        description: String::new(),
        confidence_score: 1.0,
        method_used: "manual".to_string(),
        issues: vec![],
        raw_response: serde_json::Value::Null,
        timestamp: chrono::Utc::now(),
    };
    let result = state
        .pipeline
        .stage_estimate_price(&listing, &identification)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct BuildTitleResponse {
    title: String,
    title_chars: usize,
    description: String,
}

async fn stage_build_title(
    Json(part): Json<models::PartInfo>,
) -> Result<Json<BuildTitleResponse>, AppError> {
    crate::metrics::inc_requests("/stages/build_title");
    if part.part_name.trim().is_empty() {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "build_title",
            "part_name is required",
        )));
    }
    let title = assemble::build_title(&part);
    let description = assemble::build_description(&part);
    Ok(Json(BuildTitleResponse {
        title_chars: title.chars().count(),
        title,
        description,
    }))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

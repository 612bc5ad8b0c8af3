use crate::analysis::{AnalysisResult, Analyzer};
use crate::config::Config;
use crate::detectors::{self, DetectorInfo};
use crate::error::AnalysisError;
use crate::preprocessing::Preset;
use crate::taxonomy::{self, PestClass};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

/// Room for multipart framing and small form fields beyond the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    /// Held for the duration of one analysis; each pass already saturates
    /// the CPU and a detector instance is never driven concurrently
    pub analysis_gate: Arc<Mutex<()>>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(analyzer: Analyzer, config: Config) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            analysis_gate: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub detector_ready: bool,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub detector: Option<DetectorInfo>,
    pub detector_error: Option<String>,
    pub available_detectors: Vec<&'static str>,
    pub presets: Vec<&'static str>,
    pub classes: Vec<&'static str>,
    pub scales: Vec<f32>,
    pub sizes: Vec<u32>,
    pub max_file_size_bytes: usize,
}

#[derive(Serialize)]
pub struct RecommendationsResponse {
    pub label: String,
    pub recommendations: &'static [&'static str],
}

/// Query options accepted by the analysis endpoints
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeParams {
    pub preset: Option<String>,
}

/// Uploaded image plus options from a multipart form
struct Upload {
    image: DynamicImage,
    preset: Option<Preset>,
}

/// Build the router; split from `run` so tests can drive it directly
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/annotate", post(handle_annotate))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .route("/recommendations/:label", get(handle_recommendations))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let analyzer = Analyzer::from_config(&config.pipeline)?;
    let addr = format!("{}:{}", config.host, config.port);

    let app = router(AppState::new(analyzer, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn parse_preset(value: &str) -> Result<Preset, AnalysisError> {
    Preset::parse(value.trim())
        .ok_or_else(|| AnalysisError::InvalidRequest(format!("Unknown preset: {}", value)))
}

/// Body-limit overruns surface as multipart errors; report them as 413
fn multipart_error(e: MultipartError, headers: &HeaderMap, max: usize) -> AnalysisError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(max);
        return AnalysisError::ImageTooLarge { size, max };
    }
    AnalysisError::InvalidRequest(format!("Failed to parse multipart: {}", e))
}

async fn read_upload(
    state: &AppState,
    params: AnalyzeParams,
    headers: &HeaderMap,
    mut multipart: Multipart,
) -> Result<Upload, AnalysisError> {
    let max = state.config.max_file_size;
    let mut file_data: Option<Bytes> = None;
    let mut preset = params.preset.as_deref().map(parse_preset).transpose()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, headers, max))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                file_data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, headers, max))?,
                );
            }
            "preset" => {
                let value = field.text().await.map_err(|e| {
                    AnalysisError::InvalidRequest(format!("Invalid preset: {}", e))
                })?;
                preset = Some(parse_preset(&value)?);
            }
            _ => {}
        }
    }

    let data = file_data.ok_or(AnalysisError::MissingFile)?;

    if data.len() > max {
        return Err(AnalysisError::ImageTooLarge {
            size: data.len(),
            max,
        });
    }

    let image = image::load_from_memory(&data)
        .map_err(|e| AnalysisError::InvalidInput(format!("Failed to decode image: {}", e)))?;

    Ok(Upload { image, preset })
}

/// Run the analyzer off the async runtime.
///
/// Waiting for the gate and running the analysis are each bounded by the
/// configured deadline. The gate guard moves into the blocking task, so an
/// analysis that outlives its request keeps the gate until it really ends
/// and no blocking thread is ever parked waiting for it.
async fn run_analysis(state: &AppState, upload: Upload) -> Result<AnalysisResult, AnalysisError> {
    let timeout_secs = state.config.analysis_timeout_secs;
    let deadline = Duration::from_secs(timeout_secs);

    let guard = tokio::time::timeout(deadline, state.analysis_gate.clone().lock_owned())
        .await
        .map_err(|_| {
            tracing::warn!("Gave up waiting {}s for a running analysis", timeout_secs);
            AnalysisError::Timeout(timeout_secs)
        })?;

    let analyzer = state.analyzer.clone();
    let task = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let preset = upload.preset.unwrap_or(analyzer.config().preset);
        analyzer.analyze_with_preset(&upload.image, preset)
    });

    match tokio::time::timeout(deadline, task).await {
        Ok(joined) => {
            joined.map_err(|e| AnalysisError::Internal(format!("Analysis task failed: {}", e)))?
        }
        Err(_) => Err(AnalysisError::Timeout(timeout_secs)),
    }
}

/// Handle analysis requests
async fn handle_analyze(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AnalysisError> {
    let upload = read_upload(&state, params, &headers, multipart).await?;
    let result = run_analysis(&state, upload).await?;

    tracing::info!(
        "Analysis completed in {}ms, {} detections",
        result.stats.processing_time_ms,
        result.detections.len()
    );

    Ok(Json(result.report()).into_response())
}

/// Handle annotation requests; responds with the rendered PNG
async fn handle_annotate(
    State(state): State<AppState>,
    Query(params): Query<AnalyzeParams>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, AnalysisError> {
    let upload = read_upload(&state, params, &headers, multipart).await?;
    let result = run_analysis(&state, upload).await?;

    let mut png = Cursor::new(Vec::new());
    result
        .annotated
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| AnalysisError::RenderError(format!("Failed to encode PNG: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::HeaderName::from_static("x-detection-count"),
                result.detections.len().to_string(),
            ),
        ],
        png.into_inner(),
    )
        .into_response())
}

/// Handle health check requests
async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let detector_ready = state.analyzer.detector().is_some();

    Json(HealthResponse {
        status: if detector_ready { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        detector_ready,
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> Json<InfoResponse> {
    let analyzer = &state.analyzer;

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        detector: analyzer.detector().map(|d| DetectorInfo::of(d.as_ref())),
        detector_error: analyzer.unavailable_reason().map(str::to_string),
        available_detectors: detectors::available(),
        presets: vec![Preset::None.as_str(), Preset::Default.as_str()],
        classes: PestClass::ALL.iter().map(|c| c.name()).collect(),
        scales: analyzer.config().scales.clone(),
        sizes: analyzer.config().sizes.clone(),
        max_file_size_bytes: state.config.max_file_size,
    })
}

/// Handle treatment lookups
async fn handle_recommendations(
    Path(label): Path<String>,
) -> Result<Json<RecommendationsResponse>, AnalysisError> {
    let recommendations = taxonomy::recommendations(&label)?;
    Ok(Json(RecommendationsResponse {
        label,
        recommendations,
    }))
}

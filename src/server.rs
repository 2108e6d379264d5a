//! HTTP surface for the emotion service.
//!
//! Thin request/response glue over [`EmotionService`]; every route maps 1:1
//! onto one service operation.
//!
//! ## Endpoints
//!
//! - `GET  /health`: classifier availability
//! - `POST /v1/sessions/{session_id}/start`: begin continuous tracking
//! - `POST /v1/sessions/{session_id}/stop`: end tracking, release devices
//! - `GET  /v1/sessions/{session_id}/status`: tracking status
//! - `GET  /v1/sessions/{session_id}/latest`: most recent fusion result
//! - `GET  /v1/sessions/{session_id}/window`: sliding-window consistency
//! - `POST /v1/sessions/{session_id}/analyze`: synchronous out-of-cycle fusion

use crate::emotion::FusionResult;
use crate::error::EmotionError;
use crate::service::{ClassifierHealth, EmotionService};
use crate::session::{TrackingStatus, WindowConsistency};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

// ---------------------------------------------------------------------------
// Request/response types
// ---------------------------------------------------------------------------

/// Body for the analyze endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// Optional text sample to classify.
    #[serde(default)]
    pub text: Option<String>,
    /// Force an out-of-cycle capture on the session's channels.
    #[serde(default)]
    pub force_capture: bool,
}

/// Query parameters for the window-consistency endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowQuery {
    /// Number of recent results to consider.
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    5
}

/// Response for stop: status plus the released-resource confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    /// Tracking status after the stop.
    #[serde(flatten)]
    pub status: TrackingStatus,
    /// Devices still held by the session (always 0 after a stop).
    pub devices_held: usize,
}

/// Health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: `healthy` when every classifier is live, else
    /// `degraded`.
    pub status: String,
    /// Per-classifier availability.
    pub classifiers: Vec<ClassifierHealth>,
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: &EmotionError) -> ApiError {
    let status = match e {
        EmotionError::ResourceBusy(_) => StatusCode::CONFLICT,
        EmotionError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        EmotionError::NoInput => StatusCode::UNPROCESSABLE_ENTITY,
        EmotionError::SourceUnavailable(_) | EmotionError::Classifier(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Running HTTP server for the emotion service.
pub struct EmotionServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl EmotionServer {
    /// Start the server on `bind_addr` (use port `0` for auto-assign).
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(
        service: Arc<EmotionService>,
        bind_addr: &str,
    ) -> crate::error::Result<Self> {
        let app = router(service);

        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| EmotionError::Config(format!("server bind failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| EmotionError::Config(format!("failed to get local addr: {e}")))?;

        info!("emotion service listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("emotion server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for EmotionServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Build the router; exposed separately for in-process testing.
pub fn router(service: Arc<EmotionService>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/v1/sessions/{session_id}/start", post(handle_start))
        .route("/v1/sessions/{session_id}/stop", post(handle_stop))
        .route("/v1/sessions/{session_id}/status", get(handle_status))
        .route("/v1/sessions/{session_id}/latest", get(handle_latest))
        .route("/v1/sessions/{session_id}/window", get(handle_window))
        .route("/v1/sessions/{session_id}/analyze", post(handle_analyze))
        .with_state(service)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_health(State(service): State<Arc<EmotionService>>) -> Json<HealthResponse> {
    let classifiers = service.classifier_health();
    let status = if classifiers.iter().all(|c| c.available) {
        "healthy"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_owned(),
        classifiers,
    })
}

async fn handle_start(
    State(service): State<Arc<EmotionService>>,
    Path(session_id): Path<String>,
) -> Result<Json<TrackingStatus>, ApiError> {
    service
        .start_tracking(&session_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

async fn handle_stop(
    State(service): State<Arc<EmotionService>>,
    Path(session_id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let status = service
        .stop_tracking(&session_id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(StopResponse {
        devices_held: service.held_devices(&session_id),
        status,
    }))
}

async fn handle_status(
    State(service): State<Arc<EmotionService>>,
    Path(session_id): Path<String>,
) -> Result<Json<TrackingStatus>, ApiError> {
    service
        .tracking_status(&session_id)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

async fn handle_latest(
    State(service): State<Arc<EmotionService>>,
    Path(session_id): Path<String>,
) -> Result<Json<FusionResult>, ApiError> {
    match service.latest_emotion(&session_id).await {
        Ok(Some(result)) => Ok(Json(result)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no fusion result yet for session '{session_id}'"),
            }),
        )),
        Err(e) => Err(error_response(&e)),
    }
}

async fn handle_window(
    State(service): State<Arc<EmotionService>>,
    Path(session_id): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<WindowConsistency>, ApiError> {
    service
        .window_consistency(&session_id, query.window)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

async fn handle_analyze(
    State(service): State<Arc<EmotionService>>,
    Path(session_id): Path<String>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<FusionResult>, ApiError> {
    service
        .analyze(&session_id, request.text.as_deref(), request.force_capture)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

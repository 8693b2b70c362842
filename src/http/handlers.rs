use super::state::AppState;
use crate::audio::AudioBackendFactory;
use crate::capture::{CaptureConfig, CaptureRecorder, CaptureState, CaptureStatus};
use crate::upload::VehicleInfo;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartCaptureRequest {
    /// Optional session ID (if not provided, generate UUID)
    pub session_id: Option<String>,

    /// Recording ceiling in seconds (default from service config)
    pub max_duration_secs: Option<u64>,

    /// Pre-roll countdown in seconds (default from service config)
    pub pre_roll_secs: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct StartCaptureResponse {
    pub session_id: String,
    pub state: CaptureState,
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct AnalyzeRequest {
    /// Vehicle metadata forwarded to the analysis backend unchanged
    pub vehicle_info: Option<VehicleInfo>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeErrorResponse {
    pub error: String,
    /// Upload failures leave the clip intact; retry without re-recording.
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /capture/start
/// Start a new capture session (runs the pre-roll countdown, acquires the
/// microphone, begins recording)
pub async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> impl IntoResponse {
    // Only one session per presentation context; a held clip or error must
    // be reset (or the session deleted) before recording again. The write
    // lock stays held from the occupancy check through the slot insert so
    // two racing starts cannot both see the slot free.
    let mut capture = state.capture.write().await;
    if let Some(recorder) = capture.as_ref() {
        let current = recorder.state().await;
        if current != CaptureState::Idle {
            warn!(state = ?current, "start rejected: capture slot occupied");
            return (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: format!(
                        "a capture session already exists (state: {:?}); stop, reset, or delete it first",
                        current
                    ),
                }),
            )
                .into_response();
        }
    }

    let config = CaptureConfig {
        session_id: req
            .session_id
            .unwrap_or_else(|| format!("capture-{}", uuid::Uuid::new_v4())),
        max_duration: req
            .max_duration_secs
            .map(Duration::from_secs)
            .unwrap_or(state.capture_template.max_duration),
        pre_roll_secs: req
            .pre_roll_secs
            .unwrap_or(state.capture_template.pre_roll_secs),
        ..state.capture_template.clone()
    };
    let session_id = config.session_id.clone();

    info!(session_id = %session_id, "starting capture session");

    let backend = match AudioBackendFactory::create(
        state.audio_source.clone(),
        state.backend_config.clone(),
    ) {
        Ok(b) => b,
        Err(e) => {
            error!("failed to create audio backend: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("failed to create audio backend: {}", e),
                }),
            )
                .into_response();
        }
    };

    let recorder = Arc::new(CaptureRecorder::new(config));
    // Claim the session before the slot lock drops: the fresh recorder
    // must never be observable in `Idle`, or a parallel start would treat
    // it as free and admit a second device acquisition.
    recorder.claim().await;
    *capture = Some(Arc::clone(&recorder));
    drop(capture);

    // Capture-stage failures are session state, not transport errors: a
    // denied permission comes back as state = failed for the UI to render.
    match recorder.start(backend).await {
        Ok(new_state) => {
            let message = match new_state {
                CaptureState::Recording => "recording".to_string(),
                CaptureState::Failed => recorder
                    .status()
                    .await
                    .error
                    .unwrap_or_else(|| "capture failed".to_string()),
                other => format!("session is {:?}", other),
            };
            (
                StatusCode::OK,
                Json(StartCaptureResponse {
                    session_id,
                    state: new_state,
                    message,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("failed to start capture: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("failed to start capture: {}", e),
                }),
            )
                .into_response()
        }
    }
}

/// POST /capture/stop
/// Manually stop the active recording and finalize the clip
pub async fn stop_capture(State(state): State<AppState>) -> impl IntoResponse {
    let recorder = {
        let capture = state.capture.read().await;
        capture.as_ref().cloned()
    };

    match recorder {
        Some(recorder) => match recorder.stop().await {
            Ok(_) => (StatusCode::OK, Json(recorder.status().await)).into_response(),
            Err(e) => {
                error!("failed to stop capture: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: format!("failed to stop capture: {}", e),
                    }),
                )
                    .into_response()
            }
        },
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /capture/reset
/// Discard the held clip or error and return to idle ("re-record")
pub async fn reset_capture(State(state): State<AppState>) -> impl IntoResponse {
    let recorder = {
        let capture = state.capture.read().await;
        capture.as_ref().cloned()
    };

    match recorder {
        Some(recorder) => {
            recorder.reset().await;
            (StatusCode::OK, Json(recorder.status().await)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// DELETE /capture
/// Abandon the session entirely (view teardown): the device is released
/// without finalizing a clip
pub async fn delete_capture(State(state): State<AppState>) -> impl IntoResponse {
    let recorder = {
        let mut capture = state.capture.write().await;
        capture.take()
    };

    match recorder {
        Some(recorder) => {
            recorder.abandon().await;
            info!("capture session abandoned");
            StatusCode::NO_CONTENT.into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /capture/status
/// Snapshot of the current session for the presentation layer
pub async fn capture_status(State(state): State<AppState>) -> impl IntoResponse {
    let recorder = {
        let capture = state.capture.read().await;
        capture.as_ref().cloned()
    };

    match recorder {
        Some(recorder) => {
            let status: CaptureStatus = recorder.status().await;
            (StatusCode::OK, Json(status)).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session".to_string(),
            }),
        )
            .into_response(),
    }
}

/// POST /capture/analyze
/// Package the finalized clip and upload it to the analysis backend
pub async fn analyze_capture(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let recorder = {
        let capture = state.capture.read().await;
        capture.as_ref().cloned()
    };

    let Some(recorder) = recorder else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session".to_string(),
            }),
        )
            .into_response();
    };

    let Some(payload) = recorder.payload().await else {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "no finalized clip to analyze; stop a recording first".to_string(),
            }),
        )
            .into_response();
    };

    match state
        .upload
        .analyze(&payload, req.vehicle_info.as_ref())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            // The clip is untouched; the caller can retry this request
            // without re-recording.
            warn!("analysis upload failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(AnalyzeErrorResponse {
                    error: e.to_string(),
                    retryable: true,
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

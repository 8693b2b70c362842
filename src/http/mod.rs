//! HTTP API server (the presentation binding)
//!
//! This module provides the REST surface the UI drives the capture
//! session through:
//! - POST /capture/start - Start a capture attempt
//! - POST /capture/stop - Stop and finalize the clip
//! - POST /capture/reset - Discard clip/error, back to idle
//! - DELETE /capture - Abandon the session (release the device)
//! - GET /capture/status - Query session state
//! - POST /capture/analyze - Upload the clip for diagnosis
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{AnalyzeRequest, StartCaptureRequest, StartCaptureResponse};
pub use routes::create_router;
pub use state::AppState;

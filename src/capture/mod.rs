//! Capture session management
//!
//! This module provides the recording core of the service:
//! - `CaptureSession`: the pure lifecycle state machine for one attempt
//!   (idle, countdown, requesting, recording, stopped, failed)
//! - `CaptureRecorder`: the async driver binding a session to an audio
//!   backend and a periodic tick
//! - `Clip` / `UploadPayload`: finalized-clip packaging for the upload
//!   client
//! - `CaptureError`: the capture-stage error taxonomy

mod clip;
mod config;
mod error;
mod recorder;
mod session;
mod status;

pub use clip::{Clip, UploadPayload, WAV_CONTENT_TYPE};
pub use config::CaptureConfig;
pub use error::CaptureError;
pub use recorder::CaptureRecorder;
pub use session::{CaptureSession, CaptureState};
pub use status::{CaptureStatus, ClipSummary};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::clip::Clip;
use super::session::{CaptureSession, CaptureState};

/// Snapshot of a capture session for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStatus {
    /// Session identifier
    pub session_id: String,

    /// Current lifecycle state
    pub state: CaptureState,

    /// Elapsed recording time in seconds
    pub elapsed_secs: f64,

    /// Configured recording ceiling in seconds
    pub max_duration_secs: f64,

    /// Seconds left on the pre-roll countdown (0 when not counting down)
    pub countdown_remaining: u32,

    /// When recording last began (unset until the device was acquired)
    pub started_at: Option<DateTime<Utc>>,

    /// Finalized clip summary, present only when stopped
    pub clip: Option<ClipSummary>,

    /// Human-readable capture error, present only when failed
    pub error: Option<String>,
}

/// Summary of a finalized clip (the bytes themselves travel via the
/// upload payload, not the status endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct ClipSummary {
    pub content_type: String,
    pub size_bytes: usize,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl From<&Clip> for ClipSummary {
    fn from(clip: &Clip) -> Self {
        Self {
            content_type: clip.content_type().to_string(),
            size_bytes: clip.size_bytes(),
            duration_secs: clip.duration_secs(),
            sample_rate: clip.sample_rate(),
            channels: clip.channels(),
        }
    }
}

impl From<&CaptureSession> for CaptureStatus {
    fn from(session: &CaptureSession) -> Self {
        Self {
            session_id: session.config().session_id.clone(),
            state: session.state(),
            elapsed_secs: session.elapsed().as_secs_f64(),
            max_duration_secs: session.config().max_duration.as_secs_f64(),
            countdown_remaining: session.countdown_remaining(),
            started_at: session.started_at(),
            clip: session.clip().map(ClipSummary::from),
            error: session.error().map(|e| e.to_string()),
        }
    }
}

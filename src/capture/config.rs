use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Unique session identifier (e.g., "capture-2026-08-26-engine-idle")
    pub session_id: String,

    /// Recording ceiling. Reaching it while recording forces an automatic
    /// stop; elapsed time never exceeds it.
    pub max_duration: Duration,

    /// Granularity of the elapsed-time counter (1s in most screens of the
    /// original tool, 100ms in some)
    pub tick_interval: Duration,

    /// Pre-roll countdown in whole seconds before the device is acquired.
    /// Zero skips the `CountingDown` state entirely.
    pub pre_roll_secs: u32,

    /// Sample rate for the finalized clip (the analysis backend normalizes
    /// to 44.1kHz mono)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            session_id: format!("capture-{}", uuid::Uuid::new_v4()),
            max_duration: Duration::from_secs(10),
            tick_interval: Duration::from_secs(1),
            pre_roll_secs: 0,
            sample_rate: 44100,
            channels: 1,
        }
    }
}

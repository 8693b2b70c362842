use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::clip::{Clip, UploadPayload};
use super::config::CaptureConfig;
use super::error::CaptureError;

/// Lifecycle states of a capture session.
///
/// Exactly one enum value per session, with a fixed transition table —
/// illegal combinations (a clip while recording, an error while idle) are
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    /// No recording in progress, no clip held.
    Idle,
    /// Pre-roll countdown before device acquisition.
    CountingDown,
    /// Waiting on the platform's microphone permission/device gate.
    Requesting,
    /// Device held, elapsed time advancing.
    Recording,
    /// Clip finalized and held for playback/upload.
    Stopped,
    /// Device acquisition or capture failed; error held until reset.
    Failed,
}

/// One attempt to record a fixed-duration audio clip.
///
/// The machine is pure and synchronous: device acquisition outcomes are
/// injected through `device_acquired` / `fail`, samples through
/// `push_samples`, and time through `tick`. `CaptureRecorder` wires these
/// to a real backend and timer.
#[derive(Debug)]
pub struct CaptureSession {
    config: CaptureConfig,
    state: CaptureState,
    elapsed: Duration,
    countdown_remaining: u32,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    samples: Vec<i16>,
    clip: Option<Clip>,
    error: Option<CaptureError>,
}

impl CaptureSession {
    pub fn new(config: CaptureConfig) -> Self {
        let countdown_remaining = config.pre_roll_secs;
        Self {
            config,
            state: CaptureState::Idle,
            elapsed: Duration::ZERO,
            countdown_remaining,
            started_at: None,
            samples: Vec::new(),
            clip: None,
            error: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Elapsed recording time. Advances only while `Recording`, never past
    /// `max_duration`.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Seconds left on the pre-roll countdown (0 when not counting down).
    pub fn countdown_remaining(&self) -> u32 {
        match self.state {
            CaptureState::CountingDown => self.countdown_remaining,
            _ => 0,
        }
    }

    /// The finalized clip. `Some` if and only if `state == Stopped`.
    pub fn clip(&self) -> Option<&Clip> {
        self.clip.as_ref()
    }

    /// The capture error. `Some` if and only if `state == Failed`.
    pub fn error(&self) -> Option<&CaptureError> {
        self.error.as_ref()
    }

    /// Whether the session is somewhere between `start()` and finalization.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            CaptureState::CountingDown | CaptureState::Requesting | CaptureState::Recording
        )
    }

    /// Begin a recording attempt.
    ///
    /// Valid only from `Idle`; any other state is a rejected no-op that
    /// returns the current state unchanged (prevents double-acquisition of
    /// the microphone). Moves to `CountingDown` when a pre-roll is
    /// configured, otherwise straight to `Requesting`.
    pub fn start(&mut self) -> CaptureState {
        if self.state != CaptureState::Idle {
            warn!(
                session_id = %self.config.session_id,
                state = ?self.state,
                "start() rejected: session not idle"
            );
            return self.state;
        }

        self.state = if self.config.pre_roll_secs > 0 {
            self.countdown_remaining = self.config.pre_roll_secs;
            CaptureState::CountingDown
        } else {
            CaptureState::Requesting
        };

        info!(
            session_id = %self.config.session_id,
            state = ?self.state,
            "capture attempt started"
        );
        self.state
    }

    /// Advance the pre-roll countdown by one second.
    ///
    /// No-op outside `CountingDown`. Reaching zero moves to `Requesting`.
    pub fn countdown_tick(&mut self) -> CaptureState {
        if self.state != CaptureState::CountingDown {
            return self.state;
        }

        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        if self.countdown_remaining == 0 {
            self.state = CaptureState::Requesting;
        }
        self.state
    }

    /// The device gate granted access: recording begins now.
    ///
    /// Valid only from `Requesting`. Resets elapsed time and discards any
    /// previously buffered samples.
    pub fn device_acquired(&mut self) -> CaptureState {
        if self.state != CaptureState::Requesting {
            warn!(
                session_id = %self.config.session_id,
                state = ?self.state,
                "device_acquired() ignored: not requesting"
            );
            return self.state;
        }

        self.elapsed = Duration::ZERO;
        self.samples.clear();
        self.started_at = Some(chrono::Utc::now());
        self.state = CaptureState::Recording;
        info!(session_id = %self.config.session_id, "recording");
        self.state
    }

    /// When recording last began (set on device acquisition).
    pub fn started_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.started_at
    }

    /// Device acquisition or the capture stream failed.
    ///
    /// Valid from `Requesting` or `Recording`; the session holds the error
    /// until `reset()`. No clip is produced.
    pub fn fail(&mut self, error: CaptureError) -> CaptureState {
        if !matches!(
            self.state,
            CaptureState::Requesting | CaptureState::Recording
        ) {
            return self.state;
        }

        warn!(
            session_id = %self.config.session_id,
            error = %error,
            "capture attempt failed"
        );
        self.samples.clear();
        self.clip = None;
        self.error = Some(error);
        self.state = CaptureState::Failed;
        self.state
    }

    /// Append captured PCM samples. Ignored outside `Recording`.
    pub fn push_samples(&mut self, samples: &[i16]) {
        if self.state == CaptureState::Recording {
            self.samples.extend_from_slice(samples);
        }
    }

    /// Advance elapsed time by one tick interval.
    ///
    /// Ignored outside `Recording` — a timer that fires after `stop()` has
    /// finalized the session (manual/auto-stop race) is suppressed here.
    /// Reaching `max_duration` triggers the auto-stop policy: the session
    /// finalizes through the same path as a manual `stop()`.
    ///
    /// Returns `true` when this tick auto-stopped the session.
    pub fn tick(&mut self) -> Result<bool> {
        if self.state != CaptureState::Recording {
            debug!(
                session_id = %self.config.session_id,
                state = ?self.state,
                "stale tick ignored"
            );
            return Ok(false);
        }

        self.elapsed = (self.elapsed + self.config.tick_interval).min(self.config.max_duration);

        if self.elapsed >= self.config.max_duration {
            info!(
                session_id = %self.config.session_id,
                elapsed_secs = self.elapsed.as_secs_f64(),
                "max duration reached, auto-stopping"
            );
            self.stop()?;
            return Ok(true);
        }

        Ok(false)
    }

    /// Finalize the recording into a clip.
    ///
    /// Valid only from `Recording`; any other state is a no-op. This is the
    /// single finalization path — manual stop and auto-stop both land here,
    /// producing a clip of identical shape.
    pub fn stop(&mut self) -> Result<CaptureState> {
        if self.state != CaptureState::Recording {
            return Ok(self.state);
        }

        let clip = Clip::encode(&self.samples, self.config.sample_rate, self.config.channels)?;
        info!(
            session_id = %self.config.session_id,
            duration_secs = clip.duration_secs(),
            size_bytes = clip.size_bytes(),
            "clip finalized"
        );

        self.samples.clear();
        self.clip = Some(clip);
        self.state = CaptureState::Stopped;
        Ok(self.state)
    }

    /// Abandon the attempt without finalizing a clip.
    ///
    /// Cancellation, not completion: valid from any active state, returns
    /// to `Idle` with nothing retained. The caller is responsible for
    /// releasing the device (the recorder ties both together).
    pub fn cancel(&mut self) -> CaptureState {
        if !self.is_active() {
            return self.state;
        }

        info!(session_id = %self.config.session_id, "capture attempt cancelled");
        self.clear();
        self.state
    }

    /// Discard the clip or error and return to `Idle` ("re-record").
    ///
    /// Valid from `Stopped` or `Failed`; no-op elsewhere. The result is
    /// indistinguishable from a freshly constructed session.
    pub fn reset(&mut self) -> CaptureState {
        if !matches!(self.state, CaptureState::Stopped | CaptureState::Failed) {
            warn!(
                session_id = %self.config.session_id,
                state = ?self.state,
                "reset() ignored: session not stopped or failed"
            );
            return self.state;
        }

        info!(session_id = %self.config.session_id, "session reset");
        self.clear();
        self.state
    }

    fn clear(&mut self) {
        self.started_at = None;
        self.samples.clear();
        self.clip = None;
        self.error = None;
        self.elapsed = Duration::ZERO;
        self.countdown_remaining = self.config.pre_roll_secs;
        self.state = CaptureState::Idle;
    }

    /// Package the clip for upload.
    ///
    /// `Some` only from `Stopped`. Does not mutate the session — it retains
    /// its own copy of the clip, so this may be called repeatedly (retry
    /// after a failed upload needs no re-record).
    pub fn packaged_payload(&self) -> Option<UploadPayload> {
        let clip = self.clip.as_ref()?;
        Some(UploadPayload {
            file_name: format!("{}.wav", self.config.session_id),
            content_type: clip.content_type(),
            bytes: clip.bytes().to_vec(),
            duration_secs: clip.duration_secs(),
        })
    }
}

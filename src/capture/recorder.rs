use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::clip::UploadPayload;
use super::config::CaptureConfig;
use super::error::CaptureError;
use super::session::{CaptureSession, CaptureState};
use super::status::CaptureStatus;
use crate::audio::{AudioBackend, AudioFrame};

/// Drives one `CaptureSession` against a real audio backend and timer.
///
/// The recorder owns the two side-effectful concerns the pure state machine
/// does not: the periodic tick that advances elapsed time, and exclusive
/// ownership of the device. The backend is handed to a frame task on
/// acquisition and released there exactly once — after manual stop,
/// auto-stop, abandonment, or recorder drop, whichever comes first.
pub struct CaptureRecorder {
    session: Arc<Mutex<CaptureSession>>,

    /// Cleared to signal the frame/tick tasks to wind down.
    is_capturing: Arc<AtomicBool>,

    /// Set by `claim()`, consumed by `start()`. Lets a hosting layer move
    /// the session out of `Idle` under its own slot lock, so a racing
    /// start cannot mistake a just-admitted recorder for a free one.
    claimed: AtomicBool,

    frame_task: Mutex<Option<JoinHandle<()>>>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureRecorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            session: Arc::new(Mutex::new(CaptureSession::new(config))),
            is_capturing: Arc::new(AtomicBool::new(false)),
            claimed: AtomicBool::new(false),
            frame_task: Mutex::new(None),
            tick_task: Mutex::new(None),
        }
    }

    /// Admit the session ahead of `start()`: `Idle` moves to its starting
    /// state immediately, so the transition can happen inside whatever
    /// lock guards the caller's one-session-at-a-time slot.
    pub async fn claim(&self) -> bool {
        let mut session = self.session.lock().await;
        if session.state() != CaptureState::Idle {
            return false;
        }
        session.start();
        self.claimed.store(true, Ordering::SeqCst);
        true
    }

    pub async fn session_id(&self) -> String {
        self.session.lock().await.config().session_id.clone()
    }

    pub async fn state(&self) -> CaptureState {
        self.session.lock().await.state()
    }

    pub async fn status(&self) -> CaptureStatus {
        CaptureStatus::from(&*self.session.lock().await)
    }

    /// Package the finalized clip for upload (idempotent read; `None`
    /// unless the session is stopped).
    pub async fn payload(&self) -> Option<UploadPayload> {
        self.session.lock().await.packaged_payload()
    }

    /// Run the pre-roll countdown (if configured), acquire the device, and
    /// start recording.
    ///
    /// Suspends while the backend acquires the device; a denial or device
    /// error lands the session in `Failed` rather than returning an `Err`.
    /// A second `start()` while the session is active is a rejected no-op:
    /// the device is never acquired twice.
    pub async fn start(&self, mut backend: Box<dyn AudioBackend>) -> Result<CaptureState> {
        let (tick_interval, pre_roll_secs, target_sample_rate, target_channels) = {
            let mut session = self.session.lock().await;
            if session.state() == CaptureState::Idle {
                session.start();
                self.claimed.store(false, Ordering::SeqCst);
            } else if !self.claimed.swap(false, Ordering::SeqCst) {
                warn!(
                    session_id = %session.config().session_id,
                    state = ?session.state(),
                    "start rejected: session already active or holding a result"
                );
                return Ok(session.state());
            }
            let config = session.config();
            (
                config.tick_interval,
                config.pre_roll_secs,
                config.sample_rate,
                config.channels,
            )
        };

        // Pre-roll countdown at 1-second granularity
        for _ in 0..pre_roll_secs {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let mut session = self.session.lock().await;
            if session.state() != CaptureState::CountingDown {
                // Cancelled while counting down
                return Ok(session.state());
            }
            session.countdown_tick();
        }

        // Acquire the device (the logical suspension point of start)
        let rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                let mut session = self.session.lock().await;
                session.fail(e);
                return Ok(session.state());
            }
        };

        {
            let mut session = self.session.lock().await;
            if session.state() != CaptureState::Requesting {
                // Cancelled while the permission gate was open; release now.
                if let Err(e) = backend.stop().await {
                    error!("failed to release device after cancelled start: {}", e);
                }
                return Ok(session.state());
            }
            session.device_acquired();
        }
        self.is_capturing.store(true, Ordering::SeqCst);

        // Frame task: owns the backend, forwards samples into the session,
        // and is the single place the device gets released.
        let session = Arc::clone(&self.session);
        let is_capturing = Arc::clone(&self.is_capturing);
        let mut rx = rx;

        let frame_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_frame = rx.recv() => match maybe_frame {
                        Some(frame) => {
                            if !is_capturing.load(Ordering::SeqCst) {
                                break;
                            }
                            if let Some(frame) =
                                conform_frame(frame, target_sample_rate, target_channels)
                            {
                                session.lock().await.push_samples(&frame.samples);
                            }
                        }
                        None => {
                            if is_capturing.swap(false, Ordering::SeqCst) {
                                session.lock().await.fail(CaptureError::DeviceFailed(
                                    "capture stream ended unexpectedly".to_string(),
                                ));
                            }
                            break;
                        }
                    },
                    _ = tokio::time::sleep(Duration::from_millis(20)) => {
                        if !is_capturing.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                }
            }

            if let Err(e) = backend.stop().await {
                error!("failed to stop audio backend: {}", e);
            }
        });

        // Tick task: advances elapsed time and enforces the auto-stop
        // ceiling through the session's own tick policy.
        let session = Arc::clone(&self.session);
        let is_capturing = Arc::clone(&self.is_capturing);

        let tick_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.tick().await; // first tick completes immediately

            loop {
                interval.tick().await;
                let mut session = session.lock().await;
                if session.state() != CaptureState::Recording {
                    break;
                }
                match session.tick() {
                    Ok(true) => {
                        // Auto-stopped at the ceiling
                        is_capturing.store(false, Ordering::SeqCst);
                        break;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        error!("failed to finalize clip on auto-stop: {:#}", e);
                        session.fail(CaptureError::DeviceFailed(format!(
                            "clip finalization failed: {}",
                            e
                        )));
                        is_capturing.store(false, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });

        *self.frame_task.lock().await = Some(frame_task);
        *self.tick_task.lock().await = Some(tick_task);

        info!("recording started");
        Ok(CaptureState::Recording)
    }

    /// Manually stop recording and finalize the clip.
    ///
    /// A no-op unless the session is `Recording` — stopping twice, or after
    /// an auto-stop already finalized the clip, changes nothing.
    pub async fn stop(&self) -> Result<CaptureState> {
        let state = {
            let mut session = self.session.lock().await;
            session.stop()?
        };

        self.is_capturing.store(false, Ordering::SeqCst);
        self.join_tasks().await;

        Ok(state)
    }

    /// Abandon the attempt: release the device without finalizing a clip.
    ///
    /// Cancellation, not completion — the session returns to `Idle` and the
    /// microphone indicator goes dark even though no clip exists.
    pub async fn abandon(&self) -> CaptureState {
        self.is_capturing.store(false, Ordering::SeqCst);

        let state = {
            let mut session = self.session.lock().await;
            session.cancel()
        };

        self.join_tasks().await;
        state
    }

    /// Discard the clip or error and return to `Idle` ("re-record").
    ///
    /// A no-op unless the session is `Stopped` or `Failed`; resetting an
    /// active session would strand the frame task with the device held.
    pub async fn reset(&self) -> CaptureState {
        {
            let session = self.session.lock().await;
            if !matches!(
                session.state(),
                CaptureState::Stopped | CaptureState::Failed
            ) {
                warn!(
                    session_id = %session.config().session_id,
                    state = ?session.state(),
                    "reset rejected: session has no result to discard"
                );
                return session.state();
            }
        }

        self.join_tasks().await;
        self.session.lock().await.reset()
    }

    async fn join_tasks(&self) {
        // The frame task owns the device, so it must run to completion; the
        // tick task holds nothing and can be aborted if still waiting on
        // its next interval.
        if let Some(task) = self.tick_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }

        if let Some(task) = self.frame_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("frame task panicked: {}", e);
            }
        }
    }
}

impl Drop for CaptureRecorder {
    fn drop(&mut self) {
        // The frame task observes the cleared flag within one poll interval
        // and releases the device, even when the recorder is dropped
        // mid-recording.
        self.is_capturing.store(false, Ordering::SeqCst);
    }
}

/// Conform a backend frame to the clip's sample rate and channel count.
///
/// Frames at a rate that is not an integer multiple of the clip rate
/// (48kHz into a 44.1kHz clip, say) are dropped with a warning rather
/// than written under the wrong header.
fn conform_frame(
    frame: AudioFrame,
    target_sample_rate: u32,
    target_channels: u16,
) -> Option<AudioFrame> {
    let mut conformed = frame;

    // Channels first: decimation assumes non-interleaved samples
    if conformed.channels != target_channels && target_channels == 1 {
        conformed = downmix_to_mono(conformed);
    }

    if conformed.sample_rate != target_sample_rate {
        if conformed.sample_rate < target_sample_rate
            || conformed.sample_rate % target_sample_rate != 0
        {
            warn!(
                frame_rate = conformed.sample_rate,
                clip_rate = target_sample_rate,
                "dropping frame: sample rate is not an integer multiple of the clip rate"
            );
            return None;
        }
        conformed = decimate(conformed, target_sample_rate);
    }

    Some(conformed)
}

/// Downsample by decimation (take every Nth sample). Callers guarantee the
/// frame rate is an exact multiple of the target.
fn decimate(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    let ratio = (frame.sample_rate / target_rate) as usize;

    let samples: Vec<i16> = frame.samples.iter().step_by(ratio).copied().collect();

    AudioFrame {
        samples,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Collapse stereo to mono by summing channels, clamped to i16 range.
fn downmix_to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels != 2 {
        return frame;
    }

    let mut samples = Vec::with_capacity(frame.samples.len() / 2);
    for pair in frame.samples.chunks_exact(2) {
        let sum = pair[0] as i32 + pair[1] as i32;
        samples.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

// Integration tests for the capture recorder
//
// A scripted backend stands in for the platform device gate so the tests
// can exercise grants, denials, mid-capture failures, and the
// release-exactly-once guarantee with real timers.

use anyhow::Result;
use autodecx_capture::audio::{AudioBackend, AudioFrame};
use autodecx_capture::capture::{CaptureConfig, CaptureError, CaptureRecorder, CaptureState};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Backend with scripted behavior: grant or deny, then emit frames on a
/// short cadence. `hold_open` mimics a healthy device that stays quiet
/// until released; without it the stream "dies" after the last frame.
struct ScriptedBackend {
    grant: bool,
    frames: usize,
    hold_open: bool,
    acquisitions: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
    capturing: bool,
}

impl ScriptedBackend {
    fn new(grant: bool, frames: usize, hold_open: bool) -> Self {
        Self {
            grant,
            frames,
            hold_open,
            acquisitions: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedBackend {
    async fn start(&mut self) -> std::result::Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if !self.grant {
            return Err(CaptureError::PermissionDenied(
                "microphone access denied".to_string(),
            ));
        }

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(100);
        let frames = self.frames;
        let hold_open = self.hold_open;

        tokio::spawn(async move {
            for i in 0..frames {
                let frame = AudioFrame {
                    samples: vec![42i16; 441],
                    sample_rate: 44100,
                    channels: 1,
                    timestamp_ms: i as u64 * 10,
                };
                if tx.send(frame).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            if hold_open {
                // Stay quiet until the recorder drops its receiver
                tx.closed().await;
            }
        });

        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> std::result::Result<(), CaptureError> {
        self.capturing = false;
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn fast_config(max_ms: u64, tick_ms: u64) -> CaptureConfig {
    CaptureConfig {
        session_id: "recorder-test".to_string(),
        max_duration: Duration::from_millis(max_ms),
        tick_interval: Duration::from_millis(tick_ms),
        pre_roll_secs: 0,
        sample_rate: 44100,
        channels: 1,
    }
}

#[tokio::test]
async fn auto_stop_at_ceiling_releases_device_and_finalizes_clip() -> Result<()> {
    let backend = ScriptedBackend::new(true, 100, true);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(100, 20));
    let state = recorder.start(Box::new(backend)).await?;
    assert_eq!(state, CaptureState::Recording);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let status = recorder.status().await;
    assert_eq!(status.state, CaptureState::Stopped);
    assert_eq!(status.elapsed_secs, 0.1);
    assert!(status.clip.is_some());
    assert!(released.load(Ordering::SeqCst), "device must be released");

    let payload = recorder.payload().await.expect("clip payload");
    assert_eq!(payload.content_type, "audio/wav");
    assert!(!payload.bytes.is_empty());
    Ok(())
}

#[tokio::test]
async fn permission_denial_lands_in_failed_and_reset_recovers() -> Result<()> {
    let backend = ScriptedBackend::new(false, 0, true);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    let state = recorder.start(Box::new(backend)).await?;
    assert_eq!(state, CaptureState::Failed);

    let status = recorder.status().await;
    assert!(status.error.unwrap().contains("denied"));
    assert!(status.clip.is_none());
    assert!(recorder.payload().await.is_none());
    // Nothing was acquired, so there is nothing to release
    assert!(!released.load(Ordering::SeqCst));

    assert_eq!(recorder.reset().await, CaptureState::Idle);
    assert!(recorder.status().await.error.is_none());
    Ok(())
}

#[tokio::test]
async fn manual_stop_finalizes_and_further_stops_are_noops() -> Result<()> {
    let backend = ScriptedBackend::new(true, 100, true);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    recorder.start(Box::new(backend)).await?;

    tokio::time::sleep(Duration::from_millis(120)).await;
    let state = recorder.stop().await?;
    assert_eq!(state, CaptureState::Stopped);
    assert!(released.load(Ordering::SeqCst));

    let payload = recorder.payload().await.expect("clip payload");

    // Second stop changes nothing
    assert_eq!(recorder.stop().await?, CaptureState::Stopped);
    assert_eq!(recorder.payload().await.unwrap().bytes, payload.bytes);
    Ok(())
}

#[tokio::test]
async fn second_start_is_rejected_without_a_second_acquisition() -> Result<()> {
    let first = ScriptedBackend::new(true, 100, true);
    let second = ScriptedBackend::new(true, 100, true);
    let second_acquisitions = Arc::clone(&second.acquisitions);

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    assert_eq!(
        recorder.start(Box::new(first)).await?,
        CaptureState::Recording
    );

    // Still recording: the second start must not touch its backend
    assert_eq!(
        recorder.start(Box::new(second)).await?,
        CaptureState::Recording
    );
    assert_eq!(second_acquisitions.load(Ordering::SeqCst), 0);

    recorder.stop().await?;
    Ok(())
}

#[tokio::test]
async fn abandon_releases_device_without_a_clip() -> Result<()> {
    let backend = ScriptedBackend::new(true, 100, true);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    recorder.start(Box::new(backend)).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;

    let state = recorder.abandon().await;
    assert_eq!(state, CaptureState::Idle);
    assert!(released.load(Ordering::SeqCst), "device must be released");
    assert!(recorder.payload().await.is_none());
    Ok(())
}

#[tokio::test]
async fn stream_dying_mid_capture_fails_the_session() -> Result<()> {
    // Two frames and then the stream ends while the ceiling is far away
    let backend = ScriptedBackend::new(true, 2, false);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    recorder.start(Box::new(backend)).await?;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = recorder.status().await;
    assert_eq!(status.state, CaptureState::Failed);
    assert!(status.error.unwrap().contains("unexpectedly"));
    assert!(released.load(Ordering::SeqCst));
    Ok(())
}

#[tokio::test]
async fn device_frames_are_conformed_to_the_clip_format() -> Result<()> {
    // A "device" running at 88.2kHz stereo; the clip must come out 44.1kHz mono
    struct HighRateBackend {
        capturing: bool,
    }

    #[async_trait::async_trait]
    impl AudioBackend for HighRateBackend {
        async fn start(
            &mut self,
        ) -> std::result::Result<mpsc::Receiver<AudioFrame>, CaptureError> {
            let (tx, rx) = mpsc::channel(10);
            tokio::spawn(async move {
                let frame = AudioFrame {
                    // 400 interleaved stereo samples at 88.2kHz
                    samples: (0..800).map(|i| (i % 64) as i16).collect(),
                    sample_rate: 88200,
                    channels: 2,
                    timestamp_ms: 0,
                };
                let _ = tx.send(frame).await;
                tx.closed().await;
            });
            self.capturing = true;
            Ok(rx)
        }

        async fn stop(&mut self) -> std::result::Result<(), CaptureError> {
            self.capturing = false;
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            self.capturing
        }

        fn name(&self) -> &str {
            "high-rate"
        }
    }

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    recorder
        .start(Box::new(HighRateBackend { capturing: false }))
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    recorder.stop().await?;

    let payload = recorder.payload().await.expect("clip payload");
    let reader = hound::WavReader::new(std::io::Cursor::new(payload.bytes))?;
    assert_eq!(reader.spec().sample_rate, 44100);
    assert_eq!(reader.spec().channels, 1);
    // 400 stereo pairs -> 400 mono samples -> decimated by 2 -> 200
    assert_eq!(reader.len(), 200);
    Ok(())
}

#[tokio::test]
async fn reset_while_recording_is_rejected_and_returns_promptly() -> Result<()> {
    let backend = ScriptedBackend::new(true, 1000, true);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(60_000, 50));
    recorder.start(Box::new(backend)).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;

    // Must neither tear down the live session nor block on the frame task
    let state = tokio::time::timeout(Duration::from_secs(3), recorder.reset())
        .await
        .expect("reset() while recording must not block");
    assert_eq!(state, CaptureState::Recording);
    assert!(!released.load(Ordering::SeqCst), "device must stay held");

    // The session is intact: a manual stop still finalizes normally
    assert_eq!(recorder.stop().await?, CaptureState::Stopped);
    assert!(recorder.payload().await.is_some());
    assert!(released.load(Ordering::SeqCst));

    assert_eq!(recorder.reset().await, CaptureState::Idle);
    Ok(())
}

#[tokio::test]
async fn off_rate_frames_are_dropped_rather_than_mislabeled() -> Result<()> {
    // 48kHz does not decimate cleanly to 44.1kHz; writing those samples
    // under a 44.1kHz header would slow playback by ~9%
    struct OffRateBackend {
        capturing: bool,
    }

    #[async_trait::async_trait]
    impl AudioBackend for OffRateBackend {
        async fn start(
            &mut self,
        ) -> std::result::Result<mpsc::Receiver<AudioFrame>, CaptureError> {
            let (tx, rx) = mpsc::channel(10);
            tokio::spawn(async move {
                let frame = AudioFrame {
                    samples: vec![42i16; 4800],
                    sample_rate: 48000,
                    channels: 1,
                    timestamp_ms: 0,
                };
                let _ = tx.send(frame).await;
                tx.closed().await;
            });
            self.capturing = true;
            Ok(rx)
        }

        async fn stop(&mut self) -> std::result::Result<(), CaptureError> {
            self.capturing = false;
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            self.capturing
        }

        fn name(&self) -> &str {
            "off-rate"
        }
    }

    let recorder = CaptureRecorder::new(fast_config(10_000, 50));
    recorder
        .start(Box::new(OffRateBackend { capturing: false }))
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    recorder.stop().await?;

    let payload = recorder.payload().await.expect("clip payload");
    let reader = hound::WavReader::new(std::io::Cursor::new(payload.bytes))?;
    assert_eq!(reader.spec().sample_rate, 44100);
    assert_eq!(reader.len(), 0, "off-rate samples must not reach the clip");
    Ok(())
}

#[tokio::test]
async fn dropping_the_recorder_mid_recording_releases_the_device() -> Result<()> {
    let backend = ScriptedBackend::new(true, 1000, true);
    let released = Arc::clone(&backend.released);

    let recorder = CaptureRecorder::new(fast_config(60_000, 50));
    recorder.start(Box::new(backend)).await?;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!released.load(Ordering::SeqCst));

    // View teardown without an explicit abandon
    drop(recorder);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        released.load(Ordering::SeqCst),
        "frame task must release the device after the recorder is dropped"
    );
    Ok(())
}

#[tokio::test]
async fn pre_roll_counts_down_before_acquisition() -> Result<()> {
    let backend = ScriptedBackend::new(true, 100, true);

    let config = CaptureConfig {
        pre_roll_secs: 1,
        ..fast_config(10_000, 50)
    };
    let recorder = Arc::new(CaptureRecorder::new(config));

    let task_recorder = Arc::clone(&recorder);
    let start_task =
        tokio::spawn(async move { task_recorder.start(Box::new(backend)).await });

    // Mid-countdown the session reports the preamble state
    tokio::time::sleep(Duration::from_millis(300)).await;
    let status = recorder.status().await;
    assert_eq!(status.state, CaptureState::CountingDown);
    assert!(status.countdown_remaining >= 1);

    assert_eq!(start_task.await??, CaptureState::Recording);
    recorder.stop().await?;
    Ok(())
}

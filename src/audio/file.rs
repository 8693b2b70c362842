use hound::WavReader;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::capture::CaptureError;

/// File-based audio backend
///
/// Reads a WAV file and emits it as timed frames, without real-time pacing
/// (batch mode). Used for tests and for diagnosing pre-recorded clips.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    capturing: bool,
}

impl FileBackend {
    pub fn new(path: PathBuf, config: AudioBackendConfig) -> Self {
        Self {
            path,
            config,
            capturing: false,
        }
    }

    fn read_samples(&self) -> Result<(Vec<i16>, u32, u16), CaptureError> {
        let reader = WavReader::open(&self.path).map_err(|e| {
            CaptureError::DeviceUnavailable(format!(
                "cannot open audio file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                CaptureError::DeviceFailed(format!(
                    "cannot read samples from {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        Ok((samples, spec.sample_rate, spec.channels))
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let (samples, sample_rate, channels) = self.read_samples()?;

        info!(
            path = %self.path.display(),
            sample_rate,
            channels,
            sample_count = samples.len(),
            "file backend started"
        );

        let samples_per_frame =
            (sample_rate as u64 * self.config.buffer_duration_ms / 1000) as usize
                * channels as usize;
        let frame_duration_ms = self.config.buffer_duration_ms;

        let (tx, rx) = mpsc::channel(100);

        tokio::spawn(async move {
            let mut timestamp_ms = 0u64;
            for chunk in samples.chunks(samples_per_frame.max(1)) {
                let frame = AudioFrame {
                    samples: chunk.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                if tx.send(frame).await.is_err() {
                    // Receiver dropped: capture was stopped or abandoned
                    break;
                }
                timestamp_ms += frame_duration_ms;

                // Let the consumer keep up without pacing to real time
                tokio::task::yield_now().await;
            }

            // File exhausted is not a device failure: stay quiet like an
            // idle microphone until the receiver is dropped on release.
            tx.closed().await;
        });

        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if !self.capturing {
            warn!("file backend stop() called while not capturing");
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "file"
    }
}

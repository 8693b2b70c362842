// Microphone backend using cpal (feature `microphone`)

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use crate::capture::CaptureError;

/// Microphone audio backend
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread
/// for the duration of the acquisition. The thread holds the device open
/// until `stop()` signals it (or the backend is dropped), which is the
/// single release point the capture recorder relies on.
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            stop_tx: None,
            thread: None,
            capturing: false,
        }
    }
}

/// Classify a device-layer error message into the capture taxonomy.
fn classify_device_error(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("access") {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        debug!(
            target_sample_rate = self.config.target_sample_rate,
            target_channels = self.config.target_channels,
            "acquiring microphone"
        );

        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let (frame_tx, frame_rx) = mpsc::channel::<AudioFrame>(100);

        let thread = std::thread::spawn(move || {
            let host = cpal::default_host();

            let device = match host.default_input_device() {
                Some(d) => d,
                None => {
                    let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(
                        "no input device available".to_string(),
                    )));
                    return;
                }
            };

            let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

            let supported = match device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = ready_tx.send(Err(classify_device_error(format!(
                        "failed to get input config for {}: {}",
                        device_name, e
                    ))));
                    return;
                }
            };

            if supported.sample_format() != SampleFormat::F32 {
                let _ = ready_tx.send(Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format: {:?}",
                    supported.sample_format()
                ))));
                return;
            }

            let stream_config: StreamConfig = supported.into();
            let sample_rate = stream_config.sample_rate.0;
            let channels = stream_config.channels as usize;

            let samples_seen = Arc::new(AtomicU64::new(0));
            let stream_failed = Arc::new(AtomicBool::new(false));

            let cb_samples_seen = Arc::clone(&samples_seen);
            let cb_failed = Arc::clone(&stream_failed);
            let err_failed = Arc::clone(&stream_failed);

            let stream = device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if cb_failed.load(Ordering::SeqCst) {
                        return;
                    }

                    // Downmix to mono and convert f32 -> i16 PCM
                    let samples: Vec<i16> = if channels == 1 {
                        data.iter().map(|&s| f32_to_i16(s)).collect()
                    } else {
                        data.chunks(channels)
                            .map(|frame| {
                                let avg = frame.iter().sum::<f32>() / channels as f32;
                                f32_to_i16(avg)
                            })
                            .collect()
                    };

                    let seen = cb_samples_seen
                        .fetch_add(samples.len() as u64, Ordering::SeqCst);
                    let timestamp_ms = seen * 1000 / sample_rate as u64;

                    let frame = AudioFrame {
                        samples,
                        sample_rate,
                        channels: 1,
                        timestamp_ms,
                    };

                    if let Err(e) = frame_tx.try_send(frame) {
                        debug!("dropping audio frame: {}", e);
                    }
                },
                move |err| {
                    error!("input stream error: {}", err);
                    err_failed.store(true, Ordering::SeqCst);
                },
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = ready_tx.send(Err(classify_device_error(format!(
                        "failed to open input stream on {}: {}",
                        device_name, e
                    ))));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(classify_device_error(format!(
                    "failed to start input stream on {}: {}",
                    device_name, e
                ))));
                return;
            }

            info!(device = %device_name, sample_rate, "microphone capture started");
            let _ = ready_tx.send(Ok(()));

            // Hold the stream open until stop is signalled, the backend is
            // dropped, or the stream itself reports failure.
            loop {
                match stop_rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                        if stream_failed.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                }
            }

            drop(stream);
            info!(device = %device_name, "microphone released");
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.thread = Some(thread);
                self.capturing = true;
                Ok(frame_rx)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::DeviceFailed(
                "capture thread exited before reporting readiness".to_string(),
            )),
        }
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.capturing = false;

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || {
                if thread.join().is_err() {
                    error!("microphone capture thread panicked");
                }
            })
            .await
            .map_err(|e| CaptureError::DeviceFailed(format!("failed to join capture thread: {}", e)))?;
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        // Dropping stop_tx disconnects the channel, which also unblocks the
        // capture thread and releases the device.
        self.stop_tx.take();
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

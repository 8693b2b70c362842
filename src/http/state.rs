use std::sync::Arc;
use tokio::sync::RwLock;

use crate::audio::{AudioBackendConfig, AudioSource};
use crate::capture::{CaptureConfig, CaptureRecorder};
use crate::config::Config;
use crate::upload::UploadClient;

/// Shared application state for HTTP handlers
///
/// Holds a single capture slot: only one session exists per presentation
/// context, and only one may hold the microphone at a time.
#[derive(Clone)]
pub struct AppState {
    /// The active capture session, if any
    pub capture: Arc<RwLock<Option<Arc<CaptureRecorder>>>>,

    /// Client for the remote analysis backend
    pub upload: Arc<UploadClient>,

    /// Template for new capture sessions (fresh session ID per start)
    pub capture_template: CaptureConfig,

    /// Which audio backend new sessions acquire
    pub audio_source: AudioSource,

    /// Backend buffer/format settings
    pub backend_config: AudioBackendConfig,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let upload = UploadClient::new(config.analysis.base_url.clone(), config.analysis_timeout())
            .map_err(|e| anyhow::anyhow!("failed to build upload client: {}", e))?;

        Ok(Self {
            capture: Arc::new(RwLock::new(None)),
            upload: Arc::new(upload),
            capture_template: config.capture_config(),
            audio_source: config.audio_source(),
            backend_config: config.backend_config(),
        })
    }
}

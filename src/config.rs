use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{AudioBackendConfig, AudioSource};
use crate::capture::CaptureConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub capture: CaptureSettings,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// "microphone", or a path to a WAV file for batch diagnosis
    pub source: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct CaptureSettings {
    pub max_duration_secs: u64,
    pub tick_interval_ms: u64,
    pub pre_roll_secs: u32,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn audio_source(&self) -> AudioSource {
        match self.audio.source.as_str() {
            "microphone" => AudioSource::Microphone,
            path => AudioSource::File(PathBuf::from(path)),
        }
    }

    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.audio.sample_rate,
            target_channels: self.audio.channels,
            buffer_duration_ms: self.audio.buffer_duration_ms,
        }
    }

    /// Capture settings for a new session, with a fresh session ID.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            max_duration: Duration::from_secs(self.capture.max_duration_secs),
            tick_interval: Duration::from_millis(self.capture.tick_interval_ms),
            pre_roll_secs: self.capture.pre_roll_secs,
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            ..CaptureConfig::default()
        }
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis.timeout_secs)
    }
}

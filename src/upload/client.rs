use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{AnalysisResult, VehicleInfo};
use crate::capture::UploadPayload;

/// Upload-stage errors.
///
/// Deliberately disjoint from `CaptureError`: an upload failure never
/// touches capture state, so the finalized clip stays available for a
/// retry without re-recording.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("cannot reach analysis backend: {0}")]
    Connect(String),

    #[error("analysis backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid analysis response: {0}")]
    Decode(String),
}

/// Client for the remote sound-analysis backend.
pub struct UploadClient {
    http: reqwest::Client,
    base_url: String,
}

impl UploadClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Connect(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the backend's health endpoint.
    pub async fn health(&self) -> Result<bool, UploadError> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(connect_error)?;
        Ok(response.status().is_success())
    }

    /// Upload a packaged clip (plus optional vehicle metadata) for analysis.
    ///
    /// The payload is an owned copy handed over by the session, which keeps
    /// its own clip — this call may be repeated freely on failure.
    pub async fn analyze(
        &self,
        payload: &UploadPayload,
        vehicle_info: Option<&VehicleInfo>,
    ) -> Result<AnalysisResult, UploadError> {
        info!(
            file_name = %payload.file_name,
            size_bytes = payload.bytes.len(),
            with_vehicle_info = vehicle_info.is_some(),
            "uploading clip for analysis"
        );

        let audio_part = Part::bytes(payload.bytes.clone())
            .file_name(payload.file_name.clone())
            .mime_str(payload.content_type)
            .map_err(|e| UploadError::Decode(format!("invalid clip content type: {}", e)))?;

        let mut form = Form::new().part("audio", audio_part);

        if let Some(info) = vehicle_info {
            let json = serde_json::to_string(info)
                .map_err(|e| UploadError::Decode(format!("cannot serialize vehicle info: {}", e)))?;
            form = form.text("vehicle_info", json);
        }

        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(connect_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "analysis backend rejected upload");
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: AnalysisResult = response
            .json()
            .await
            .map_err(|e| UploadError::Decode(e.to_string()))?;

        info!(
            predicted_issue = %result.predicted_issue,
            confidence = result.confidence,
            issues = result.issues.len(),
            "analysis complete"
        );

        Ok(result)
    }
}

fn connect_error(e: reqwest::Error) -> UploadError {
    if e.is_connect() || e.is_timeout() {
        UploadError::Connect(e.to_string())
    } else {
        UploadError::Decode(e.to_string())
    }
}

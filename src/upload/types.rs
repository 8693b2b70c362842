use serde::{Deserialize, Serialize};

/// Vehicle metadata collected by the surrounding form.
///
/// Pass-through only: the capture service neither validates nor interprets
/// it, merely forwards it with the clip. Field names follow the analysis
/// backend's camelCase contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    pub manufacturer: String,
    pub year: String,
    pub model: String,
    pub sound_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Diagnosis result returned by the analysis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub metrics: AnalysisMetrics,
    #[serde(default)]
    pub issues: Vec<DiagnosedIssue>,
    pub predicted_issue: String,
    /// Confidence score in [0, 1]
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_analysis: Option<YoutubeAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub youtube_matches: Vec<YoutubeMatch>,
}

/// Acoustic metrics extracted from the clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub dominant_frequency: f64,
    pub spectral_rolloff: f64,
    pub vibration_level: f64,
    pub zero_crossing_rate: f64,
    pub duration: f64,
    pub sample_rate: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectral_bandwidth: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosedIssue {
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeAnalysis {
    pub videos_analyzed: u32,
    pub best_match_title: String,
    pub best_match_similarity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeMatch {
    pub title: String,
    pub url: String,
    pub similarity: f64,
}

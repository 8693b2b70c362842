//! Analysis backend client
//!
//! Transmits finalized clips (and pass-through vehicle metadata) to the
//! remote sound-analysis service and parses its diagnosis response.

mod client;
mod types;

pub use client::{UploadClient, UploadError};
pub use types::{
    AnalysisMetrics, AnalysisResult, DiagnosedIssue, IssueSeverity, VehicleInfo, YoutubeAnalysis,
    YoutubeMatch,
};

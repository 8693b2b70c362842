pub mod audio;
pub mod capture;
pub mod config;
pub mod http;
pub mod upload;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource, FileBackend,
};
pub use capture::{
    CaptureConfig, CaptureError, CaptureRecorder, CaptureSession, CaptureState, CaptureStatus,
    Clip, ClipSummary, UploadPayload,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use upload::{AnalysisResult, UploadClient, UploadError, VehicleInfo};

pub mod backend;
pub mod file;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use file::FileBackend;

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneBackend;

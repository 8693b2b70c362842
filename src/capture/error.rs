use thiserror::Error;

/// Errors that can end a capture attempt.
///
/// All variants are terminal for the current session attempt: the session
/// lands in `Failed` and must be `reset()` before recording again. None of
/// them are fatal to the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The platform refused microphone access.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// No capture device is present, or the device could not be opened.
    #[error("no capture device available: {0}")]
    DeviceUnavailable(String),

    /// The device stream failed mid-capture.
    #[error("capture device failed: {0}")]
    DeviceFailed(String),
}

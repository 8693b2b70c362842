use anyhow::{Context, Result};
use std::io::Cursor;

/// Content type tag for clips produced by this service.
pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// A finalized audio clip.
///
/// Immutable once produced: the session finalizes it exactly once (on manual
/// stop or auto-stop, same code path) and consumers only read it afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    bytes: Vec<u8>,
    duration_secs: f64,
    sample_rate: u32,
    channels: u16,
}

impl Clip {
    /// Encode captured PCM samples into an in-memory WAV buffer.
    pub(crate) fn encode(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV writer")?;
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to clip")?;
            }
            writer.finalize().context("Failed to finalize clip")?;
        }

        let duration_secs = samples.len() as f64 / (sample_rate as f64 * channels as f64);

        Ok(Self {
            bytes: cursor.into_inner(),
            duration_secs,
            sample_rate,
            channels,
        })
    }

    /// Encoded WAV bytes. Always non-empty (the WAV header alone is 44 bytes).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> &'static str {
        WAV_CONTENT_TYPE
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Everything the upload client needs to transmit a clip.
///
/// Produced by `CaptureSession::packaged_payload()`, an idempotent read: the
/// session keeps its own copy of the clip for playback and re-upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
    pub duration_secs: f64,
}

//! Audio backend errors.

use tm_engine::DeviceError;

/// Error type for audio backends.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// No audio device available
    #[error("no audio output device available")]
    NoDevice,
    /// Failed to query or open the device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create the output stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
}

impl From<AudioError> for DeviceError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::NoDevice | AudioError::DeviceInit(_) => DeviceError::Unavailable(err.to_string()),
            AudioError::StreamCreate(_) | AudioError::Playback(_) => DeviceError::Playback(err.to_string()),
        }
    }
}

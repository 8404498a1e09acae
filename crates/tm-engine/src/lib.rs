//! Paged multi-voice mixing engine for tickmix.
//!
//! Voices are mixed one page ahead of the page the output device is
//! playing. The device reports each finished page and the engine prepares
//! the next.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod config;
mod device;
mod format;
pub mod mix;
mod mixer;
mod page_buffer;
mod voice;
mod voice_pool;

#[cfg(feature = "std")]
mod shared;

pub use config::{MixerConfig, MAX_PAGES, VOICE_SLOTS};
pub use device::{
    DeviceError, OutputDevice, PageClient, PageFetch, PageSource, PlaybackRequest, SimulatedDevice,
};
pub use format::MixFormat;
pub use mixer::Mixer;
pub use page_buffer::PageBuffer;
pub use voice::{PageMix, Voice, VoiceHandle, MIN_VOICE_HANDLE};
pub use voice_pool::{VoicePool, VoiceSlot};

#[cfg(feature = "std")]
pub use shared::SoundEngine;

/// Error type for mixing engine operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MixError {
    /// The engine has not been initialized, or was shut down.
    #[error("mixing engine not installed")]
    NotInstalled,
    /// Every voice is busy and none may be evicted.
    #[error("no free voices available")]
    NoVoices,
    /// No active voice has this handle.
    #[error("no voice with handle {0} found")]
    VoiceNotFound(VoiceHandle),
    /// The mix buffer could not be allocated.
    #[error("out of memory for the mix buffer")]
    AllocationFailed,
    /// Configuration rejected at init.
    #[error("invalid mixer configuration: {0}")]
    InvalidConfig(&'static str),
    /// The output device failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

//! Output devices for the tickmix mixing engine.

mod capture;
mod cpal_backend;
mod error;

pub use capture::{CaptureDevice, CaptureTap, TapRead};
pub use cpal_backend::CpalDevice;
pub use error::AudioError;

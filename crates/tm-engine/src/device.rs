//! The output device seam.
//!
//! A device plays the mix buffer page by page and reports every finished
//! page through the [`PageClient`] it was handed at playback start.

use alloc::string::String;
use alloc::sync::Weak;
use alloc::vec::Vec;

use crate::format::MixFormat;

/// Error raised by an output device.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("output device unavailable: {0}")]
    Unavailable(String),
    #[error("output device does not support {0:?}")]
    UnsupportedFormat(MixFormat),
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Geometry and format of a buffered playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub page_bytes: usize,
    pub pages: usize,
    /// Requested rate in Hz.
    pub sample_rate: u32,
    pub format: MixFormat,
}

impl PlaybackRequest {
    pub fn buffer_bytes(&self) -> usize {
        self.page_bytes * self.pages
    }

    /// Samples in one page.
    pub fn page_samples(&self) -> usize {
        self.page_bytes / self.format.sample_bytes()
    }
}

/// Result of asking the engine for a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageFetch {
    /// This many bytes were copied into the output slice.
    Copied(usize),
    /// The engine is inside a mainline critical section. Retry shortly.
    Busy,
    /// The engine is gone.
    Detached,
}

/// Engine side of a page completion.
pub trait PageSource: Send + Sync {
    /// Complete the now-playing page, prepare the next one and copy the new
    /// now-playing page into `out`.
    fn advance(&self, out: &mut [u8]) -> PageFetch;

    /// Copy the now-playing page into `out` without advancing.
    fn current(&self, out: &mut [u8]) -> PageFetch;
}

/// Callback handle a device uses to report finished pages.
#[derive(Clone, Default)]
pub struct PageClient {
    source: Option<Weak<dyn PageSource>>,
}

impl PageClient {
    pub fn new(source: Weak<dyn PageSource>) -> Self {
        Self { source: Some(source) }
    }

    /// A client that reaches no engine.
    pub fn detached() -> Self {
        Self { source: None }
    }

    pub fn is_detached(&self) -> bool {
        self.source.as_ref().map_or(true, |s| s.strong_count() == 0)
    }

    /// Report one page as played.
    pub fn advance(&self, out: &mut [u8]) -> PageFetch {
        match self.source.as_ref().and_then(Weak::upgrade) {
            Some(source) => source.advance(out),
            None => PageFetch::Detached,
        }
    }

    pub fn current(&self, out: &mut [u8]) -> PageFetch {
        match self.source.as_ref().and_then(Weak::upgrade) {
            Some(source) => source.current(out),
            None => PageFetch::Detached,
        }
    }
}

/// Output device driven by the mixing engine.
pub trait OutputDevice: Send {
    /// Claim the device. Failure here keeps the engine uninstalled.
    fn init(&mut self) -> Result<(), DeviceError>;

    /// Pick the format closest to `requested` that the device can play.
    fn negotiate_format(&mut self, requested: MixFormat) -> Result<MixFormat, DeviceError>;

    /// Start playing `buffer` page by page, reporting each finished page to
    /// `client`. `buffer` holds the primed pages at the time of the call.
    fn begin_buffered_playback(
        &mut self,
        buffer: &[u8],
        request: &PlaybackRequest,
        client: PageClient,
    ) -> Result<(), DeviceError>;

    fn stop_playback(&mut self);

    /// Actual playback rate, which may differ from the requested one.
    fn playback_rate(&self) -> u32;

    /// Release the device.
    fn shutdown(&mut self) {}
}

/// Slowest rate the simulated DSP accepts.
const SIM_MIN_RATE: u32 = 4_000;
/// Fastest rate the simulated DSP accepts.
const SIM_MAX_RATE: u32 = 23_000;

/// Rate an 8-bit DSP actually plays for a requested rate.
///
/// The DSP takes a one-byte time constant `256 - 1_000_000 / rate`, so the
/// achievable rates are `1_000_000 / n`.
pub(crate) fn quantize_rate(rate: u32) -> u32 {
    let rate = rate.clamp(SIM_MIN_RATE, SIM_MAX_RATE);
    let time_constant = 256 - 1_000_000 / rate;
    1_000_000 / (256 - time_constant)
}

/// Device that never plays anything. Page completions are driven by hand
/// through [`SimulatedDevice::client`] or directly on the mixer.
#[derive(Default)]
pub struct SimulatedDevice {
    eight_bit_only: bool,
    fail_init: bool,
    initialized: bool,
    playing: bool,
    starts: usize,
    stops: usize,
    rate: u32,
    request: Option<PlaybackRequest>,
    client: PageClient,
    primed: Vec<u8>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that only negotiates 8-bit output.
    pub fn eight_bit_only() -> Self {
        Self { eight_bit_only: true, ..Self::default() }
    }

    /// A device whose `init` fails.
    pub fn unavailable() -> Self {
        Self { fail_init: true, ..Self::default() }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Number of `begin_buffered_playback` calls.
    pub fn starts(&self) -> usize {
        self.starts
    }

    /// Number of `stop_playback` calls.
    pub fn stops(&self) -> usize {
        self.stops
    }

    /// The last playback request.
    pub fn request(&self) -> Option<&PlaybackRequest> {
        self.request.as_ref()
    }

    /// Client handed over by the last playback start.
    pub fn client(&self) -> &PageClient {
        &self.client
    }

    /// Buffer contents at the last playback start.
    pub fn primed(&self) -> &[u8] {
        &self.primed
    }
}

impl OutputDevice for SimulatedDevice {
    fn init(&mut self) -> Result<(), DeviceError> {
        if self.fail_init {
            return Err(DeviceError::Unavailable(String::from("simulated device disabled")));
        }
        self.initialized = true;
        Ok(())
    }

    fn negotiate_format(&mut self, requested: MixFormat) -> Result<MixFormat, DeviceError> {
        match requested {
            MixFormat::Mono16 if self.eight_bit_only => Ok(MixFormat::Mono8),
            format => Ok(format),
        }
    }

    fn begin_buffered_playback(
        &mut self,
        buffer: &[u8],
        request: &PlaybackRequest,
        client: PageClient,
    ) -> Result<(), DeviceError> {
        if !self.initialized {
            return Err(DeviceError::Playback(String::from("device not initialized")));
        }
        self.primed.clear();
        self.primed.extend_from_slice(buffer);
        self.rate = quantize_rate(request.sample_rate);
        self.request = Some(*request);
        self.client = client;
        self.playing = true;
        self.starts += 1;
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.playing = false;
        self.stops += 1;
    }

    fn playback_rate(&self) -> u32 {
        self.rate
    }

    fn shutdown(&mut self) {
        self.playing = false;
        self.initialized = false;
        self.client = PageClient::detached();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_snap_to_time_constants() {
        assert_eq!(quantize_rate(11025), 11111);
        assert_eq!(quantize_rate(8000), 8000);
        assert_eq!(quantize_rate(22050), 22222);
        assert_eq!(quantize_rate(100), 4000);
        assert_eq!(quantize_rate(44100), 23255);
    }

    #[test]
    fn detached_client_reports_detached() {
        let client = PageClient::detached();
        let mut out = [0u8; 4];
        assert!(client.is_detached());
        assert_eq!(client.advance(&mut out), PageFetch::Detached);
        assert_eq!(client.current(&mut out), PageFetch::Detached);
    }

    #[test]
    fn unavailable_device_fails_init() {
        let mut device = SimulatedDevice::unavailable();
        assert!(matches!(device.init(), Err(DeviceError::Unavailable(_))));
        assert!(!device.is_initialized());
    }

    #[test]
    fn eight_bit_device_downgrades() {
        let mut device = SimulatedDevice::eight_bit_only();
        assert_eq!(device.negotiate_format(MixFormat::Mono16), Ok(MixFormat::Mono8));
        let mut device = SimulatedDevice::new();
        assert_eq!(device.negotiate_format(MixFormat::Mono16), Ok(MixFormat::Mono16));
    }
}

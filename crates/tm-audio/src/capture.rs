//! Headless device for offline rendering.
//!
//! The device never plays anything by itself. A [`CaptureTap`] stands in for
//! the hardware: each pull reports the playing page as finished and returns
//! the next one, exactly like a DMA completion would.

use parking_lot::Mutex;
use std::sync::Arc;
use tm_engine::{DeviceError, MixFormat, OutputDevice, PageClient, PageFetch, PlaybackRequest};
use tracing::debug;

#[derive(Default)]
struct CaptureState {
    client: PageClient,
    request: Option<PlaybackRequest>,
    playing: bool,
    /// The first page after a start is read without advancing.
    fresh: bool,
    pages: u64,
}

/// Output device whose pages are pulled by a [`CaptureTap`].
#[derive(Default)]
pub struct CaptureDevice {
    state: Arc<Mutex<CaptureState>>,
    rate: u32,
}

impl CaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for pulling pages from outside the engine's critical section.
    pub fn tap(&self) -> CaptureTap {
        CaptureTap { state: self.state.clone() }
    }
}

impl OutputDevice for CaptureDevice {
    fn init(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn negotiate_format(&mut self, requested: MixFormat) -> Result<MixFormat, DeviceError> {
        Ok(requested)
    }

    fn begin_buffered_playback(
        &mut self,
        _buffer: &[u8],
        request: &PlaybackRequest,
        client: PageClient,
    ) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        state.client = client;
        state.request = Some(*request);
        state.playing = true;
        state.fresh = true;
        self.rate = request.sample_rate;
        debug!(rate = self.rate, "capture started");
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.state.lock().playing = false;
    }

    fn playback_rate(&self) -> u32 {
        self.rate
    }

    fn shutdown(&mut self) {
        let mut state = self.state.lock();
        state.playing = false;
        state.client = PageClient::detached();
    }
}

/// What a pull produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapRead {
    /// A page of this many bytes was copied.
    Page(usize),
    /// Playback is stopped; nothing was copied.
    Idle,
    /// The engine held its lock; try again.
    Busy,
}

/// Pulls pages from a [`CaptureDevice`].
#[derive(Clone)]
pub struct CaptureTap {
    state: Arc<Mutex<CaptureState>>,
}

impl CaptureTap {
    /// Read the next page into `out`.
    ///
    /// Must not be called from inside the engine's critical section.
    pub fn pull(&self, out: &mut [u8]) -> TapRead {
        let (client, fresh) = {
            let state = self.state.lock();
            if !state.playing {
                return TapRead::Idle;
            }
            (state.client.clone(), state.fresh)
        };
        let fetched = if fresh { client.current(out) } else { client.advance(out) };
        match fetched {
            PageFetch::Copied(n) => {
                let mut state = self.state.lock();
                state.fresh = false;
                state.pages += 1;
                TapRead::Page(n)
            }
            PageFetch::Busy => TapRead::Busy,
            PageFetch::Detached => TapRead::Idle,
        }
    }

    /// Pages pulled so far.
    pub fn pages(&self) -> u64 {
        self.state.lock().pages
    }

    /// The last playback request.
    pub fn request(&self) -> Option<PlaybackRequest> {
        self.state.lock().request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_engine::{MixerConfig, SoundEngine};

    #[test]
    fn idle_until_first_play() {
        let device = CaptureDevice::new();
        let tap = device.tap();
        let engine = SoundEngine::new();
        engine.init(device, MixerConfig::default()).unwrap();
        let mut page = [0u8; 128];
        assert_eq!(tap.pull(&mut page), TapRead::Idle);

        let data: Arc<[u8]> = Arc::from(vec![0xFFu8; 200]);
        let handle = engine.play(data, 200, 1).unwrap();
        assert_eq!(tap.pull(&mut page), TapRead::Page(128));
        assert!(page.iter().all(|&b| b == 0x80));
        assert_eq!(tap.pull(&mut page), TapRead::Page(128));
        assert!(page.iter().all(|&b| b == 0xFF));
        assert_eq!(tap.pull(&mut page), TapRead::Page(128));
        assert_eq!(&page[70..74], &[0xFF, 0xFF, 0x80, 0x80]);
        assert_eq!(tap.pages(), 3);
        tap.pull(&mut page);
        assert!(!engine.is_playing(handle));
        assert_eq!(tap.request().map(|r| r.pages), Some(4));
    }

    #[test]
    fn stop_makes_tap_idle() {
        let device = CaptureDevice::new();
        let tap = device.tap();
        let engine = SoundEngine::new();
        engine.init(device, MixerConfig::default()).unwrap();
        engine.play(Arc::from(vec![0x90u8; 50]), 50, 1).unwrap();
        engine.stop_all().unwrap();
        assert_eq!(tap.pull(&mut [0u8; 128]), TapRead::Idle);
    }
}

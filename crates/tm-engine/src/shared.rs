//! Lock-guarded mixer shared between mainline code and an output device.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::warn;

use crate::config::MixerConfig;
use crate::device::{OutputDevice, PageClient, PageFetch, PageSource};
use crate::format::MixFormat;
use crate::mixer::Mixer;
use crate::voice::VoiceHandle;
use crate::MixError;

/// Cloneable handle to one mixing engine.
///
/// The mutex stands in for masking the device interrupt. Mainline calls
/// block on it; device callbacks only try it and report
/// [`PageFetch::Busy`] when mainline holds it, so a device may be stopped
/// from inside a critical section without deadlocking its feeder.
pub struct SoundEngine<D: OutputDevice + 'static> {
    inner: Arc<EngineInner<D>>,
}

struct EngineInner<D: OutputDevice> {
    mixer: Mutex<Option<Mixer<D>>>,
}

impl<D: OutputDevice + 'static> Clone for SoundEngine<D> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<D: OutputDevice + 'static> Default for SoundEngine<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: OutputDevice + 'static> SoundEngine<D> {
    /// An uninstalled engine.
    pub fn new() -> Self {
        Self { inner: Arc::new(EngineInner { mixer: Mutex::new(None) }) }
    }

    /// Install a mixer over `device`. A previously installed mixer is shut
    /// down first and its device dropped.
    pub fn init(&self, device: D, config: MixerConfig) -> Result<(), MixError> {
        let mut slot = self.inner.mixer.lock();
        if let Some(previous) = slot.take() {
            warn!("mixer re-initialized while installed");
            drop(previous.shutdown());
        }
        let mut mixer = Mixer::init(device, config)?;
        let weak: Weak<EngineInner<D>> = Arc::downgrade(&self.inner);
        let source: Weak<dyn PageSource> = weak;
        mixer.set_page_client(PageClient::new(source));
        *slot = Some(mixer);
        Ok(())
    }

    fn with_mixer<R>(&self, f: impl FnOnce(&mut Mixer<D>) -> Result<R, MixError>) -> Result<R, MixError> {
        let mut slot = self.inner.mixer.lock();
        let mixer = slot.as_mut().ok_or(MixError::NotInstalled)?;
        f(mixer)
    }

    /// See [`Mixer::play`].
    pub fn play(&self, data: Arc<[u8]>, length: usize, priority: i32) -> Result<VoiceHandle, MixError> {
        self.with_mixer(|m| m.play(data, length, priority))
    }

    /// See [`Mixer::kill`].
    pub fn kill(&self, handle: VoiceHandle) -> Result<(), MixError> {
        self.with_mixer(|m| m.kill(handle))
    }

    pub fn stop_all(&self) -> Result<(), MixError> {
        self.with_mixer(|m| {
            m.stop_all();
            Ok(())
        })
    }

    /// False when not installed.
    pub fn is_playing(&self, handle: VoiceHandle) -> bool {
        self.with_mixer(|m| Ok(m.is_playing(handle))).unwrap_or(false)
    }

    /// Zero when not installed.
    pub fn active_count(&self) -> usize {
        self.with_mixer(|m| Ok(m.active_count())).unwrap_or(0)
    }

    pub fn set_mix_format(&self, format: MixFormat) -> Result<MixFormat, MixError> {
        self.with_mixer(|m| m.set_mix_format(format))
    }

    pub fn playback_rate(&self) -> Result<u32, MixError> {
        self.with_mixer(|m| Ok(m.playback_rate()))
    }

    /// Page completion from a host-driven device. Same as a device's
    /// [`PageClient::advance`] but blocks on the lock instead of failing.
    pub fn on_page_complete(&self) -> Result<(), MixError> {
        self.with_mixer(|m| {
            m.on_page_complete();
            Ok(())
        })
    }

    /// Run `f` inside the critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut Mixer<D>) -> R) -> Result<R, MixError> {
        self.with_mixer(|m| Ok(f(m)))
    }

    pub fn is_installed(&self) -> bool {
        self.inner.mixer.lock().is_some()
    }

    /// Stop playback and release the device. Returns it, or `None` if the
    /// engine was not installed.
    pub fn shutdown(&self) -> Option<D> {
        let mixer = self.inner.mixer.lock().take()?;
        Some(mixer.shutdown())
    }
}

impl<D: OutputDevice> PageSource for EngineInner<D> {
    fn advance(&self, out: &mut [u8]) -> PageFetch {
        let Some(mut slot) = self.mixer.try_lock() else {
            return PageFetch::Busy;
        };
        match slot.as_mut() {
            Some(mixer) => {
                mixer.on_page_complete();
                PageFetch::Copied(mixer.copy_playing(out))
            }
            None => PageFetch::Detached,
        }
    }

    fn current(&self, out: &mut [u8]) -> PageFetch {
        let Some(slot) = self.mixer.try_lock() else {
            return PageFetch::Busy;
        };
        match slot.as_ref() {
            Some(mixer) => PageFetch::Copied(mixer.copy_playing(out)),
            None => PageFetch::Detached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedDevice;

    fn ramp(len: usize) -> Arc<[u8]> {
        (0..len).map(|i| (i % 200) as u8 + 20).collect::<Vec<_>>().into()
    }

    #[test]
    fn operations_before_init_fail() {
        let engine: SoundEngine<SimulatedDevice> = SoundEngine::new();
        assert_eq!(engine.play(ramp(10), 10, 1), Err(MixError::NotInstalled));
        assert_eq!(engine.kill(VoiceHandle(1)), Err(MixError::NotInstalled));
        assert_eq!(engine.stop_all(), Err(MixError::NotInstalled));
        assert!(!engine.is_playing(VoiceHandle(1)));
        assert_eq!(engine.active_count(), 0);
        assert!(engine.shutdown().is_none());
    }

    #[test]
    fn failed_init_stays_uninstalled() {
        let engine = SoundEngine::new();
        let err = engine.init(SimulatedDevice::unavailable(), MixerConfig::default());
        assert!(matches!(err, Err(MixError::Device(_))));
        assert!(!engine.is_installed());
    }

    #[test]
    fn device_client_advances_pages() {
        let engine = SoundEngine::new();
        engine.init(SimulatedDevice::new(), MixerConfig::default()).unwrap();
        let handle = engine.play(ramp(300), 300, 5).unwrap();
        let client = engine.with(|m| m.device().client().clone()).unwrap();

        let mut page = [0u8; 128];
        assert_eq!(client.current(&mut page), PageFetch::Copied(128));
        assert!(page.iter().all(|&b| b == 0x80));
        assert_eq!(client.advance(&mut page), PageFetch::Copied(128));
        assert_eq!(page[0], 20);
        client.advance(&mut page);
        client.advance(&mut page);
        assert!(!engine.is_playing(handle));
    }

    #[test]
    fn client_is_busy_inside_critical_section() {
        let engine = SoundEngine::new();
        engine.init(SimulatedDevice::new(), MixerConfig::default()).unwrap();
        engine.play(ramp(10), 10, 5).unwrap();
        let client = engine.with(|m| m.device().client().clone()).unwrap();
        let fetched = engine.with(|_| client.advance(&mut [0u8; 128])).unwrap();
        assert_eq!(fetched, PageFetch::Busy);
    }

    #[test]
    fn shutdown_detaches_client() {
        let engine = SoundEngine::new();
        engine.init(SimulatedDevice::new(), MixerConfig::default()).unwrap();
        engine.play(ramp(10), 10, 5).unwrap();
        let client = engine.with(|m| m.device().client().clone()).unwrap();
        let device = engine.shutdown().unwrap();
        assert_eq!(device.stops(), 1);
        assert_eq!(client.advance(&mut [0u8; 128]), PageFetch::Detached);
        drop(engine);
        assert!(client.is_detached());
    }

    #[test]
    fn reinit_replaces_mixer() {
        let engine = SoundEngine::new();
        engine.init(SimulatedDevice::new(), MixerConfig::default()).unwrap();
        engine.play(ramp(10), 10, 5).unwrap();
        let config = MixerConfig { voices: 8, ..MixerConfig::default() };
        engine.init(SimulatedDevice::new(), config).unwrap();
        assert_eq!(engine.with(|m| m.pool().capacity()).unwrap(), 8);
        assert_eq!(engine.active_count(), 0);
    }
}

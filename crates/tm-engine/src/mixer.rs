//! Mixer: the paged mixing state machine.

use alloc::sync::Arc;
use tracing::{debug, info};

use crate::config::MixerConfig;
use crate::device::{OutputDevice, PageClient, PlaybackRequest};
use crate::format::{attenuation_shift, MixFormat};
use crate::page_buffer::PageBuffer;
use crate::voice::{Voice, VoiceHandle};
use crate::voice_pool::VoicePool;
use crate::MixError;

/// Mixing engine bound to one output device.
///
/// Mainline calls (`play`, `kill`, ...) and the device's page completions
/// must not interleave. [`SoundEngine`](crate::SoundEngine) provides the
/// lock for that; a single-threaded host can drive the mixer directly.
pub struct Mixer<D: OutputDevice> {
    device: D,
    config: MixerConfig,
    /// Format negotiated with the device.
    format: MixFormat,
    buffer: PageBuffer,
    pool: VoicePool,
    /// Page the device is playing.
    play_page: usize,
    /// Page being prepared, one ahead of `play_page`.
    mix_page: usize,
    started: bool,
    /// Rate reported by the device.
    mix_rate: u32,
    /// 16-bit attenuation for the configured voice count.
    shift: u32,
    client: PageClient,
}

impl<D: OutputDevice> Mixer<D> {
    /// Claim `device` and allocate the mix buffer.
    pub fn init(mut device: D, config: MixerConfig) -> Result<Self, MixError> {
        config.validate()?;
        device.init()?;
        let prepared = device
            .negotiate_format(config.format)
            .map_err(MixError::from)
            .and_then(|format| Ok((format, PageBuffer::new(config.pages, config.page_bytes, format.silence())?)));
        let (format, buffer) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                device.shutdown();
                return Err(err);
            }
        };
        info!(
            rate = config.sample_rate,
            voices = config.voices,
            pages = config.pages,
            ?format,
            "mixer installed"
        );
        Ok(Self {
            device,
            config,
            format,
            buffer,
            pool: VoicePool::new(config.voices),
            play_page: 0,
            mix_page: 0,
            started: false,
            mix_rate: config.sample_rate,
            shift: attenuation_shift(config.voices),
            client: PageClient::detached(),
        })
    }

    /// Client handed to the device when playback starts.
    pub fn set_page_client(&mut self, client: PageClient) {
        self.client = client;
    }

    /// Start a voice playing `length` samples of `data`.
    ///
    /// When every voice is busy, the first active voice with priority at or
    /// below `priority` is killed to make room; otherwise the call fails with
    /// [`MixError::NoVoices`].
    pub fn play(&mut self, data: Arc<[u8]>, length: usize, priority: i32) -> Result<VoiceHandle, MixError> {
        let slot = self.alloc_voice(priority)?;
        if !self.started {
            if let Err(err) = self.start_playback() {
                self.pool.release(slot);
                return Err(err);
            }
        }
        let handle = self.pool.next_handle();
        let pages = self.buffer.pages();
        let voice = self.pool.voice_mut(slot);
        voice.reset(data, length, priority, handle, pages);
        voice.mix_page(self.mix_page, self.buffer.page_mut(self.mix_page), self.format, self.shift);
        self.pool.activate(slot);
        Ok(handle)
    }

    fn alloc_voice(&mut self, priority: i32) -> Result<usize, MixError> {
        if self.pool.active_len() >= self.config.voices {
            let victim = self.pool.eviction_candidate(priority).ok_or(MixError::NoVoices)?;
            debug!(%victim, priority, "evicting voice");
            self.kill(victim)?;
        }
        self.pool.take_free().ok_or(MixError::NoVoices)
    }

    /// Stop a voice, taking back anything mixed ahead of the device.
    pub fn kill(&mut self, handle: VoiceHandle) -> Result<(), MixError> {
        let slot = self.pool.deactivate(handle).ok_or(MixError::VoiceNotFound(handle))?;
        if self.started {
            // Only the playing page and the one being prepared can hold
            // unplayed samples of this voice.
            for index in [self.play_page, self.mix_page] {
                self.pool
                    .voice_mut(slot)
                    .unmix_page(index, self.buffer.page_mut(index), self.format, self.shift);
            }
        }
        self.pool.release(slot);
        Ok(())
    }

    /// Device callback: the playing page finished.
    ///
    /// The prepared page becomes the playing page, the next page is silenced
    /// and mixed, and voices that had nothing left for it are freed.
    pub fn on_page_complete(&mut self) {
        if !self.started {
            return;
        }
        self.play_page = self.mix_page;
        self.mix_page = (self.mix_page + 1) % self.buffer.pages();
        self.prepare_page(self.mix_page);
        let page = self.mix_page;
        self.pool.retire(|voice| !voice.page(page).active);
    }

    fn prepare_page(&mut self, index: usize) {
        let page = self.buffer.page_mut(index);
        page.fill(self.format.silence());
        self.pool.mix_active(index, page, self.format, self.shift);
    }

    fn start_playback(&mut self) -> Result<(), MixError> {
        self.mix_page = 0;
        self.prepare_page(0);
        self.play_page = 0;

        let request = PlaybackRequest {
            page_bytes: self.config.page_bytes,
            pages: self.buffer.pages(),
            sample_rate: self.config.sample_rate,
            format: self.format,
        };
        self.device
            .begin_buffered_playback(self.buffer.as_bytes(), &request, self.client.clone())?;
        self.mix_rate = self.device.playback_rate();

        self.mix_page = 1;
        self.prepare_page(self.mix_page);
        self.started = true;
        debug!(rate = self.mix_rate, "playback started");
        Ok(())
    }

    /// Stop the device and free every voice.
    pub fn stop_all(&mut self) {
        self.device.stop_playback();
        self.started = false;
        let freed = self.pool.release_all_active();
        debug!(freed, "playback stopped");
    }

    /// Whether the voice is still in the active list.
    pub fn is_playing(&self, handle: VoiceHandle) -> bool {
        self.pool.contains(handle)
    }

    /// Voices contributing to the page the device is playing.
    pub fn active_count(&self) -> usize {
        self.pool.count_active_on(self.play_page)
    }

    /// Switch output format. Stops playback; the next `play` restarts it.
    pub fn set_mix_format(&mut self, format: MixFormat) -> Result<MixFormat, MixError> {
        self.stop_all();
        let negotiated = self.device.negotiate_format(format)?;
        self.format = negotiated;
        self.buffer.fill(negotiated.silence());
        debug!(?negotiated, "mix format changed");
        Ok(negotiated)
    }

    /// Stop playback, release the device and hand it back.
    pub fn shutdown(mut self) -> D {
        self.stop_all();
        self.device.shutdown();
        info!("mixer shut down");
        self.device
    }

    /// Rate the device reported at the last playback start.
    pub fn playback_rate(&self) -> u32 {
        self.mix_rate
    }

    /// Samples per page in the current format.
    pub fn page_capacity(&self) -> usize {
        self.buffer.page_bytes() / self.format.sample_bytes()
    }

    pub fn format(&self) -> MixFormat {
        self.format
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn play_page(&self) -> usize {
        self.play_page
    }

    pub fn mix_page(&self) -> usize {
        self.mix_page
    }

    pub fn page(&self, index: usize) -> &[u8] {
        self.buffer.page(index)
    }

    /// Copy the playing page into `out`, returning the bytes copied.
    pub fn copy_playing(&self, out: &mut [u8]) -> usize {
        let page = self.buffer.page(self.play_page);
        let n = page.len().min(out.len());
        out[..n].copy_from_slice(&page[..n]);
        n
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// The active voice with this handle.
    pub fn voice(&self, handle: VoiceHandle) -> Option<&Voice> {
        self.pool.find_active(handle).and_then(|slot| self.pool.voice(slot))
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

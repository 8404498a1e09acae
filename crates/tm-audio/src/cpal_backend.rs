//! CPAL-based output device.
//!
//! A worker thread owns the cpal stream and acts as the page-completion
//! source: whenever the ring buffer has room for another page it reports
//! the playing page as done and queues the next one.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tm_engine::{DeviceError, MixFormat, OutputDevice, PageClient, PageFetch, PlaybackRequest};
use tracing::{debug, error, warn};

use crate::error::AudioError;

/// Feeder sleep while the engine is busy or the ring is full.
const FEED_POLL: Duration = Duration::from_millis(1);

/// Output device playing through the default cpal output.
#[derive(Default)]
pub struct CpalDevice {
    /// Device rate found at init.
    device_rate: u32,
    channels: u16,
    /// Rate of the running playback.
    rate: u32,
    worker: Option<Worker>,
}

struct Worker {
    stop_signal: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl CpalDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Native rate of the output device, known after `init`.
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    pub fn is_playing(&self) -> bool {
        self.worker.is_some()
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop_signal.store(true, Ordering::Relaxed);
            if worker.thread.join().is_err() {
                error!("audio worker panicked");
            }
        }
    }
}

fn default_config() -> Result<StreamConfig, AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceInit(e.to_string()))?;
    Ok(config.into())
}

impl OutputDevice for CpalDevice {
    fn init(&mut self) -> Result<(), DeviceError> {
        let config = default_config()?;
        self.device_rate = config.sample_rate.0;
        self.channels = config.channels;
        debug!(rate = self.device_rate, channels = self.channels, "cpal device ready");
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
        self.stop_worker();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();
        let request = *request;
        let signal = stop_signal.clone();
        let thread = thread::Builder::new()
            .name("tickmix-audio".into())
            .spawn(move || run_worker(request, client, signal, ready_tx))
            .map_err(|e| AudioError::Playback(e.to_string()))?;

        let started = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::Playback("audio worker exited".into())));
        if let Err(err) = started {
            let _ = thread.join();
            return Err(err.into());
        }
        self.rate = request.sample_rate;
        self.worker = Some(Worker { stop_signal, thread });
        Ok(())
    }

    fn stop_playback(&mut self) {
        self.stop_worker();
    }

    fn playback_rate(&self) -> u32 {
        self.rate
    }

    fn shutdown(&mut self) {
        self.stop_worker();
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

fn run_worker(
    request: PlaybackRequest,
    client: PageClient,
    stop_signal: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<(), AudioError>>,
) {
    // Room for the page being played plus the next one.
    let ring = HeapRb::<u8>::new(request.page_bytes * 2);
    let (mut producer, consumer) = ring.split();
    let _stream = match open_stream(&request, consumer) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    debug!(rate = request.sample_rate, "cpal playback started");

    let mut page = vec![0u8; request.page_bytes];
    let mut primed = false;
    while !stop_signal.load(Ordering::Relaxed) {
        if producer.vacant_len() < request.page_bytes {
            thread::sleep(FEED_POLL);
            continue;
        }
        let fetched = if primed { client.advance(&mut page) } else { client.current(&mut page) };
        match fetched {
            PageFetch::Copied(n) => {
                producer.push_slice(&page[..n]);
                primed = true;
            }
            PageFetch::Busy => thread::sleep(FEED_POLL),
            PageFetch::Detached => {
                warn!("mixing engine went away during playback");
                break;
            }
        }
    }
    debug!("cpal playback stopped");
}

/// Nearest-sample reader from the page ring at the device rate.
struct Stepper {
    consumer: HeapCons<u8>,
    format: MixFormat,
    source_rate: u32,
    device_rate: u32,
    phase: u32,
    current: f32,
}

impl Stepper {
    fn next(&mut self) -> f32 {
        self.phase += self.source_rate;
        while self.phase >= self.device_rate {
            self.phase -= self.device_rate;
            self.current = self.pop().unwrap_or(0.0);
        }
        self.current
    }

    fn pop(&mut self) -> Option<f32> {
        match self.format {
            MixFormat::Mono8 => self.consumer.try_pop().map(|b| (f32::from(b) - 128.0) / 128.0),
            MixFormat::Mono16 => {
                if self.consumer.occupied_len() < 2 {
                    return None;
                }
                let lo = self.consumer.try_pop()?;
                let hi = self.consumer.try_pop()?;
                Some(f32::from(i16::from_le_bytes([lo, hi])) / 32768.0)
            }
        }
    }
}

fn open_stream(request: &PlaybackRequest, consumer: HeapCons<u8>) -> Result<Stream, AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let config: StreamConfig = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceInit(e.to_string()))?
        .into();
    let channels = usize::from(config.channels).max(1);
    let mut stepper = Stepper {
        consumer,
        format: request.format,
        source_rate: request.sample_rate,
        device_rate: config.sample_rate.0.max(1),
        phase: 0,
        current: 0.0,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    frame.fill(stepper.next());
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| AudioError::StreamCreate(e.to_string()))?;
    stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stepper(format: MixFormat, bytes: &[u8], source_rate: u32, device_rate: u32) -> Stepper {
        let ring = HeapRb::<u8>::new(64);
        let (mut producer, consumer) = ring.split();
        producer.push_slice(bytes);
        Stepper { consumer, format, source_rate, device_rate, phase: 0, current: 0.0 }
    }

    #[test]
    fn upsampling_repeats_samples() {
        let mut s = stepper(MixFormat::Mono8, &[0x80, 0xC0], 1, 2);
        let out: Vec<f32> = (0..4).map(|_| s.next()).collect();
        assert_eq!(out, [0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn downsampling_skips_samples() {
        let mut s = stepper(MixFormat::Mono8, &[0x80, 0xC0, 0x40, 0x00], 2, 1);
        assert_eq!(s.next(), 0.5);
        assert_eq!(s.next(), -1.0);
    }

    #[test]
    fn sixteen_bit_reads_little_endian() {
        let bytes = 0x4000i16.to_le_bytes();
        let mut s = stepper(MixFormat::Mono16, &bytes, 1, 1);
        assert_eq!(s.next(), 0.5);
        assert_eq!(s.next(), 0.0);
    }

    #[test]
    fn audio_errors_map_to_device_errors() {
        assert!(matches!(DeviceError::from(AudioError::NoDevice), DeviceError::Unavailable(_)));
        assert!(matches!(
            DeviceError::from(AudioError::StreamCreate("x".into())),
            DeviceError::Playback(_)
        ));
    }
}

//! Voice state: one playing sound pipelined across the mix pages.

use alloc::sync::Arc;
use core::fmt;

use crate::config::MAX_PAGES;
use crate::format::MixFormat;
use crate::mix;

/// Smallest handle ever handed out.
pub const MIN_VOICE_HANDLE: u32 = 1;

/// Caller-visible voice identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u32);

impl fmt::Display for VoiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a voice contributed to one page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageMix {
    /// Source offset of the first mixed sample.
    pub start: usize,
    /// Samples mixed into the page.
    pub len: usize,
    /// False once the voice had nothing left for this page.
    pub active: bool,
}

/// One voice slot.
pub struct Voice {
    data: Option<Arc<[u8]>>,
    remaining: usize,
    cursor: usize,
    pages: heapless::Vec<PageMix, MAX_PAGES>,
    handle: VoiceHandle,
    priority: i32,
}

impl Voice {
    pub(crate) fn new() -> Self {
        Self {
            data: None,
            remaining: 0,
            cursor: 0,
            pages: heapless::Vec::new(),
            handle: VoiceHandle::default(),
            priority: 0,
        }
    }

    /// Load new source data and clear the per-page records.
    pub(crate) fn reset(
        &mut self,
        data: Arc<[u8]>,
        length: usize,
        priority: i32,
        handle: VoiceHandle,
        pages: usize,
    ) {
        self.remaining = length.min(data.len());
        self.data = Some(data);
        self.cursor = 0;
        self.priority = priority;
        self.handle = handle;
        self.pages.clear();
        // `pages` never exceeds MAX_PAGES once the config is validated.
        let _ = self.pages.resize_default(pages.min(MAX_PAGES));
    }

    /// Drop the source data. Cursor and remaining count stay readable.
    pub(crate) fn release(&mut self) {
        self.data = None;
    }

    /// Mix the next run of samples onto `page`, recording it under `index`.
    pub(crate) fn mix_page(&mut self, index: usize, page: &mut [u8], format: MixFormat, shift: u32) {
        let Some(data) = self.data.as_ref() else {
            self.pages[index] = PageMix::default();
            return;
        };
        if self.remaining == 0 {
            self.pages[index] = PageMix { start: self.cursor, len: 0, active: false };
            return;
        }
        let len = self.remaining.min(page.len() / format.sample_bytes());
        let src = &data[self.cursor..self.cursor + len];
        match format {
            MixFormat::Mono8 => mix::mix_mono8(&mut page[..len], src),
            MixFormat::Mono16 => mix::mix_mono16(&mut page[..len * 2], src, shift),
        }
        self.pages[index] = PageMix { start: self.cursor, len, active: true };
        self.cursor += len;
        self.remaining -= len;
    }

    /// Take back whatever was mixed onto `page` under `index`.
    pub(crate) fn unmix_page(&mut self, index: usize, page: &mut [u8], format: MixFormat, shift: u32) {
        let record = self.pages[index];
        self.pages[index] = PageMix::default();
        let Some(data) = self.data.as_ref() else {
            return;
        };
        if record.len == 0 {
            return;
        }
        let src = &data[record.start..record.start + record.len];
        match format {
            MixFormat::Mono8 => mix::unmix_mono8(&mut page[..record.len], src),
            MixFormat::Mono16 => mix::unmix_mono16(&mut page[..record.len * 2], src, shift),
        }
        self.cursor = self.cursor.min(record.start);
        self.remaining += record.len;
    }

    pub fn handle(&self) -> VoiceHandle {
        self.handle
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Samples not yet mixed.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Source offset of the next sample to mix.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Record for page `index`.
    pub fn page(&self, index: usize) -> PageMix {
        self.pages.get(index).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn voice(len: usize) -> Voice {
        let data: Arc<[u8]> = (0..len).map(|i| i as u8).collect::<alloc::vec::Vec<_>>().into();
        let mut voice = Voice::new();
        voice.reset(data, len, 5, VoiceHandle(1), 4);
        voice
    }

    #[test]
    fn mixes_at_most_one_page() {
        let mut v = voice(10);
        let mut page = vec![0x80u8; 4];
        v.mix_page(1, &mut page, MixFormat::Mono8, 8);
        assert_eq!(page, [0, 1, 2, 3]);
        assert_eq!(v.page(1), PageMix { start: 0, len: 4, active: true });
        assert_eq!((v.cursor(), v.remaining()), (4, 6));
    }

    #[test]
    fn exhausted_voice_goes_inactive() {
        let mut v = voice(3);
        let mut page = vec![0x80u8; 4];
        v.mix_page(0, &mut page, MixFormat::Mono8, 8);
        assert_eq!(v.page(0).len, 3);
        v.mix_page(1, &mut page, MixFormat::Mono8, 8);
        assert!(!v.page(1).active);
        assert_eq!(v.page(1).len, 0);
    }

    #[test]
    fn unmix_restores_page_and_cursor() {
        let mut v = voice(12);
        let mut a = vec![0x80u8; 4];
        let mut b = vec![0x80u8; 4];
        v.mix_page(2, &mut a, MixFormat::Mono8, 8);
        v.mix_page(3, &mut b, MixFormat::Mono8, 8);
        v.unmix_page(2, &mut a, MixFormat::Mono8, 8);
        v.unmix_page(3, &mut b, MixFormat::Mono8, 8);
        assert_eq!(a, [0x80; 4]);
        assert_eq!(b, [0x80; 4]);
        assert_eq!((v.cursor(), v.remaining()), (0, 12));
    }

    #[test]
    fn length_is_clamped_to_data() {
        let data: Arc<[u8]> = Arc::from(&[1u8, 2, 3][..]);
        let mut v = Voice::new();
        v.reset(data, 100, 1, VoiceHandle(2), 2);
        assert_eq!(v.remaining(), 3);
    }
}

//! VoicePool: free and active voice lists over a fixed slot array.

use alloc::vec::Vec;
use arrayvec::ArrayVec;

use crate::config::VOICE_SLOTS;
use crate::format::MixFormat;
use crate::voice::{Voice, VoiceHandle, MIN_VOICE_HANDLE};

/// Index of a voice slot.
pub type VoiceSlot = usize;

/// Voice slots split into a free pool and an active list.
///
/// Every slot is in exactly one of the two lists. Both lists keep insertion
/// order; releases append to the free tail and allocations take its head.
pub struct VoicePool {
    voices: Vec<Voice>,
    free: ArrayVec<VoiceSlot, VOICE_SLOTS>,
    active: ArrayVec<VoiceSlot, VOICE_SLOTS>,
    last_handle: u32,
}

impl VoicePool {
    /// Create a pool of `slots` free voices (at most [`VOICE_SLOTS`]).
    pub fn new(slots: usize) -> Self {
        let slots = slots.min(VOICE_SLOTS);
        Self {
            voices: (0..slots).map(|_| Voice::new()).collect(),
            free: (0..slots).collect(),
            active: ArrayVec::new(),
            last_handle: MIN_VOICE_HANDLE - 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Active slots, oldest first.
    pub fn active_slots(&self) -> &[VoiceSlot] {
        &self.active
    }

    /// Free slots, next allocation first.
    pub fn free_slots(&self) -> &[VoiceSlot] {
        &self.free
    }

    pub fn voice(&self, slot: VoiceSlot) -> Option<&Voice> {
        self.voices.get(slot)
    }

    pub(crate) fn voice_mut(&mut self, slot: VoiceSlot) -> &mut Voice {
        &mut self.voices[slot]
    }

    /// Slot of the active voice with this handle.
    pub fn find_active(&self, handle: VoiceHandle) -> Option<VoiceSlot> {
        self.active.iter().copied().find(|&slot| self.voices[slot].handle() == handle)
    }

    pub fn contains(&self, handle: VoiceHandle) -> bool {
        self.find_active(handle).is_some()
    }

    /// Active voices flagged active on page `index`.
    pub fn count_active_on(&self, index: usize) -> usize {
        self.active.iter().filter(|&&slot| self.voices[slot].page(index).active).count()
    }

    /// Next handle after the last one issued, wrapping back to the minimum
    /// and skipping handles of active voices.
    pub(crate) fn next_handle(&mut self) -> VoiceHandle {
        loop {
            self.last_handle = self.last_handle.wrapping_add(1);
            if self.last_handle < MIN_VOICE_HANDLE {
                self.last_handle = MIN_VOICE_HANDLE;
            }
            let handle = VoiceHandle(self.last_handle);
            if !self.contains(handle) {
                return handle;
            }
        }
    }

    /// First active voice, in list order, that a request at `priority` may evict.
    pub fn eviction_candidate(&self, priority: i32) -> Option<VoiceHandle> {
        self.active
            .iter()
            .map(|&slot| &self.voices[slot])
            .find(|voice| voice.priority() <= priority)
            .map(Voice::handle)
    }

    /// Take the head of the free pool.
    pub(crate) fn take_free(&mut self) -> Option<VoiceSlot> {
        self.free.pop_at(0)
    }

    /// Append a slot to the active list.
    pub(crate) fn activate(&mut self, slot: VoiceSlot) {
        self.active.push(slot);
    }

    /// Unlink the active voice with this handle.
    pub(crate) fn deactivate(&mut self, handle: VoiceHandle) -> Option<VoiceSlot> {
        let pos = self.active.iter().position(|&slot| self.voices[slot].handle() == handle)?;
        self.active.pop_at(pos)
    }

    /// Return an unlinked slot to the free tail.
    pub(crate) fn release(&mut self, slot: VoiceSlot) {
        self.voices[slot].release();
        self.free.push(slot);
    }

    /// Mix every active voice onto `page`, recording it under `index`.
    pub(crate) fn mix_active(&mut self, index: usize, page: &mut [u8], format: MixFormat, shift: u32) {
        for &slot in &self.active {
            self.voices[slot].mix_page(index, page, format, shift);
        }
    }

    /// Move active voices matching `dead` to the free pool. Returns how many moved.
    pub(crate) fn retire(&mut self, mut dead: impl FnMut(&Voice) -> bool) -> usize {
        let mut retired = 0;
        let mut i = 0;
        while i < self.active.len() {
            let slot = self.active[i];
            if dead(&self.voices[slot]) {
                self.active.remove(i);
                self.release(slot);
                retired += 1;
            } else {
                i += 1;
            }
        }
        retired
    }

    /// Move every active voice to the free pool.
    pub(crate) fn release_all_active(&mut self) -> usize {
        self.retire(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;

    fn start(pool: &mut VoicePool, priority: i32) -> VoiceHandle {
        let slot = pool.take_free().unwrap();
        let handle = pool.next_handle();
        let data: Arc<[u8]> = Arc::from(&[0x80u8; 16][..]);
        pool.voice_mut(slot).reset(data, 16, priority, handle, 4);
        pool.activate(slot);
        handle
    }

    #[test]
    fn slots_move_between_lists() {
        let mut pool = VoicePool::new(3);
        assert_eq!(pool.free_slots(), &[0, 1, 2]);
        let a = start(&mut pool, 1);
        let b = start(&mut pool, 1);
        assert_eq!(pool.active_slots(), &[0, 1]);
        assert_eq!(pool.free_slots(), &[2]);

        let slot = pool.deactivate(a).unwrap();
        pool.release(slot);
        assert_eq!(pool.active_slots(), &[1]);
        assert_eq!(pool.free_slots(), &[2, 0]);
        assert!(pool.contains(b));
        assert!(!pool.contains(a));
        assert_eq!(pool.active_len() + pool.free_len(), pool.capacity());
    }

    #[test]
    fn handles_increment_from_one() {
        let mut pool = VoicePool::new(2);
        assert_eq!(start(&mut pool, 1), VoiceHandle(1));
        assert_eq!(start(&mut pool, 1), VoiceHandle(2));
    }

    #[test]
    fn handles_wrap_and_skip_active() {
        let mut pool = VoicePool::new(3);
        let first = start(&mut pool, 1);
        assert_eq!(first, VoiceHandle(1));
        pool.last_handle = u32::MAX - 1;
        assert_eq!(start(&mut pool, 1), VoiceHandle(u32::MAX));
        // Wraps past zero to 1, which is still active, so 2 is issued.
        assert_eq!(start(&mut pool, 1), VoiceHandle(2));
    }

    #[test]
    fn eviction_is_first_fit_in_list_order() {
        let mut pool = VoicePool::new(4);
        let _high = start(&mut pool, 50);
        let low_a = start(&mut pool, 10);
        let _low_b = start(&mut pool, 5);
        assert_eq!(pool.eviction_candidate(20), Some(low_a));
        assert_eq!(pool.eviction_candidate(10), Some(low_a));
        assert_eq!(pool.eviction_candidate(4), None);
        assert_eq!(pool.eviction_candidate(50).map(|h| h.0), Some(1));
    }

    #[test]
    fn retire_keeps_order_of_survivors() {
        let mut pool = VoicePool::new(4);
        for p in [1, 2, 3, 4] {
            start(&mut pool, p);
        }
        let retired = pool.retire(|v| v.priority() % 2 == 0);
        assert_eq!(retired, 2);
        assert_eq!(pool.active_slots(), &[0, 2]);
        assert_eq!(pool.free_slots(), &[1, 3]);
        assert_eq!(pool.release_all_active(), 2);
        assert_eq!(pool.free_slots(), &[1, 3, 0, 2]);
    }
}

//! The N-page mix buffer.

use alloc::vec::Vec;

use crate::MixError;

/// Contiguous buffer split into equally sized pages.
pub struct PageBuffer {
    data: Vec<u8>,
    page_bytes: usize,
}

impl PageBuffer {
    /// Allocate `pages` pages of `page_bytes` each, filled with `fill`.
    pub fn new(pages: usize, page_bytes: usize, fill: u8) -> Result<Self, MixError> {
        let total = pages.checked_mul(page_bytes).ok_or(MixError::AllocationFailed)?;
        let mut data = Vec::new();
        data.try_reserve_exact(total).map_err(|_| MixError::AllocationFailed)?;
        data.resize(total, fill);
        Ok(Self { data, page_bytes })
    }

    pub fn pages(&self) -> usize {
        self.data.len() / self.page_bytes
    }

    pub fn page_bytes(&self) -> usize {
        self.page_bytes
    }

    pub fn page(&self, index: usize) -> &[u8] {
        let start = index * self.page_bytes;
        &self.data[start..start + self.page_bytes]
    }

    pub fn page_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.page_bytes;
        &mut self.data[start..start + self.page_bytes]
    }

    /// Fill every page with one byte value.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// The whole buffer, page 0 first.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_disjoint() {
        let mut buffer = PageBuffer::new(4, 8, 0x80).unwrap();
        assert_eq!(buffer.pages(), 4);
        buffer.page_mut(2).fill(1);
        assert_eq!(buffer.page(1), &[0x80; 8]);
        assert_eq!(buffer.page(2), &[1; 8]);
        assert_eq!(&buffer.as_bytes()[16..24], &[1; 8]);
        buffer.fill(0);
        assert!(buffer.as_bytes().iter().all(|&b| b == 0));
    }
}

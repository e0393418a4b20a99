//! Pin ownership table
//!
//! Tracks which physical pins are open to prevent two handles driving the
//! same line. Entries keep insertion order so iteration over open pins is
//! deterministic, and every successful open gets a fresh generation number
//! that identifies the owning handle.

use heapless::Vec;

use crate::error::{Error, Result};

/// One open pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpenEntry {
    /// Backend index
    pub physical: u8,
    /// Index the pin was opened with, in the registry's numbering scheme
    pub logical: u8,
    /// Identity of the owning handle
    pub generation: u32,
}

/// Table of open pins with capacity `N`
#[derive(Debug)]
pub struct PinAllocator<const N: usize> {
    open: Vec<OpenEntry, N>,
    next_generation: u32,
}

impl<const N: usize> Default for PinAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PinAllocator<N> {
    pub const fn new() -> Self {
        Self {
            open: Vec::new(),
            next_generation: 1,
        }
    }

    /// Allocate a physical pin
    ///
    /// Returns the generation of the new owner, or `PinAlreadyOpen` if the
    /// pin is already in use.
    pub fn allocate(&mut self, physical: u8, logical: u8) -> Result<u32> {
        if self.is_allocated(physical) {
            return Err(Error::PinAlreadyOpen(logical));
        }

        let generation = self.next_generation;
        self.open
            .push(OpenEntry {
                physical,
                logical,
                generation,
            })
            .map_err(|_| Error::InvalidPinIndex(logical))?;
        self.next_generation = self.next_generation.wrapping_add(1).max(1);
        Ok(generation)
    }

    /// Release a physical pin, keeping the order of the remaining entries
    pub fn release(&mut self, physical: u8) -> Option<OpenEntry> {
        let position = self.open.iter().position(|e| e.physical == physical)?;
        Some(self.open.remove(position))
    }

    /// Check if a pin is allocated
    pub fn is_allocated(&self, physical: u8) -> bool {
        self.get(physical).is_some()
    }

    /// Entry of an open pin
    pub fn get(&self, physical: u8) -> Option<&OpenEntry> {
        self.open.iter().find(|e| e.physical == physical)
    }

    /// Entry at `position` in insertion order
    pub fn nth(&self, position: usize) -> Option<&OpenEntry> {
        self.open.get(position)
    }

    /// Open pins in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &OpenEntry> {
        self.open.iter()
    }

    /// Get the number of allocated pins
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator() {
        let mut alloc = PinAllocator::<8>::new();

        assert!(alloc.allocate(11, 11).is_ok());
        assert!(alloc.is_allocated(11));

        // Can't allocate same pin twice
        assert_eq!(alloc.allocate(11, 11), Err(Error::PinAlreadyOpen(11)));

        // Can allocate different pin
        assert!(alloc.allocate(12, 12).is_ok());

        // Release and re-allocate
        assert!(alloc.release(11).is_some());
        assert!(!alloc.is_allocated(11));
        assert!(alloc.allocate(11, 11).is_ok());
    }

    #[test]
    fn test_release_unknown() {
        let mut alloc = PinAllocator::<8>::new();
        assert_eq!(alloc.release(3), None);
    }

    #[test]
    fn test_generations_are_unique() {
        let mut alloc = PinAllocator::<8>::new();
        let first = alloc.allocate(4, 7).unwrap();
        alloc.release(4);
        let second = alloc.allocate(4, 7).unwrap();
        assert_ne!(first, second);
        assert_eq!(alloc.get(4).map(|e| e.generation), Some(second));
    }

    #[test]
    fn test_insertion_order_survives_release() {
        let mut alloc = PinAllocator::<8>::new();
        for pin in [5, 1, 9, 3] {
            alloc.allocate(pin, pin).unwrap();
        }
        alloc.release(1);

        let order: heapless::Vec<u8, 8> = alloc.iter().map(|e| e.physical).collect();
        assert_eq!(order.as_slice(), &[5, 9, 3]);
        assert_eq!(alloc.nth(1).map(|e| e.physical), Some(9));
        assert_eq!(alloc.len(), 3);
    }

    #[test]
    fn test_capacity() {
        let mut alloc = PinAllocator::<2>::new();
        alloc.allocate(0, 0).unwrap();
        alloc.allocate(1, 1).unwrap();
        assert_eq!(alloc.allocate(2, 2), Err(Error::InvalidPinIndex(2)));
    }
}

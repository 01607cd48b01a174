//! The swap-space manager: carves a dedicated block device into page-sized
//! slots and copies page contents between frames and slots. Slot `i`
//! occupies the `PAGE_SECTORS` contiguous sectors starting at
//! `i * PAGE_SECTORS`.

use crate::dev::block::{BlockOp, BlockSector, BLOCK_SECTOR_SIZE};
use crate::sync::Mutex;
use alloc::boxed::Box;
use log::trace;
use marrowos_shared::bitmap::Bitmap;
use marrowos_shared::mem::PAGE_SIZE;

/// Number of sectors in one swap slot.
pub const PAGE_SECTORS: usize = PAGE_SIZE / BLOCK_SECTOR_SIZE;

pub struct SwapSpace {
    device: Box<dyn BlockOp>,
    /// In-use slots. Held only across the scan or flip, never across
    /// device I/O: once a slot is claimed nobody else can touch it.
    used: Mutex<Bitmap>,
}

impl SwapSpace {
    /// Sets up swap on `device`.
    ///
    /// Panics if the device is missing or smaller than one slot. Swap is a
    /// hard configuration requirement, checked once here at startup.
    pub fn new(device: Option<Box<dyn BlockOp>>) -> Self {
        let device = device.expect("no swap device");
        let slots = device.size() as usize / PAGE_SECTORS;
        assert!(slots > 0, "swap device smaller than one page");
        Self {
            device,
            used: Mutex::new(Bitmap::new(slots)),
        }
    }

    /// Total number of slots on the device.
    pub fn slots(&self) -> usize {
        self.used.lock().len()
    }

    /// Writes one page of data to a free slot and returns the slot index.
    ///
    /// Panics when every slot is taken: an in-flight eviction has no safe
    /// undo, so swap exhaustion is fatal.
    pub fn swap_out(&self, frame: &[u8]) -> usize {
        debug_assert_eq!(frame.len(), PAGE_SIZE);
        let slot = self
            .used
            .lock()
            .scan_and_set()
            .expect("out of space in swap");
        for (i, sector) in frame.chunks(BLOCK_SECTOR_SIZE).enumerate() {
            self.device
                .write((slot * PAGE_SECTORS + i) as BlockSector, sector);
        }
        trace!("swapped out one page to slot {slot}");
        slot
    }

    /// Reads slot `slot` back into `frame` and frees the slot.
    ///
    /// Panics if the slot is not in use; swapping in a free slot means the
    /// page table and the swap bitmap disagree.
    pub fn swap_in(&self, slot: usize, frame: &mut [u8]) {
        debug_assert_eq!(frame.len(), PAGE_SIZE);
        assert!(self.used.lock().test(slot), "swap-in of a free slot");
        for (i, sector) in frame.chunks_mut(BLOCK_SECTOR_SIZE).enumerate() {
            self.device
                .read((slot * PAGE_SECTORS + i) as BlockSector, sector);
        }
        self.used.lock().set(slot, false);
        trace!("swapped in one page from slot {slot}");
    }

    /// Frees `slot` without reading it back. Used when a swapped-out page is
    /// destroyed before it is ever faulted in again.
    pub fn release(&self, slot: usize) {
        self.used.lock().set(slot, false);
    }

    #[cfg(test)]
    pub(crate) fn used_slots(&self) -> usize {
        self.used.lock().count_set()
    }
}

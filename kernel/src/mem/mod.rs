//! The virtual-memory core: the global frame table, the swap space, and the
//! per-process supplemental page tables that drive page-fault resolution.

pub mod address_space;
pub mod error;
pub mod frame_allocator;
pub mod page;

use crate::dev::block::BlockOp;
use crate::mem::frame_allocator::FrameTable;
use crate::swapping::SwapSpace;
use crate::sync::Mutex;
use alloc::boxed::Box;
use core::ptr::NonNull;
use log::info;

/// The raw physical-page pool underneath the frame table.
///
/// Hands out single page-sized, page-aligned regions of physical memory and
/// takes them back. Exhaustion is normal; the frame table responds to it by
/// evicting.
pub trait PagePool: Send + Sync {
    fn get_page(&self) -> Option<NonNull<u8>>;

    fn free_page(&self, base: NonNull<u8>);
}

/// Process-wide virtual-memory state, created once at kernel start and never
/// torn down during normal operation. Every
/// [`AddressSpace`](address_space::AddressSpace) holds a handle to one of
/// these.
pub struct Vm {
    pub(crate) pool: Box<dyn PagePool>,
    pub(crate) frames: FrameTable,
    pub(crate) swap: SwapSpace,
    /// Serializes every backing-file read system-wide.
    pub(crate) fs_lock: Mutex<()>,
}

impl Vm {
    /// Panics if `swap_device` is absent or unusable; swap is checked once,
    /// here, and is required for eviction to work at all.
    pub fn new(pool: Box<dyn PagePool>, swap_device: Option<Box<dyn BlockOp>>) -> Self {
        let swap = SwapSpace::new(swap_device);
        info!("vm: swap ready with {} slots", swap.slots());
        Self {
            pool,
            frames: FrameTable::new(),
            swap,
            fs_lock: Mutex::new(()),
        }
    }

    /// Number of physical frames currently lent out to loaded pages.
    pub fn loaded_frames(&self) -> usize {
        self.frames.len()
    }
}

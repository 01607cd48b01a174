//! Per-page descriptors: how a virtual page is backed while it is not in
//! physical memory, and which frame holds it while it is.

use crate::fs::FileOps;
use crate::mem::frame_allocator::FrameId;
use crate::sync::Mutex;
use alloc::sync::Arc;
use marrowos_shared::mem::is_page_aligned;

/// Where a page's contents live when the page is not loaded.
pub enum Backing {
    /// A fresh page, all zeros on first touch. Also what `allocate` leaves
    /// behind until `allocate_file` fills in an extent.
    Zero,
    /// An extent of a file: `read_bytes` starting at `offset`, followed by
    /// `zero_bytes` of zero fill. The two always sum to one page.
    File {
        file: Arc<dyn FileOps>,
        offset: u64,
        read_bytes: usize,
        zero_bytes: usize,
    },
    /// A swap slot written by eviction. The slot index is only meaningful
    /// while the page is not loaded; swap-in frees it.
    Swap { slot: usize },
}

/// Mutable page state, guarded by [`PageCell::state`].
pub struct Page {
    pub backing: Backing,
    pub frame: Option<FrameId>,
}

impl Page {
    /// A page is loaded exactly when a frame holds it.
    pub fn is_loaded(&self) -> bool {
        self.frame.is_some()
    }
}

/// One virtual page of one process's address space, shared between that
/// process's supplemental page table and the global frame table.
pub struct PageCell {
    addr: usize,
    writable: bool,
    state: Mutex<Page>,
}

impl PageCell {
    pub(crate) fn new(addr: usize, writable: bool, backing: Backing) -> Arc<Self> {
        debug_assert!(is_page_aligned(addr));
        Arc::new(Self {
            addr,
            writable,
            state: Mutex::new(Page {
                backing,
                frame: None,
            }),
        })
    }

    /// Page-aligned virtual address, the page's key within its owner's
    /// supplemental page table.
    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn state(&self) -> &Mutex<Page> {
        &self.state
    }
}

//! The global frame table: one entry per physical page lent to a loaded
//! page, plus the second-chance (clock) eviction policy that reclaims a
//! frame when the raw pool runs dry.

use crate::mem::page::{Backing, PageCell};
use crate::mem::PagePool;
use crate::paging::MappingOps;
use crate::swapping::SwapSpace;
use crate::sync::Mutex;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitbybit::bitfield;
use core::ptr::NonNull;
use log::trace;
use marrowos_shared::mem::PAGE_SIZE;

/// Stable key into the frame arena. Pages hold one of these while loaded,
/// never a direct reference to the entry.
pub type FrameId = usize;

// `pinned` is set while a fault is resolving into the frame; the clock scan
// skips pinned frames so a page cannot be evicted mid-fault.
#[bitfield(u8, default = 0)]
struct FrameFlags {
    #[bit(0, rw)]
    pinned: bool,
}

struct FrameEntry {
    /// Physical base address of the frame.
    base: NonNull<u8>,
    /// The page currently occupying the frame.
    page: Arc<PageCell>,
    /// Hardware mapping layer of the owning process.
    mapping: Arc<dyn MappingOps>,
    flags: FrameFlags,
}

// SAFETY: `base` is an exclusively owned physical page; it is only ever
// dereferenced under the table lock or while the entry is pinned.
unsafe impl Send for FrameEntry {}

struct FrameTableInner {
    /// Arena of entries; freed indices are reissued through `free_ids`.
    entries: Vec<Option<FrameEntry>>,
    free_ids: Vec<FrameId>,
    /// Clock hand, a fixed wrap-around position shared across all processes.
    hand: usize,
    live: usize,
}

pub struct FrameTable {
    inner: Mutex<FrameTableInner>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FrameTableInner {
                entries: Vec::new(),
                free_ids: Vec::new(),
                hand: 0,
                live: 0,
            }),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Obtains a physical page for `page`, evicting until one is available.
    ///
    /// Never fails the caller: either the pool yields a page, possibly after
    /// eviction, or the kernel panics because there is no physical memory at
    /// all. The returned frame is pinned; the caller unpins it once the
    /// hardware mapping is installed.
    pub fn allocate(
        &self,
        page: Arc<PageCell>,
        mapping: Arc<dyn MappingOps>,
        pool: &dyn PagePool,
        swap: &SwapSpace,
    ) -> FrameId {
        loop {
            if let Some(base) = pool.get_page() {
                return self.register(base, page, mapping);
            }
            let reclaimed = self.evict(swap);
            // Freed outside the table lock, then raced for like any other
            // page; losing the race just means another trip around the loop.
            pool.free_page(reclaimed);
        }
    }

    fn register(&self, base: NonNull<u8>, page: Arc<PageCell>, mapping: Arc<dyn MappingOps>) -> FrameId {
        let mut inner = self.inner.lock();
        let entry = FrameEntry {
            base,
            page,
            mapping,
            flags: FrameFlags::DEFAULT.with_pinned(true),
        };
        let id = match inner.free_ids.pop() {
            Some(id) => {
                inner.entries[id] = Some(entry);
                id
            }
            None => {
                inner.entries.push(Some(entry));
                inner.entries.len() - 1
            }
        };
        inner.live += 1;
        id
    }

    /// Physical base address of frame `id`, which must be live.
    pub fn base(&self, id: FrameId) -> NonNull<u8> {
        self.inner.lock().entries[id]
            .as_ref()
            .expect("base() on a dead frame id")
            .base
    }

    /// Makes frame `id` eligible for eviction again.
    pub fn unpin(&self, id: FrameId) {
        if let Some(Some(entry)) = self.inner.lock().entries.get_mut(id) {
            entry.flags = entry.flags.with_pinned(false);
        }
    }

    /// Releases frame `id` if it still belongs to `page`: clears the
    /// hardware mapping, drops the entry, and hands the physical page back
    /// to `pool`. A stale or repeated free is a no-op.
    pub fn free(&self, id: FrameId, page: &PageCell, pool: &dyn PagePool) {
        let mut inner = self.inner.lock();
        let matches = match inner.entries.get(id) {
            Some(Some(entry)) => core::ptr::eq(Arc::as_ptr(&entry.page), page),
            _ => false,
        };
        if !matches {
            return;
        }
        let Some(entry) = inner.entries[id].take() else {
            return;
        };
        inner.free_ids.push(id);
        inner.live -= 1;
        entry.mapping.clear(entry.page.addr());
        drop(inner);
        pool.free_page(entry.base);
    }

    /// Second-chance scan over the arena: an accessed frame gets its bit
    /// cleared and one more epoch; the first unaccessed, unpinned frame
    /// whose page is not busy elsewhere is the victim. The victim is written
    /// to swap, its page flipped to [`Backing::Swap`] and unloaded, its
    /// mapping cleared, and its physical page returned to the caller.
    ///
    /// Each full pass either yields a victim or clears at least one
    /// accessed bit, so the scan is bounded; running out of candidates means
    /// every frame is pinned, which is fatal.
    fn evict(&self, swap: &SwapSpace) -> NonNull<u8> {
        let mut inner = self.inner.lock();
        assert!(inner.live > 0, "out of physical memory with nothing to evict");
        let len = inner.entries.len();
        let mut steps = 0;
        while steps < 3 * len {
            let idx = inner.hand;
            inner.hand = (idx + 1) % len;
            steps += 1;

            let Some(entry) = inner.entries[idx].as_mut() else {
                continue;
            };
            if entry.flags.pinned() {
                continue;
            }
            let page = entry.page.clone();
            let vaddr = page.addr();
            if entry.mapping.is_accessed(vaddr) {
                entry.mapping.set_accessed(vaddr, false);
                continue;
            }
            // A page whose lock is held is mid-operation somewhere else;
            // treat that like an accessed bit and move on.
            let Some(mut state) = page.state().try_lock() else {
                continue;
            };
            let base = entry.base;
            let mapping = entry.mapping.clone();
            trace!("evicting frame {idx} holding {vaddr:#x}");

            // SAFETY: the entry owns this frame and nothing else touches it
            // while the table lock is held.
            let contents = unsafe { core::slice::from_raw_parts(base.as_ptr(), PAGE_SIZE) };
            let slot = swap.swap_out(contents);
            state.backing = Backing::Swap { slot };
            state.frame = None;
            drop(state);
            mapping.clear(vaddr);

            inner.entries[idx] = None;
            inner.free_ids.push(idx);
            inner.live -= 1;
            return base;
        }
        panic!("eviction made no progress over {steps} candidates");
    }
}

impl Default for FrameTable {
    fn default() -> Self {
        Self::new()
    }
}

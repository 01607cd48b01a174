//! The hardware address-translation layer, consumed but never implemented
//! here. One instance exists per process: its page directory.

use core::ptr::NonNull;

pub trait MappingOps: Send + Sync {
    /// Maps `vaddr` to the physical frame at `base`. Returns false when the
    /// mapping cannot be created, e.g. hardware page-table exhaustion.
    #[must_use]
    fn install(&self, vaddr: usize, base: NonNull<u8>, writable: bool) -> bool;

    /// Removes the mapping for `vaddr`, if any.
    fn clear(&self, vaddr: usize);

    /// Hardware accessed bit for `vaddr`. False when `vaddr` is unmapped.
    fn is_accessed(&self, vaddr: usize) -> bool;

    fn set_accessed(&self, vaddr: usize, accessed: bool);

    /// The frame `vaddr` currently translates to, if any.
    fn mapped(&self, vaddr: usize) -> Option<NonNull<u8>>;
}

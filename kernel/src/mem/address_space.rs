//! Per-process supplemental page table and the page-fault resolution
//! protocol built on it.
//!
//! The table records how every virtual page of one process is backed: a file
//! extent, a swap slot, or nothing yet (zero fill). Faults consult it to
//! decide where a page's contents come from; eviction rewrites it when a
//! page's contents move out to swap.

use crate::fs::FileOps;
use crate::mem::error::VmError;
use crate::mem::page::{Backing, PageCell};
use crate::mem::Vm;
use crate::paging::MappingOps;
use crate::sync::Mutex;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use log::{debug, warn};
use marrowos_shared::mem::{page_round_down, PAGE_SIZE, STACK_MAX, STACK_SLACK};

struct AddressSpaceInner {
    /// Keyed on page-aligned virtual address. A B-tree rather than a hash:
    /// lookups are by exact key, teardown walks in address order.
    pages: BTreeMap<usize, Arc<PageCell>>,
    /// Cumulative stack growth, capped at `STACK_MAX`.
    stack_bytes: usize,
}

/// One process's supplemental page table.
///
/// Normally single-writer (a process faults on its own address space), but
/// the inner lock also admits the owner's kernel-side helpers, e.g. stack
/// growth from a system call.
pub struct AddressSpace {
    vm: Arc<Vm>,
    mapping: Arc<dyn MappingOps>,
    inner: Mutex<AddressSpaceInner>,
}

impl AddressSpace {
    pub fn new(vm: Arc<Vm>, mapping: Arc<dyn MappingOps>) -> Self {
        Self {
            vm,
            mapping,
            inner: Mutex::new(AddressSpaceInner {
                pages: BTreeMap::new(),
                stack_bytes: 0,
            }),
        }
    }

    /// Adds an entry for `addr` with no backing yet; the first fault
    /// zero-fills it. Fails if `addr` already has an entry.
    pub fn allocate(&self, addr: usize, writable: bool) -> Result<Arc<PageCell>, VmError> {
        self.insert(addr, writable, Backing::Zero)
    }

    /// Adds a file-backed entry for `addr`: `read_bytes` from `file` at
    /// `offset`, then `zero_bytes` of zero fill. The two must sum to one
    /// page. Fails if `addr` already has an entry, leaving the existing
    /// entry untouched.
    pub fn allocate_file(
        &self,
        addr: usize,
        file: Arc<dyn FileOps>,
        offset: u64,
        read_bytes: usize,
        zero_bytes: usize,
        writable: bool,
    ) -> Result<(), VmError> {
        assert_eq!(read_bytes + zero_bytes, PAGE_SIZE);
        self.insert(
            addr,
            writable,
            Backing::File {
                file,
                offset,
                read_bytes,
                zero_bytes,
            },
        )?;
        Ok(())
    }

    fn insert(&self, addr: usize, writable: bool, backing: Backing) -> Result<Arc<PageCell>, VmError> {
        let addr = page_round_down(addr);
        let mut inner = self.inner.lock();
        if inner.pages.contains_key(&addr) {
            return Err(VmError::AlreadyMapped);
        }
        let page = PageCell::new(addr, writable, backing);
        inner.pages.insert(addr, page.clone());
        Ok(page)
    }

    /// Returns the page containing `addr`, or `None` if no such page exists.
    pub fn for_address(&self, addr: usize) -> Option<Arc<PageCell>> {
        self.inner.lock().pages.get(&page_round_down(addr)).cloned()
    }

    /// Removes the entry for the page containing `addr`, releasing its frame
    /// or swap slot. Silently does nothing when no entry exists; teardown
    /// paths must not have to care.
    pub fn deallocate(&self, addr: usize) {
        let removed = self.inner.lock().pages.remove(&page_round_down(addr));
        if let Some(page) = removed {
            self.release(&page);
        }
    }

    /// Drops whatever storage still backs `page`: its frame if loaded, its
    /// swap slot if swapped out.
    fn release(&self, page: &Arc<PageCell>) {
        let state = page.state().lock();
        match (state.frame, &state.backing) {
            (Some(id), _) => {
                self.vm.frames.free(id, page, &*self.vm.pool);
            }
            (None, Backing::Swap { slot }) => {
                self.vm.swap.release(*slot);
            }
            _ => {}
        }
        drop(state);
        if self.mapping.mapped(page.addr()).is_some() {
            self.mapping.clear(page.addr());
        }
    }

    /// Grows the stack to cover `addr`.
    ///
    /// Only valid within `STACK_SLACK` bytes below `stack_pointer` and while
    /// cumulative stack size stays under `STACK_MAX`. The new page is
    /// framed, zeroed, and mapped immediately rather than on the next fault.
    pub fn grow_stack(&self, addr: usize, stack_pointer: usize) -> Result<(), VmError> {
        if addr < stack_pointer.saturating_sub(STACK_SLACK) {
            debug!("refusing stack growth: {addr:#x} too far below sp {stack_pointer:#x}");
            return Err(VmError::LimitExceeded);
        }
        let addr = page_round_down(addr);
        // Check and reserve the budget in one critical section; two growers
        // racing past the check could otherwise overshoot the limit. The
        // failure paths below hand the reservation back.
        let page = {
            let mut inner = self.inner.lock();
            if inner.stack_bytes + PAGE_SIZE > STACK_MAX {
                debug!("refusing stack growth: {STACK_MAX:#x} byte limit reached");
                return Err(VmError::LimitExceeded);
            }
            if inner.pages.contains_key(&addr) {
                return Err(VmError::AlreadyMapped);
            }
            let page = PageCell::new(addr, true, Backing::Zero);
            inner.pages.insert(addr, page.clone());
            inner.stack_bytes += PAGE_SIZE;
            page
        };
        let id = self
            .vm
            .frames
            .allocate(page.clone(), self.mapping.clone(), &*self.vm.pool, &self.vm.swap);
        let base = self.vm.frames.base(id);
        // SAFETY: the frame is pinned and exclusively ours. Zero it before
        // it becomes visible; the previous owner's data must not leak.
        unsafe {
            core::ptr::write_bytes(base.as_ptr(), 0, PAGE_SIZE);
        }
        if !self.mapping.install(addr, base, true) {
            self.vm.frames.free(id, &page, &*self.vm.pool);
            let mut inner = self.inner.lock();
            inner.pages.remove(&addr);
            inner.stack_bytes -= PAGE_SIZE;
            return Err(VmError::InstallFailed);
        }
        page.state().lock().frame = Some(id);
        self.vm.frames.unpin(id);
        Ok(())
    }

    /// Resolves a page fault at `fault_addr`.
    ///
    /// On success the page is loaded and mapped. On failure the address
    /// space is left consistent and re-faultable; deciding the process's
    /// fate is the fault dispatcher's job, not ours.
    pub fn resolve(&self, fault_addr: usize) -> Result<(), VmError> {
        let page = self.for_address(fault_addr).ok_or(VmError::Unmapped)?;
        let mut state = page.state().lock();
        if state.is_loaded() {
            // Another of the owner's kernel-side helpers got here first.
            return Ok(());
        }

        let id = self
            .vm
            .frames
            .allocate(page.clone(), self.mapping.clone(), &*self.vm.pool, &self.vm.swap);
        let base = self.vm.frames.base(id);
        // SAFETY: freshly allocated, pinned frame; exclusively ours until
        // the install below publishes it.
        let frame = unsafe { core::slice::from_raw_parts_mut(base.as_ptr(), PAGE_SIZE) };

        // Owned copy of the backing source, so the failure paths below can
        // drop the state lock without fighting the borrow on it.
        enum Source {
            Zero,
            File(Arc<dyn FileOps>, u64, usize),
            Swap(usize),
        }
        let source = match &state.backing {
            Backing::Zero => Source::Zero,
            Backing::File {
                file,
                offset,
                read_bytes,
                ..
            } => Source::File(file.clone(), *offset, *read_bytes),
            Backing::Swap { slot } => Source::Swap(*slot),
        };

        match source {
            Source::Zero => frame.fill(0),
            Source::File(file, offset, read_bytes) => {
                let got = {
                    let _fs = self.vm.fs_lock.lock();
                    file.read_at(&mut frame[..read_bytes], offset)
                };
                if got != read_bytes {
                    warn!(
                        "faulting in {:#x}: read {got} of {read_bytes} bytes",
                        page.addr()
                    );
                    drop(state);
                    self.vm.frames.free(id, &page, &*self.vm.pool);
                    return Err(VmError::ReadFailed);
                }
                frame[read_bytes..].fill(0);
            }
            Source::Swap(slot) => {
                // This frees the slot, so the entry must stop naming it
                // before anything can fail: a teardown after a failed
                // install would otherwise release a slot that has moved on
                // to another page. The copy itself is gone either way, which
                // the design accepts because install failure is a fatal
                // resource condition, not a retryable one.
                self.vm.swap.swap_in(slot, frame);
                state.backing = Backing::Zero;
            }
        }

        if !self.mapping.install(page.addr(), base, page.writable()) {
            drop(state);
            self.vm.frames.free(id, &page, &*self.vm.pool);
            return Err(VmError::InstallFailed);
        }
        state.frame = Some(id);
        drop(state);
        self.vm.frames.unpin(id);
        Ok(())
    }

    /// Tears down every entry, releasing loaded frames and swap slots.
    /// Invoked once from the process-exit path; `Drop` runs it again
    /// harmlessly.
    pub fn destroy(&self) {
        let pages: Vec<Arc<PageCell>> = {
            let mut inner = self.inner.lock();
            inner.stack_bytes = 0;
            core::mem::take(&mut inner.pages).into_values().collect()
        };
        for page in &pages {
            self.release(page);
        }
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        self.destroy();
    }
}

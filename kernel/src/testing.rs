//! Mock collaborators for unit tests: a fixed-size physical pool, a
//! table-backed hardware mapping layer, a RAM-backed block device, and an
//! in-memory backing file.

use crate::dev::block::{BlockOp, BlockSector, BLOCK_SECTOR_SIZE};
use crate::fs::FileOps;
use crate::mem::{PagePool, Vm};
use crate::paging::MappingOps;
use crate::swapping::PAGE_SECTORS;
use crate::sync::Mutex;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, Ordering};
use marrowos_shared::mem::PAGE_SIZE;

/// A pool of `frames` heap-allocated pages standing in for physical memory.
pub struct TestPool {
    free: Mutex<Vec<NonNull<u8>>>,
    capacity: usize,
}

// SAFETY: the pointers are to exclusively owned heap pages; the free list is
// behind a lock.
unsafe impl Send for TestPool {}
unsafe impl Sync for TestPool {}

impl TestPool {
    pub fn new(frames: usize) -> Self {
        let mut free = Vec::with_capacity(frames);
        for _ in 0..frames {
            let raw = Box::into_raw(Box::new([0u8; PAGE_SIZE])).cast::<u8>();
            free.push(NonNull::new(raw).expect("Box::into_raw is never null"));
        }
        Self {
            free: Mutex::new(free),
            capacity: frames,
        }
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl PagePool for TestPool {
    fn get_page(&self) -> Option<NonNull<u8>> {
        self.free.lock().pop()
    }

    fn free_page(&self, base: NonNull<u8>) {
        let mut free = self.free.lock();
        assert!(free.len() < self.capacity, "pool overflow: double free");
        assert!(!free.contains(&base), "double free of {base:p}");
        free.push(base);
    }
}

impl Drop for TestPool {
    fn drop(&mut self) {
        for base in self.free.get_mut().drain(..) {
            // SAFETY: allocated in `new` via Box and not handed out.
            drop(unsafe { Box::from_raw(base.as_ptr().cast::<[u8; PAGE_SIZE]>()) });
        }
    }
}

/// Shareable handle to a [`TestPool`], so tests can watch the pool the [`Vm`]
/// owns a boxed copy of.
pub struct PoolHandle(pub Arc<TestPool>);

impl PagePool for PoolHandle {
    fn get_page(&self) -> Option<NonNull<u8>> {
        self.0.get_page()
    }

    fn free_page(&self, base: NonNull<u8>) {
        self.0.free_page(base)
    }
}

#[derive(Clone, Copy)]
struct Translation {
    base: NonNull<u8>,
    writable: bool,
    accessed: bool,
}

/// Hardware mapping layer backed by a map: one per mock "process".
pub struct TestMapping {
    table: Mutex<BTreeMap<usize, Translation>>,
    fail_installs: AtomicBool,
}

// SAFETY: the translations point into pool pages owned elsewhere; the table
// itself is behind a lock.
unsafe impl Send for TestMapping {}
unsafe impl Sync for TestMapping {}

impl TestMapping {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(BTreeMap::new()),
            fail_installs: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent install fail, as exhausted hardware page
    /// tables would.
    pub fn fail_installs(&self, fail: bool) {
        self.fail_installs.store(fail, Ordering::Relaxed);
    }

    /// Copies out the frame contents `vaddr` currently maps to.
    pub fn read_page(&self, vaddr: usize) -> Option<Vec<u8>> {
        let base = self.mapped(vaddr)?;
        // SAFETY: the translation points at a live, page-sized frame.
        Some(unsafe { core::slice::from_raw_parts(base.as_ptr(), PAGE_SIZE) }.to_vec())
    }

    /// Fills the frame `vaddr` maps to with `byte`, like a store through the
    /// mapping would.
    pub fn fill_page(&self, vaddr: usize, byte: u8) {
        let base = self.mapped(vaddr).expect("fill_page of unmapped address");
        // SAFETY: the translation points at a live, page-sized frame.
        unsafe { core::ptr::write_bytes(base.as_ptr(), byte, PAGE_SIZE) };
    }

    pub fn writable(&self, vaddr: usize) -> Option<bool> {
        self.table.lock().get(&vaddr).map(|t| t.writable)
    }
}

impl MappingOps for TestMapping {
    fn install(&self, vaddr: usize, base: NonNull<u8>, writable: bool) -> bool {
        if self.fail_installs.load(Ordering::Relaxed) {
            return false;
        }
        self.table.lock().insert(
            vaddr,
            Translation {
                base,
                writable,
                accessed: false,
            },
        );
        true
    }

    fn clear(&self, vaddr: usize) {
        self.table.lock().remove(&vaddr);
    }

    fn is_accessed(&self, vaddr: usize) -> bool {
        self.table
            .lock()
            .get(&vaddr)
            .is_some_and(|t| t.accessed)
    }

    fn set_accessed(&self, vaddr: usize, accessed: bool) {
        if let Some(t) = self.table.lock().get_mut(&vaddr) {
            t.accessed = accessed;
        }
    }

    fn mapped(&self, vaddr: usize) -> Option<NonNull<u8>> {
        self.table.lock().get(&vaddr).map(|t| t.base)
    }
}

/// A block device held entirely in memory.
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
}

impl RamDisk {
    pub fn new(sectors: usize) -> Self {
        Self {
            data: Mutex::new(alloc::vec![0; sectors * BLOCK_SECTOR_SIZE]),
        }
    }
}

impl BlockOp for RamDisk {
    fn read(&self, sector: BlockSector, buf: &mut [u8]) {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        buf.copy_from_slice(&self.data.lock()[start..start + BLOCK_SECTOR_SIZE]);
    }

    fn write(&self, sector: BlockSector, buf: &[u8]) {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        self.data.lock()[start..start + BLOCK_SECTOR_SIZE].copy_from_slice(buf);
    }

    fn size(&self) -> BlockSector {
        (self.data.lock().len() / BLOCK_SECTOR_SIZE) as BlockSector
    }
}

/// An in-memory backing file. Reads past the end come up short, which is how
/// tests provoke `ReadFailed`.
pub struct MemFile {
    data: Vec<u8>,
}

impl MemFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}

impl FileOps for MemFile {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> usize {
        let offset = offset as usize;
        if offset >= self.data.len() {
            return 0;
        }
        let len = buf.len().min(self.data.len() - offset);
        buf[..len].copy_from_slice(&self.data[offset..offset + len]);
        len
    }
}

/// A [`Vm`] over `frames` mock physical pages and a RAM swap device of
/// `slots` slots, plus a handle to watch the pool.
pub fn test_vm(frames: usize, slots: usize) -> (Arc<Vm>, PoolHandle) {
    let pool = Arc::new(TestPool::new(frames));
    let device = RamDisk::new(slots * PAGE_SECTORS);
    let vm = Vm::new(Box::new(PoolHandle(pool.clone())), Some(Box::new(device)));
    (Arc::new(vm), PoolHandle(pool))
}

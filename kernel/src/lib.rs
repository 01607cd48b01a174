//! The MarrowOS virtual-memory subsystem.
//!
//! Gives each process an address space larger than physical memory by paging
//! data in from backing files or swap on demand, and evicting frames under
//! memory pressure. The hardware translation layer, file system, raw
//! physical-page pool, and block-device driver are consumed through the
//! traits in [`paging`], [`fs`], [`mem`], and [`dev`]; the kernel proper
//! supplies the real implementations, tests supply mocks.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod dev;
pub mod fs;
pub mod mem;
pub mod paging;
pub mod swapping;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

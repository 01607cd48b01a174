//! What the VM layer needs from the file system: positioned reads of the
//! files that back executable pages. Every call is serialized through the
//! global file-system lock owned by [`crate::mem::Vm`].

pub trait FileOps: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at byte `offset`, returning
    /// the number of bytes actually read. A short count means the extent
    /// runs past the end of the file.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> usize;
}

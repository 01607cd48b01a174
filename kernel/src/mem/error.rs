use core::error::Error;
use core::fmt::{Debug, Display, Formatter};

/// Error type for virtual-memory operations.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The faulting address has no supplemental-page-table entry
    Unmapped,
    /// The virtual address already has an entry
    AlreadyMapped,
    /// Stack growth outside the slack window or past the stack size limit
    LimitExceeded,
    /// A backing-file read came up short
    ReadFailed,
    /// The hardware mapping layer rejected the mapping
    InstallFailed,
}

impl Debug for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            VmError::Unmapped => write!(f, "Unmapped"),
            VmError::AlreadyMapped => write!(f, "AlreadyMapped"),
            VmError::LimitExceeded => write!(f, "LimitExceeded"),
            VmError::ReadFailed => write!(f, "ReadFailed"),
            VmError::InstallFailed => write!(f, "InstallFailed"),
        }
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            VmError::Unmapped => write!(f, "address is not mapped"),
            VmError::AlreadyMapped => write!(f, "address is already mapped"),
            VmError::LimitExceeded => write!(f, "stack growth limit exceeded"),
            VmError::ReadFailed => write!(f, "short read from backing file"),
            VmError::InstallFailed => write!(f, "hardware mapping install failed"),
        }
    }
}

impl Error for VmError {}

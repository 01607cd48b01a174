use crate::sizes::{KB, MB};

// Page size is 4KB. This is a property of x86 processors.
pub const PAGE_SIZE: usize = 4 * KB;

/// Maximum size of a process stack, in bytes.
pub const STACK_MAX: usize = MB;

/// How far below the stack pointer a faulting access may land and still be
/// treated as stack growth. 32 bytes covers the furthest-below-%esp write
/// the architecture generates (PUSHA).
pub const STACK_SLACK: usize = 32;

/// Rounds `addr` down to the start of its page.
pub const fn page_round_down(addr: usize) -> usize {
    addr & !(PAGE_SIZE - 1)
}

/// Offset of `addr` within its page.
pub const fn page_offset(addr: usize) -> usize {
    addr & (PAGE_SIZE - 1)
}

pub const fn is_page_aligned(addr: usize) -> bool {
    page_offset(addr) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(page_round_down(0), 0);
        assert_eq!(page_round_down(PAGE_SIZE - 1), 0);
        assert_eq!(page_round_down(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(page_round_down(PAGE_SIZE + 17), PAGE_SIZE);
        assert_eq!(page_offset(3 * PAGE_SIZE + 17), 17);
        assert!(is_page_aligned(2 * PAGE_SIZE));
        assert!(!is_page_aligned(2 * PAGE_SIZE + 1));
    }
}

//! A fixed-size set of bits stored in machine words.
//!
//! Sized once at creation; the VM layer uses one of these to track which
//! swap slots are in use.

use alloc::boxed::Box;
use alloc::vec;

const WORD_BITS: usize = usize::BITS as usize;

pub struct Bitmap {
    words: Box<[usize]>,
    len: usize,
}

impl Bitmap {
    /// Creates a bitmap of `len` bits, all clear.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(WORD_BITS)].into_boxed_slice(),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether bit `idx` is set.
    pub fn test(&self, idx: usize) -> bool {
        assert!(idx < self.len, "bit index {idx} out of bounds");
        self.words[idx / WORD_BITS] >> (idx % WORD_BITS) & 1 != 0
    }

    pub fn set(&mut self, idx: usize, value: bool) {
        assert!(idx < self.len, "bit index {idx} out of bounds");
        let mask = 1 << (idx % WORD_BITS);
        if value {
            self.words[idx / WORD_BITS] |= mask;
        } else {
            self.words[idx / WORD_BITS] &= !mask;
        }
    }

    /// Finds the lowest clear bit, sets it, and returns its index.
    pub fn scan_and_set(&mut self) -> Option<usize> {
        for (word_idx, word) in self.words.iter_mut().enumerate() {
            if *word == !0 {
                continue;
            }
            let bit = word.trailing_ones() as usize;
            let idx = word_idx * WORD_BITS + bit;
            if idx >= self.len {
                break;
            }
            *word |= 1 << bit;
            return Some(idx);
        }
        None
    }

    /// Number of set bits.
    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

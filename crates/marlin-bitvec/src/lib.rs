//! Bit vectors for the marlin search kernel.
//!
//! A [`BitVector`] covers doc ids `[0, docid_limit)` with little-endian
//! 64-bit machine words. The word storage is padded to a whole number of
//! 8-word batches so the fused multi-bit-vector iterator can always read
//! an aligned 64-byte batch without bounds checks failing near the end.
//!
//! Bits outside `[start, size)` are kept clear by every mutating
//! operation; `not_self` re-establishes that invariant after inverting.

pub mod accel;

use marlin_types::DocId;

/// Number of bits per storage word.
pub const WORD_LEN: u32 = 64;

/// Storage word index covering `doc_id`.
#[must_use]
pub fn word_num(doc_id: DocId) -> usize {
    (doc_id / WORD_LEN) as usize
}

/// Single-bit mask for `doc_id` within its word.
#[must_use]
pub fn word_mask(doc_id: DocId) -> u64 {
    1u64 << (doc_id % WORD_LEN)
}

/// Mask selecting `doc_id` and every higher bit of its word.
#[must_use]
pub fn check_mask(doc_id: DocId) -> u64 {
    !0u64 << (doc_id % WORD_LEN)
}

/// A document-id bit set over `[start, size)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVector {
    words: Vec<u64>,
    start: DocId,
    size: DocId,
}

impl BitVector {
    /// Create an empty bit vector covering `[start, size)`.
    #[must_use]
    pub fn new(start: DocId, size: DocId) -> Self {
        let size = size.max(start);
        let num_words = word_num(size.saturating_add(WORD_LEN - 1));
        let padded = num_words.div_ceil(accel::WORDS_PER_BATCH) * accel::WORDS_PER_BATCH;
        Self {
            words: vec![0; padded],
            start,
            size,
        }
    }

    /// Create a bit vector with the given bits set.
    #[must_use]
    pub fn from_bits(start: DocId, size: DocId, bits: &[DocId]) -> Self {
        let mut bv = Self::new(start, size);
        for &bit in bits {
            bv.set_bit(bit);
        }
        bv
    }

    #[must_use]
    pub fn start(&self) -> DocId {
        self.start
    }

    /// Exclusive upper bound on valid doc ids.
    #[must_use]
    pub fn size(&self) -> DocId {
        self.size
    }

    /// Raw word storage, padded to whole 8-word batches.
    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[must_use]
    pub fn test_bit(&self, doc_id: DocId) -> bool {
        if doc_id < self.start || doc_id >= self.size {
            return false;
        }
        (self.words[word_num(doc_id)] & word_mask(doc_id)) != 0
    }

    pub fn set_bit(&mut self, doc_id: DocId) {
        if doc_id >= self.start && doc_id < self.size {
            self.words[word_num(doc_id)] |= word_mask(doc_id);
        }
    }

    pub fn clear_bit(&mut self, doc_id: DocId) {
        if doc_id < self.size {
            self.words[word_num(doc_id)] &= !word_mask(doc_id);
        }
    }

    /// Copy of an external word array as a bit vector over
    /// `[start, size)`, optionally inverted. Words the source does not
    /// cover read as zero before inversion.
    #[must_use]
    pub fn from_view(start: DocId, size: DocId, words: &[u64], inverted: bool) -> Self {
        let mut bv = Self::new(start, size);
        for (i, word) in bv.words.iter_mut().enumerate() {
            let src = words.get(i).copied().unwrap_or(0);
            *word = if inverted { !src } else { src };
        }
        bv.clear_outside_range();
        bv
    }

    /// The first set bit at or after `doc_id`, or `size` when none is
    /// left.
    #[must_use]
    pub fn next_true_bit(&self, doc_id: DocId) -> DocId {
        let from = doc_id.max(self.start);
        if from >= self.size {
            return self.size;
        }
        let mut idx = word_num(from);
        let mut word = self.words[idx] & check_mask(from);
        loop {
            if word != 0 {
                let found = (idx as u32) * WORD_LEN + word.trailing_zeros();
                return found.min(self.size);
            }
            idx += 1;
            if idx >= self.words.len() {
                return self.size;
            }
            word = self.words[idx];
        }
    }

    /// The first clear bit at or after `doc_id`, or `size` when every
    /// remaining bit is set.
    #[must_use]
    pub fn next_false_bit(&self, doc_id: DocId) -> DocId {
        if doc_id >= self.size {
            return self.size;
        }
        let mut idx = word_num(doc_id);
        let mut word = !self.words[idx] & check_mask(doc_id);
        loop {
            if word != 0 {
                let found = (idx as u32) * WORD_LEN + word.trailing_zeros();
                return found.min(self.size);
            }
            idx += 1;
            if idx >= self.words.len() {
                return self.size;
            }
            word = !self.words[idx];
        }
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_bits(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Intersect with `other`; bits `other` does not cover are cleared.
    pub fn and_with(&mut self, other: &Self) {
        let common = self.words.len().min(other.words.len());
        for i in 0..common {
            self.words[i] &= other.words[i];
        }
        for word in &mut self.words[common..] {
            *word = 0;
        }
        self.clear_outside_range();
    }

    /// Union with `other`.
    pub fn or_with(&mut self, other: &Self) {
        let common = self.words.len().min(other.words.len());
        for i in 0..common {
            self.words[i] |= other.words[i];
        }
        self.clear_outside_range();
    }

    /// Remove every bit set in `other`.
    pub fn and_not_with(&mut self, other: &Self) {
        let common = self.words.len().min(other.words.len());
        for i in 0..common {
            self.words[i] &= !other.words[i];
        }
    }

    /// Invert every bit inside `[start, size)`.
    pub fn not_self(&mut self) {
        for word in &mut self.words {
            *word = !*word;
        }
        self.clear_outside_range();
    }

    fn clear_outside_range(&mut self) {
        let first = word_num(self.start);
        for word in &mut self.words[..first] {
            *word = 0;
        }
        if self.start % WORD_LEN != 0 {
            self.words[first] &= check_mask(self.start);
        }
        let last = word_num(self.size);
        if last < self.words.len() {
            if self.size % WORD_LEN != 0 {
                self.words[last] &= !check_mask(self.size);
            }
            let from = if self.size % WORD_LEN == 0 { last } else { last + 1 };
            for word in &mut self.words[from..] {
                *word = 0;
            }
        }
    }
}

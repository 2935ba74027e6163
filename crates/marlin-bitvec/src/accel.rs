//! Word-batch kernels.
//!
//! The fused multi-bit-vector iterator combines its children in aligned
//! batches of 8 machine words (64 bytes). The loops below are written
//! over fixed-size arrays so the compiler can lower them to wide vector
//! instructions on targets that have them.

/// Words combined per batch.
pub const WORDS_PER_BATCH: usize = 8;

/// A read-only, possibly inverted view of a word array.
#[derive(Debug, Clone, Copy)]
pub struct WordView<'a> {
    words: &'a [u64],
    inverted: bool,
}

impl<'a> WordView<'a> {
    #[must_use]
    pub fn new(words: &'a [u64], inverted: bool) -> Self {
        Self { words, inverted }
    }

    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// The word at `idx`; words past the end read as all-zero before
    /// inversion.
    #[inline]
    #[must_use]
    pub fn word(&self, idx: usize) -> u64 {
        let word = self.words.get(idx).copied().unwrap_or(0);
        if self.inverted {
            !word
        } else {
            word
        }
    }
}

/// AND all sources into `dest`, reading the batch starting at word
/// index `base`.
#[inline]
pub fn and_batch<'a>(
    dest: &mut [u64; WORDS_PER_BATCH],
    base: usize,
    sources: impl IntoIterator<Item = WordView<'a>>,
) {
    dest.fill(!0);
    for src in sources {
        for (i, word) in dest.iter_mut().enumerate() {
            *word &= src.word(base + i);
        }
    }
}

/// OR all sources into `dest`, reading the batch starting at word index
/// `base`.
#[inline]
pub fn or_batch<'a>(
    dest: &mut [u64; WORDS_PER_BATCH],
    base: usize,
    sources: impl IntoIterator<Item = WordView<'a>>,
) {
    dest.fill(0);
    for src in sources {
        for (i, word) in dest.iter_mut().enumerate() {
            *word |= src.word(base + i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_batch_intersects_with_inversion() {
        let a = vec![0b1111u64; 8];
        let b = vec![0b1010u64; 8];
        let mut dest = [0u64; WORDS_PER_BATCH];
        and_batch(
            &mut dest,
            0,
            [WordView::new(&a, false), WordView::new(&b, false)],
        );
        assert!(dest.iter().all(|&w| w == 0b1010));
        and_batch(
            &mut dest,
            0,
            [WordView::new(&a, false), WordView::new(&b, true)],
        );
        assert!(dest.iter().all(|&w| w == 0b0101));
    }

    #[test]
    fn or_batch_reads_past_end_as_zero() {
        let short = vec![0xffu64; 4];
        let mut dest = [0u64; WORDS_PER_BATCH];
        or_batch(&mut dest, 0, [WordView::new(&short, false)]);
        assert_eq!(&dest[..4], &[0xff; 4]);
        assert_eq!(&dest[4..], &[0; 4]);
    }

    #[test]
    fn batches_are_offset_by_base() {
        let mut words = vec![0u64; 16];
        words[9] = 42;
        let mut dest = [0u64; WORDS_PER_BATCH];
        or_batch(&mut dest, 8, [WordView::new(&words, false)]);
        assert_eq!(dest[1], 42);
        assert_eq!(dest[0], 0);
    }
}

//! # Completion window geometry.
//!
//! A window of `N = B * W` positions is split into `B` buckets of `W` bits. Each bucket is
//! one inner `u64` word; the outer summary holds one bit per bucket, packed 64 to a word.
//!
//! ```text
//! offset = cycle - base
//! bucket = offset / W        ─► inner[bucket]
//! bit    = offset % W        ─► 1 << bit
//! bucket full                ─► outer[bucket / 64] |= 1 << (bucket % 64)
//! ```

use crate::error::ConfigError;

/// Size and bucket width of a completion window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowShape {
    size: u64,
    bucket_width: u32,
}

impl Default for WindowShape {
    /// 1024 positions in 32 buckets of 32 bits.
    fn default() -> Self {
        Self {
            size: 1024,
            bucket_width: 32,
        }
    }
}

impl WindowShape {
    /// Validates and builds a window shape.
    ///
    /// # Errors
    /// [`ConfigError::InvalidWindow`] when `size` is zero, `bucket_width` is outside
    /// `1..=64`, or `size` is not a multiple of `bucket_width`.
    ///
    /// # Example
    /// ```
    /// use cyclemotor::WindowShape;
    ///
    /// let shape = WindowShape::new(1024, 32).unwrap();
    /// assert_eq!(shape.buckets(), 32);
    /// assert!(WindowShape::new(1000, 32).is_err());
    /// ```
    pub fn new(size: u64, bucket_width: u32) -> Result<Self, ConfigError> {
        let reject = |reason| ConfigError::InvalidWindow {
            size,
            bucket_width,
            reason,
        };
        if size == 0 {
            return Err(reject("size must be at least 1"));
        }
        if bucket_width == 0 || bucket_width > 64 {
            return Err(reject("bucket width must be within 1..=64"));
        }
        if size % u64::from(bucket_width) != 0 {
            return Err(reject("size must be a multiple of bucket width"));
        }
        if usize::try_from(size / u64::from(bucket_width)).is_err() {
            return Err(reject("too many buckets for this platform"));
        }
        Ok(Self { size, bucket_width })
    }

    /// Positions per window (`N`).
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bits per bucket (`W`).
    #[inline]
    pub fn bucket_width(&self) -> u32 {
        self.bucket_width
    }

    /// Buckets per window (`B`).
    #[inline]
    pub fn buckets(&self) -> usize {
        (self.size / u64::from(self.bucket_width)) as usize
    }

    #[inline]
    pub(crate) fn outer_words(&self) -> usize {
        self.buckets().div_ceil(64)
    }

    #[inline]
    pub(crate) fn full_bucket(&self) -> u64 {
        low_bits(self.bucket_width)
    }

    /// Mask of the bucket bits that exist in outer word `word`.
    #[inline]
    pub(crate) fn full_outer(&self, word: usize) -> u64 {
        let remaining = self.buckets() - word * 64;
        low_bits(remaining.min(64) as u32)
    }

    /// Splits a window offset into `(bucket, bit)`.
    #[inline]
    pub(crate) fn locate(&self, offset: u64) -> (usize, u32) {
        let w = u64::from(self.bucket_width);
        ((offset / w) as usize, (offset % w) as u32)
    }

    /// Initial `(inner, outer)` words for a window tracking only the first `len` positions.
    ///
    /// Positions at or past `len` start out marked so a short tail window completes once
    /// its real positions do.
    pub(crate) fn initial_words(&self, len: u64) -> (Vec<u64>, Vec<u64>) {
        let len = len.min(self.size);
        let full = self.full_bucket();
        let mut inner = vec![0u64; self.buckets()];
        let mut outer = vec![0u64; self.outer_words()];

        let (first_bucket, first_bit) = self.locate(len);
        for (bucket, word) in inner.iter_mut().enumerate().skip(first_bucket) {
            *word = if bucket == first_bucket {
                full & !low_bits(first_bit)
            } else {
                full
            };
            if *word == full {
                outer[bucket / 64] |= 1 << (bucket % 64);
            }
        }
        (inner, outer)
    }

    /// Lowest unmarked offset given accessors for outer and inner words, or `size` when
    /// every position is marked.
    pub(crate) fn lowest_unset(
        &self,
        outer: impl Fn(usize) -> u64,
        inner: impl Fn(usize) -> u64,
    ) -> u64 {
        for word in 0..self.outer_words() {
            let open = !outer(word) & self.full_outer(word);
            if open == 0 {
                continue;
            }
            let bucket = word * 64 + open.trailing_zeros() as usize;
            let gaps = !inner(bucket) & self.full_bucket();
            let bit = if gaps == 0 {
                // Filled after the outer word was read.
                self.bucket_width
            } else {
                gaps.trailing_zeros()
            };
            let offset = bucket as u64 * u64::from(self.bucket_width) + u64::from(bit);
            return offset.min(self.size);
        }
        self.size
    }
}

#[inline]
fn low_bits(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

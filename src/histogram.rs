//! Brightness histograms and cumulative distributions.
//!
//! Counting is a map-then-reduce over bin indices. The parallel form folds
//! each rayon partition into its own dense count array and merges arrays by
//! element-wise addition, so every bin is present and zero-filled without a
//! lookup.

use alloc::vec;
use alloc::vec::Vec;

use rayon::prelude::*;

use crate::color::Hsb;

/// Partitions smaller than this are counted without splitting further.
const MIN_COUNT_PARTITION: usize = 4096;

/// Chunks of the parallel scan never get shorter than this.
const MIN_SCAN_CHUNK: usize = 64;

/// Number of bins actually used for an image of `pixel_count` pixels.
///
/// Never more bins than pixels.
#[inline]
pub fn effective_bins(configured: u32, pixel_count: u64) -> usize {
    (configured as u64).min(pixel_count) as usize
}

/// Bin of a brightness value: `min(floor(brightness * bins), bins - 1)`.
///
/// Brightness `1.0` (and anything above) lands in the last bin; negative or
/// NaN brightness lands in bin 0. With `bins == 0` every brightness maps to
/// 0, which is not a valid index into an empty histogram.
#[inline]
pub fn bin_index(brightness: f32, bins: usize) -> usize {
    ((brightness * bins as f32) as usize).min(bins.saturating_sub(1))
}

/// Per-bin pixel counts, indexed by bin number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Histogram {
    counts: Vec<u64>,
}

impl Histogram {
    /// Wrap precomputed counts.
    pub fn from_counts(counts: Vec<u64>) -> Self {
        Self { counts }
    }

    /// Count brightness bins one pixel at a time.
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero.
    pub fn count(pixels: &[Hsb], bins: usize) -> Self {
        assert!(bins > 0, "bin count must be positive");
        let mut counts = vec![0u64; bins];
        for px in pixels {
            counts[bin_index(px.brightness, bins)] += 1;
        }
        Self { counts }
    }

    /// Count brightness bins with partition-local arrays merged by addition.
    ///
    /// Partitions hold at least `bins` pixels, so the per-partition arrays
    /// never outweigh the pixels they count. Inputs that would form a single
    /// partition are counted with [`count`](Self::count).
    ///
    /// # Panics
    ///
    /// Panics if `bins` is zero.
    pub fn count_par(pixels: &[Hsb], bins: usize) -> Self {
        assert!(bins > 0, "bin count must be positive");
        let min_len = MIN_COUNT_PARTITION.max(bins);
        if pixels.len() < min_len.saturating_mul(2) {
            return Self::count(pixels, bins);
        }
        let counts = pixels
            .par_iter()
            .with_min_len(min_len)
            .fold(
                || vec![0u64; bins],
                |mut counts, px| {
                    counts[bin_index(px.brightness, bins)] += 1;
                    counts
                },
            )
            .reduce(|| vec![0u64; bins], merge_counts);
        Self { counts }
    }

    /// Number of bins.
    #[inline]
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// Counts in bin order.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// `count[i] / pixel_count` for every bin.
    pub fn probabilities(&self, pixel_count: u64) -> Vec<f64> {
        let n = pixel_count as f64;
        self.counts.iter().map(|&c| c as f64 / n).collect()
    }

    /// Parallel form of [`probabilities`](Self::probabilities).
    pub fn probabilities_par(&self, pixel_count: u64) -> Vec<f64> {
        let n = pixel_count as f64;
        self.counts.par_iter().map(|&c| c as f64 / n).collect()
    }
}

fn merge_counts(mut a: Vec<u64>, b: Vec<u64>) -> Vec<u64> {
    for (x, y) in a.iter_mut().zip(&b) {
        *x += y;
    }
    a
}

/// Replace `values` with its inclusive running sum.
pub fn prefix_sum(values: &mut [f64]) {
    let mut acc = 0.0;
    for v in values {
        acc += *v;
        *v = acc;
    }
}

/// Parallel inclusive running sum.
///
/// Scans chunks independently, carries chunk totals across in order, then
/// adds each chunk's carry in parallel. Entry `i` still ends up holding the
/// sum of entries `0..=i`; only the association of the additions differs
/// from [`prefix_sum`].
pub fn prefix_sum_par(values: &mut [f64]) {
    let chunk = values
        .len()
        .div_ceil(rayon::current_num_threads())
        .max(MIN_SCAN_CHUNK);
    prefix_sum_chunked(values, chunk);
}

pub(crate) fn prefix_sum_chunked(values: &mut [f64], chunk: usize) {
    if values.len() <= chunk {
        prefix_sum(values);
        return;
    }
    let totals: Vec<f64> = values
        .par_chunks_mut(chunk)
        .map(|part| {
            prefix_sum(part);
            part[part.len() - 1]
        })
        .collect();
    let mut carry = 0.0;
    let carries: Vec<f64> = totals
        .iter()
        .map(|total| {
            let before = carry;
            carry += total;
            before
        })
        .collect();
    values
        .par_chunks_mut(chunk)
        .zip(carries.par_iter())
        .skip(1)
        .for_each(|(part, &carry)| part.iter_mut().for_each(|v| *v += carry));
}

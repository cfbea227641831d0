//! Fork/join region transfers.
//!
//! [`read_region_par`] and [`write_region_par`] halve a request by rows
//! until the task budget runs out or the band is short enough, then hand
//! each band to the buffer's direct transfer. Halves run under
//! [`rayon::join`], so they may execute on any thread of the current pool.
//!
//! The result never depends on how the request was split: bands cover the
//! region exactly once, and each band receives a disjoint part of the
//! destination (an array sub-slice for reads, a row band of the buffer for
//! writes).

use crate::buffer::{BufferError, PixelBuffer, PixelSlice, PixelSliceMut, Region, check_transfer};

/// Buffer that can copy a region out into a flat array.
///
/// Implementors only provide the unsplit transfer; splitting is done by
/// [`read_region_par`]. Must be safe to call concurrently for disjoint
/// output ranges, hence the `Sync` bound.
pub trait RegionRead: Sync {
    /// Grid size as `(width, height)`.
    fn bounds(&self) -> (u32, u32);

    /// Copy `region` into `out`, row `r` landing at `offset + r * scansize`.
    fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError>;
}

/// Buffer view that can copy a flat array into a region and be split into
/// disjoint row bands.
pub trait RegionWrite: Send + Sized {
    /// Grid size as `(width, height)`.
    fn bounds(&self) -> (u32, u32);

    /// Copy `data` into `region`, row `r` taken from `offset + r * scansize`.
    fn direct_write_region(
        &mut self,
        region: Region,
        data: &[u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError>;

    /// Split into rows `[0, at)` and `[at, height)`, each rebased to row 0.
    fn split_rows(self, at: u32) -> (Self, Self);
}

impl RegionRead for PixelSlice<'_> {
    fn bounds(&self) -> (u32, u32) {
        (self.width(), self.rows())
    }

    fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        PixelSlice::direct_read_region(self, region, out, offset, scansize)
    }
}

impl RegionRead for PixelSliceMut<'_> {
    fn bounds(&self) -> (u32, u32) {
        (self.width(), self.rows())
    }

    fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        PixelSliceMut::direct_read_region(self, region, out, offset, scansize)
    }
}

impl RegionRead for PixelBuffer {
    fn bounds(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        PixelBuffer::direct_read_region(self, region, out, offset, scansize)
    }
}

impl RegionWrite for PixelSliceMut<'_> {
    fn bounds(&self) -> (u32, u32) {
        (self.width(), self.rows())
    }

    fn direct_write_region(
        &mut self,
        region: Region,
        data: &[u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        PixelSliceMut::direct_write_region(self, region, data, offset, scansize)
    }

    fn split_rows(self, at: u32) -> (Self, Self) {
        self.split_rows_mut(at)
    }
}

/// How far a region transfer may be split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitPolicy {
    /// Remaining number of halvings worth spawning. A band stops splitting
    /// once its budget drops below 2.
    pub task_budget: usize,
    /// Bands of at most this many rows are transferred directly.
    pub min_rows: u32,
}

impl SplitPolicy {
    /// Policy with an explicit budget and row threshold.
    pub const fn new(task_budget: usize, min_rows: u32) -> Self {
        Self {
            task_budget,
            min_rows,
        }
    }

    /// Never split: one direct transfer.
    pub const fn unsplit() -> Self {
        Self::new(1, u32::MAX)
    }

    /// Budget of `multiplier` tasks per thread of the current rayon pool.
    ///
    /// Inside [`rayon::ThreadPool::install`] this sizes to that pool,
    /// otherwise to the global one.
    pub fn for_current_pool(multiplier: usize, min_rows: u32) -> Self {
        Self::new(
            rayon::current_num_threads().saturating_mul(multiplier),
            min_rows,
        )
    }

    #[inline]
    fn is_leaf(&self, height: u32) -> bool {
        self.task_budget < 2 || height <= self.min_rows.max(1)
    }

    /// Budgets for the upper and lower halves; the odd task goes to the lower.
    #[inline]
    fn halve(&self) -> (SplitPolicy, SplitPolicy) {
        let upper = self.task_budget / 2;
        let lower = self.task_budget - upper;
        (
            Self::new(upper, self.min_rows),
            Self::new(lower, self.min_rows),
        )
    }
}

/// Copy `region` of `src` into `out` with fork/join splitting.
///
/// Row `r` of the region lands at `out[offset + r * scansize..]`, exactly as
/// with a single [`RegionRead::direct_read_region`] call.
///
/// # Errors
///
/// The whole request is validated up front; an invalid region, scansize or
/// short array fails before any pixel is copied. A failure in a band is
/// returned to the caller, the upper band's error winning if both fail.
pub fn read_region_par<R: RegionRead + ?Sized>(
    src: &R,
    region: Region,
    out: &mut [u32],
    offset: usize,
    scansize: usize,
    policy: SplitPolicy,
) -> Result<(), BufferError> {
    let (width, height) = src.bounds();
    check_transfer(region, width, height, out.len(), offset, scansize)?;
    read_split(src, region, out, offset, scansize, policy)
}

fn read_split<R: RegionRead + ?Sized>(
    src: &R,
    region: Region,
    out: &mut [u32],
    offset: usize,
    scansize: usize,
    policy: SplitPolicy,
) -> Result<(), BufferError> {
    if region.is_empty() {
        return Ok(());
    }
    if policy.is_leaf(region.height) {
        return src.direct_read_region(region, out, offset, scansize);
    }
    let (upper, lower) = region.split_rows(region.height / 2);
    let (upper_policy, lower_policy) = policy.halve();
    // Upper band rows end before `mid`, so the halves own disjoint output.
    let mid = offset + upper.height as usize * scansize;
    let (head, tail) = out.split_at_mut(mid);
    let (a, b) = rayon::join(
        || read_split(src, upper, head, offset, scansize, upper_policy),
        || read_split(src, lower, tail, 0, scansize, lower_policy),
    );
    a.and(b)
}

/// Copy `data` into `region` of `dst` with fork/join splitting.
///
/// Row `r` of the region is taken from `data[offset + r * scansize..]`,
/// exactly as with a single [`RegionWrite::direct_write_region`] call.
///
/// # Errors
///
/// Same as [`read_region_par`]: validated up front, first band failure
/// returned.
pub fn write_region_par<W: RegionWrite>(
    dst: W,
    region: Region,
    data: &[u32],
    offset: usize,
    scansize: usize,
    policy: SplitPolicy,
) -> Result<(), BufferError> {
    let (width, height) = dst.bounds();
    check_transfer(region, width, height, data.len(), offset, scansize)?;
    if region.is_empty() {
        return Ok(());
    }
    let (_, band) = dst.split_rows(region.y);
    let (band, _) = band.split_rows(region.height);
    write_split(band, Region { y: 0, ..region }, data, offset, scansize, policy)
}

/// `region.y` is always 0: `band` holds exactly the region's rows.
fn write_split<W: RegionWrite>(
    mut band: W,
    region: Region,
    data: &[u32],
    offset: usize,
    scansize: usize,
    policy: SplitPolicy,
) -> Result<(), BufferError> {
    if policy.is_leaf(region.height) {
        return band.direct_write_region(region, data, offset, scansize);
    }
    let upper_rows = region.height / 2;
    let (upper_band, lower_band) = band.split_rows(upper_rows);
    let upper = Region {
        height: upper_rows,
        ..region
    };
    let lower = Region {
        height: region.height - upper_rows,
        ..region
    };
    let (upper_policy, lower_policy) = policy.halve();
    let lower_offset = offset + upper_rows as usize * scansize;
    let (a, b) = rayon::join(
        || write_split(upper_band, upper, data, offset, scansize, upper_policy),
        || write_split(lower_band, lower, data, lower_offset, scansize, lower_policy),
    );
    a.and(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use std::sync::Mutex;

    fn noise(width: u32, height: u32) -> PixelBuffer {
        let mut state = 0x2545_F491u32;
        let data = (0..width * height)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state
            })
            .collect();
        PixelBuffer::from_vec(data, width, height).unwrap()
    }

    fn pool(threads: usize) -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
    }

    /// Records every leaf band handed to the direct transfer.
    struct Recording<'a> {
        inner: PixelSlice<'a>,
        leaves: Mutex<Vec<Region>>,
    }

    impl RegionRead for Recording<'_> {
        fn bounds(&self) -> (u32, u32) {
            self.inner.bounds()
        }

        fn direct_read_region(
            &self,
            region: Region,
            out: &mut [u32],
            offset: usize,
            scansize: usize,
        ) -> Result<(), BufferError> {
            self.leaves.lock().unwrap().push(region);
            self.inner.direct_read_region(region, out, offset, scansize)
        }
    }

    fn leaves_for(height: u32, policy: SplitPolicy) -> Vec<Region> {
        let buf = noise(3, height);
        let src = Recording {
            inner: buf.as_slice(),
            leaves: Mutex::new(Vec::new()),
        };
        let mut out = vec![0u32; 3 * height as usize];
        read_region_par(&src, Region::full(3, height), &mut out, 0, 3, policy).unwrap();
        let mut leaves = src.leaves.into_inner().unwrap();
        leaves.sort_by_key(|r| r.y);
        leaves
    }

    #[test]
    fn halving_gives_remainder_to_lower_half() {
        let (upper, lower) = SplitPolicy::new(7, 2).halve();
        assert_eq!(upper.task_budget, 3);
        assert_eq!(lower.task_budget, 4);
        assert_eq!(upper.min_rows, 2);
    }

    #[test]
    fn leaves_tile_region_exactly() {
        for height in [1u32, 2, 3, 7, 10, 33] {
            for budget in [0usize, 1, 2, 3, 5, 8, 64] {
                for min_rows in [0u32, 1, 2, 4] {
                    let leaves = leaves_for(height, SplitPolicy::new(budget, min_rows));
                    let mut next = 0;
                    for leaf in &leaves {
                        assert_eq!(leaf.y, next, "gap or overlap at h={height} b={budget}");
                        assert!(leaf.height > 0);
                        next += leaf.height;
                    }
                    assert_eq!(next, height);
                }
            }
        }
    }

    #[test]
    fn budget_below_two_is_a_single_transfer() {
        assert_eq!(leaves_for(10, SplitPolicy::new(1, 1)), vec![Region::full(3, 10)]);
        assert_eq!(leaves_for(10, SplitPolicy::new(0, 1)), vec![Region::full(3, 10)]);
        assert_eq!(leaves_for(10, SplitPolicy::unsplit()), vec![Region::full(3, 10)]);
    }

    #[test]
    fn split_shape_follows_halving_arithmetic() {
        // h=10, budget 4 -> (5, b2) + (5, b2) -> (2,3) + (2,3)
        let heights: Vec<u32> = leaves_for(10, SplitPolicy::new(4, 1))
            .iter()
            .map(|r| r.height)
            .collect();
        assert_eq!(heights, vec![2, 3, 2, 3]);
        // budget 3 -> upper b1 (5 rows), lower b2 -> (2, 3)
        let heights: Vec<u32> = leaves_for(10, SplitPolicy::new(3, 1))
            .iter()
            .map(|r| r.height)
            .collect();
        assert_eq!(heights, vec![5, 2, 3]);
    }

    #[test]
    fn min_rows_stops_splitting() {
        let leaves = leaves_for(16, SplitPolicy::new(1 << 20, 4));
        assert_eq!(leaves.len(), 4);
        assert!(leaves.iter().all(|r| r.height == 4));
    }

    #[test]
    fn read_matches_direct_transfer_with_offset() {
        let buf = noise(9, 13);
        let region = Region::new(2, 3, 5, 8);
        let (offset, scansize) = (4, 7);
        let len = offset + 7 * scansize + 5;
        let mut expected = vec![0u32; len];
        buf.direct_read_region(region, &mut expected, offset, scansize)
            .unwrap();
        for budget in [1, 2, 3, 16, 100] {
            let mut got = vec![0u32; len];
            read_region_par(&buf, region, &mut got, offset, scansize, SplitPolicy::new(budget, 1))
                .unwrap();
            assert_eq!(got, expected, "budget {budget}");
        }
    }

    #[test]
    fn write_matches_direct_transfer_with_offset() {
        let data: Vec<u32> = (0..200).collect();
        let region = Region::new(1, 2, 4, 9);
        let mut expected = PixelBuffer::filled(6, 12, 0xDEAD_BEEF);
        expected
            .direct_write_region(region, &data, 3, 6)
            .unwrap();
        for budget in [1, 2, 5, 32] {
            let mut got = PixelBuffer::filled(6, 12, 0xDEAD_BEEF);
            write_region_par(got.as_slice_mut(), region, &data, 3, 6, SplitPolicy::new(budget, 1))
                .unwrap();
            assert_eq!(got, expected, "budget {budget}");
        }
    }

    #[test]
    fn round_trip_reproduces_source_at_any_budget() {
        let src = noise(37, 61);
        let full = Region::full(37, 61);
        for threads in [1, 4] {
            pool(threads).install(|| {
                for budget in [0, 1, 2, 3, 4, 7, 8, 31, 64, 1000] {
                    for min_rows in [1, 2, 5] {
                        let policy = SplitPolicy::new(budget, min_rows);
                        let mut pixels = vec![0u32; 37 * 61];
                        read_region_par(&src, full, &mut pixels, 0, 37, policy).unwrap();
                        let mut dst = PixelBuffer::new(37, 61);
                        write_region_par(dst.as_slice_mut(), full, &pixels, 0, 37, policy)
                            .unwrap();
                        assert_eq!(dst, src, "threads {threads} budget {budget}");
                    }
                }
            });
        }
    }

    #[test]
    fn for_current_pool_scales_with_threads() {
        let policy = pool(3).install(|| SplitPolicy::for_current_pool(8, 2));
        assert_eq!(policy, SplitPolicy::new(24, 2));
    }

    #[test]
    fn zero_height_is_a_no_op() {
        let src = noise(4, 4);
        let mut out: Vec<u32> = Vec::new();
        read_region_par(&src, Region::new(0, 2, 4, 0), &mut out, 0, 4, SplitPolicy::new(8, 1))
            .unwrap();
        let mut dst = PixelBuffer::filled(4, 4, 1);
        write_region_par(dst.as_slice_mut(), Region::new(0, 4, 4, 0), &[], 0, 4, SplitPolicy::new(8, 1))
            .unwrap();
        assert!(dst.pixels().iter().all(|&p| p == 1));
    }

    #[test]
    fn invalid_requests_fail_before_copying() {
        let src = noise(4, 4);
        let mut out = vec![7u32; 16];
        let err = read_region_par(&src, Region::new(0, 1, 4, 4), &mut out, 0, 4, SplitPolicy::new(8, 1))
            .unwrap_err();
        assert!(matches!(err, BufferError::RegionOutOfBounds { .. }));
        assert!(out.iter().all(|&p| p == 7));

        let err = read_region_par(&src, Region::full(4, 4), &mut out, 0, 3, SplitPolicy::new(8, 1))
            .unwrap_err();
        assert!(matches!(err, BufferError::ScansizeTooSmall { .. }));

        let mut dst = PixelBuffer::filled(4, 4, 9);
        let err = write_region_par(dst.as_slice_mut(), Region::full(4, 4), &out[..15], 0, 4, SplitPolicy::new(8, 1))
            .unwrap_err();
        assert!(matches!(err, BufferError::ArrayTooSmall { .. }));
        assert!(dst.pixels().iter().all(|&p| p == 9));
    }

    /// Fails for any band that touches row `bad_row`.
    struct Faulty<'a> {
        inner: PixelSlice<'a>,
        bad_rows: &'a [u32],
    }

    impl RegionRead for Faulty<'_> {
        fn bounds(&self) -> (u32, u32) {
            self.inner.bounds()
        }

        fn direct_read_region(
            &self,
            region: Region,
            out: &mut [u32],
            offset: usize,
            scansize: usize,
        ) -> Result<(), BufferError> {
            if let Some(&row) = self
                .bad_rows
                .iter()
                .find(|&&row| row >= region.y && row < region.y + region.height)
            {
                return Err(BufferError::RegionOutOfBounds {
                    region,
                    width: row,
                    height: row,
                });
            }
            self.inner.direct_read_region(region, out, offset, scansize)
        }
    }

    #[test]
    fn band_failures_propagate_upper_first() {
        let buf = noise(2, 8);
        let src = Faulty {
            inner: buf.as_slice(),
            bad_rows: &[1, 6],
        };
        let mut out = vec![0u32; 16];
        let err = read_region_par(&src, Region::full(2, 8), &mut out, 0, 2, SplitPolicy::new(8, 1))
            .unwrap_err();
        match err {
            BufferError::RegionOutOfBounds { width, .. } => assert_eq!(width, 1),
            other => panic!("unexpected error {other:?}"),
        }

        let src = Faulty {
            inner: buf.as_slice(),
            bad_rows: &[6],
        };
        let err = read_region_par(&src, Region::full(2, 8), &mut out, 0, 2, SplitPolicy::new(8, 1))
            .unwrap_err();
        assert!(matches!(err, BufferError::RegionOutOfBounds { width: 6, .. }));
    }

    /// Destination band that fails when it covers one of `bad_rows`.
    /// `base` is the band's first row in the original buffer.
    struct FaultySink<'a> {
        inner: PixelSliceMut<'a>,
        base: u32,
        bad_rows: &'a [u32],
    }

    impl RegionWrite for FaultySink<'_> {
        fn bounds(&self) -> (u32, u32) {
            (self.inner.width(), self.inner.rows())
        }

        fn direct_write_region(
            &mut self,
            region: Region,
            data: &[u32],
            offset: usize,
            scansize: usize,
        ) -> Result<(), BufferError> {
            let first = self.base + region.y;
            if let Some(&row) = self
                .bad_rows
                .iter()
                .find(|&&row| row >= first && row < first + region.height)
            {
                return Err(BufferError::RegionOutOfBounds {
                    region,
                    width: row,
                    height: row,
                });
            }
            self.inner.direct_write_region(region, data, offset, scansize)
        }

        fn split_rows(self, at: u32) -> (Self, Self) {
            let (upper, lower) = self.inner.split_rows_mut(at);
            (
                FaultySink {
                    inner: upper,
                    base: self.base,
                    bad_rows: self.bad_rows,
                },
                FaultySink {
                    inner: lower,
                    base: self.base + at,
                    bad_rows: self.bad_rows,
                },
            )
        }
    }

    #[test]
    fn write_band_failures_propagate_upper_first() {
        let data: Vec<u32> = (0..16).collect();
        for threads in [1, 4] {
            pool(threads).install(|| {
                let mut dst = PixelBuffer::new(2, 8);
                let sink = FaultySink {
                    inner: dst.as_slice_mut(),
                    base: 0,
                    bad_rows: &[1, 6],
                };
                let err = write_region_par(sink, Region::full(2, 8), &data, 0, 2, SplitPolicy::new(8, 1))
                    .unwrap_err();
                assert!(matches!(err, BufferError::RegionOutOfBounds { width: 1, .. }));

                let sink = FaultySink {
                    inner: dst.as_slice_mut(),
                    base: 0,
                    bad_rows: &[6],
                };
                let err = write_region_par(sink, Region::full(2, 8), &data, 0, 2, SplitPolicy::new(8, 1))
                    .unwrap_err();
                assert!(matches!(err, BufferError::RegionOutOfBounds { width: 6, .. }));
                // Bands clear of row 6 were still written.
                assert_eq!(dst.get(1, 0), 1);
                assert_eq!(dst.get(1, 7), 15);
            });
        }
    }

    #[test]
    fn write_band_failure_inside_offset_region() {
        let data: Vec<u32> = (0..32).collect();
        let mut dst = PixelBuffer::new(4, 10);
        let sink = FaultySink {
            inner: dst.as_slice_mut(),
            base: 0,
            bad_rows: &[8],
        };
        let err = write_region_par(sink, Region::new(0, 3, 4, 6), &data, 0, 4, SplitPolicy::new(16, 1))
            .unwrap_err();
        assert!(matches!(err, BufferError::RegionOutOfBounds { width: 8, .. }));
    }
}

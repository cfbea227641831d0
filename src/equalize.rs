//! Brightness histogram equalization.
//!
//! One pipeline, two execution strategies. Both modes run the same seven
//! stages with the same per-element functions:
//!
//! 1. read the source pixels
//! 2. convert each pixel to [`Hsb`]
//! 3. count brightness bins
//! 4. turn counts into probabilities
//! 5. scan probabilities into a cumulative distribution
//! 6. replace each brightness with the distribution value at its own bin
//! 7. write the result
//!
//! [`ExecutionMode::Parallel`] moves pixels with the fork/join region
//! splitter and runs the per-pixel stages as rayon parallel iterators on
//! the current pool. Results match the sequential mode up to the order of
//! floating-point additions in the scan.

use alloc::vec;
use alloc::vec::Vec;

use rayon::prelude::*;

use crate::buffer::{BufferError, PixelSlice, PixelSliceMut, Region};
use crate::color::Hsb;
use crate::config::{ConfigError, EqualizeConfig};
use crate::histogram::{Histogram, bin_index, prefix_sum, prefix_sum_par};
use crate::region::{SplitPolicy, read_region_par, write_region_par};
use crate::timer::{NoTimer, Stage, StageTimer};

/// How the pipeline stages are executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Single-threaded iteration and direct transfers.
    #[default]
    Sequential,
    /// Fork/join transfers and parallel iterators on the current rayon pool.
    Parallel,
}

/// Equalization failed. Nothing is written to the destination.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum EqualizeError {
    /// Source and destination sizes differ.
    #[error(
        "source is {src_width}x{src_height} but destination is {dst_width}x{dst_height}"
    )]
    DimensionMismatch {
        /// Source width.
        src_width: u32,
        /// Source height.
        src_height: u32,
        /// Destination width.
        dst_width: u32,
        /// Destination height.
        dst_height: u32,
    },
    /// The source has no pixels.
    #[error("image has no pixels")]
    EmptyImage,
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Pixel transfer failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Brightness histogram and cumulative distribution of one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    /// Pixel counts per bin.
    pub histogram: Histogram,
    /// Inclusive running sum of per-bin probabilities.
    pub cumulative: Vec<f64>,
    /// Pixels analyzed.
    pub pixel_count: u64,
}

impl Analysis {
    /// Effective bin count.
    #[inline]
    pub fn bins(&self) -> usize {
        self.cumulative.len()
    }

    /// Equalized packed color of one pixel.
    ///
    /// # Panics
    ///
    /// Panics if `cumulative` is empty. Analyses returned by
    /// [`Equalizer::analyze`] always hold at least one bin.
    #[inline]
    pub fn remap(&self, px: Hsb) -> u32 {
        let bin = bin_index(px.brightness, self.bins());
        px.with_brightness(self.cumulative[bin] as f32).to_argb()
    }
}

/// Histogram equalizer with a validated configuration.
///
/// # Example
///
/// ```
/// use histeq::{EqualizeConfig, Equalizer, ExecutionMode, PixelBuffer};
///
/// let src = PixelBuffer::from_vec(vec![0xFF00_0000, 0xFFFF_FFFF], 2, 1).unwrap();
/// let mut dst = PixelBuffer::new(2, 1);
/// let equalizer = Equalizer::new(EqualizeConfig::new()).unwrap();
/// equalizer.equalize(ExecutionMode::Parallel, &src, &mut dst).unwrap();
/// assert_eq!(dst.pixels(), &[0xFF80_8080, 0xFFFF_FFFF]);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Equalizer {
    config: EqualizeConfig,
}

impl Equalizer {
    /// Create an equalizer.
    ///
    /// # Errors
    ///
    /// Returns the first zero setting found by [`EqualizeConfig::check`].
    pub fn new(config: EqualizeConfig) -> Result<Self, ConfigError> {
        config.check()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    pub fn config(&self) -> &EqualizeConfig {
        &self.config
    }

    /// Equalize `src` into `dst` single-threaded.
    pub fn equalize_sequential<'s, 'd>(
        &self,
        src: impl Into<PixelSlice<'s>>,
        dst: impl Into<PixelSliceMut<'d>>,
    ) -> Result<(), EqualizeError> {
        self.equalize(ExecutionMode::Sequential, src, dst)
    }

    /// Equalize `src` into `dst` on the current rayon pool.
    pub fn equalize_parallel<'s, 'd>(
        &self,
        src: impl Into<PixelSlice<'s>>,
        dst: impl Into<PixelSliceMut<'d>>,
    ) -> Result<(), EqualizeError> {
        self.equalize(ExecutionMode::Parallel, src, dst)
    }

    /// Equalize `src` into `dst`.
    ///
    /// # Errors
    ///
    /// Fails before touching any pixel if the sizes differ or the image is
    /// empty.
    pub fn equalize<'s, 'd>(
        &self,
        mode: ExecutionMode,
        src: impl Into<PixelSlice<'s>>,
        dst: impl Into<PixelSliceMut<'d>>,
    ) -> Result<(), EqualizeError> {
        self.equalize_timed(mode, src, dst, &mut NoTimer)
    }

    /// Equalize `src` into `dst`, marking `timer` after every stage.
    pub fn equalize_timed<'s, 'd, T: StageTimer + ?Sized>(
        &self,
        mode: ExecutionMode,
        src: impl Into<PixelSlice<'s>>,
        dst: impl Into<PixelSliceMut<'d>>,
        timer: &mut T,
    ) -> Result<(), EqualizeError> {
        let src = src.into();
        let dst = dst.into();
        if (src.width(), src.rows()) != (dst.width(), dst.rows()) {
            return Err(EqualizeError::DimensionMismatch {
                src_width: src.width(),
                src_height: src.rows(),
                dst_width: dst.width(),
                dst_height: dst.rows(),
            });
        }
        let policy = self.config.split_policy();
        let (mut pixels, hsb, analysis) = self.run_analysis(mode, src, policy, timer)?;

        match mode {
            ExecutionMode::Sequential => pixels
                .iter_mut()
                .zip(&hsb)
                .for_each(|(out, &px)| *out = analysis.remap(px)),
            ExecutionMode::Parallel => pixels
                .par_iter_mut()
                .zip(hsb.par_iter())
                .for_each(|(out, &px)| *out = analysis.remap(px)),
        }
        timer.mark(Stage::Remap);

        let region = Region::full(src.width(), src.rows());
        let scansize = src.width() as usize;
        match mode {
            ExecutionMode::Sequential => {
                let mut dst = dst;
                dst.direct_write_region(region, &pixels, 0, scansize)?;
            }
            ExecutionMode::Parallel => {
                write_region_par(dst, region, &pixels, 0, scansize, policy)?;
            }
        }
        timer.mark(Stage::Write);
        Ok(())
    }

    /// Run the read, convert, count, probability and scan stages only.
    ///
    /// # Errors
    ///
    /// Fails if the image is empty.
    pub fn analyze<'s>(
        &self,
        mode: ExecutionMode,
        src: impl Into<PixelSlice<'s>>,
    ) -> Result<Analysis, EqualizeError> {
        let policy = self.config.split_policy();
        let (_, _, analysis) = self.run_analysis(mode, src.into(), policy, &mut NoTimer)?;
        Ok(analysis)
    }

    /// Stages 1 through 5. Returns the raw pixels (reused as the output
    /// array), their HSB decomposition, and the analysis.
    fn run_analysis<T: StageTimer + ?Sized>(
        &self,
        mode: ExecutionMode,
        src: PixelSlice<'_>,
        policy: SplitPolicy,
        timer: &mut T,
    ) -> Result<(Vec<u32>, Vec<Hsb>, Analysis), EqualizeError> {
        let pixel_count = src.pixel_count();
        if pixel_count == 0 {
            return Err(EqualizeError::EmptyImage);
        }
        let len = usize::try_from(pixel_count).map_err(|_| BufferError::InvalidDimensions)?;
        let bins = self.config.effective_bins(pixel_count);
        tracing::debug!(
            width = src.width(),
            height = src.rows(),
            bins,
            ?mode,
            "equalizing brightness"
        );
        timer.start();

        let region = Region::full(src.width(), src.rows());
        let scansize = src.width() as usize;
        let mut pixels = vec![0u32; len];
        match mode {
            ExecutionMode::Sequential => {
                src.direct_read_region(region, &mut pixels, 0, scansize)?;
            }
            ExecutionMode::Parallel => {
                read_region_par(&src, region, &mut pixels, 0, scansize, policy)?;
            }
        }
        timer.mark(Stage::Read);

        let hsb: Vec<Hsb> = match mode {
            ExecutionMode::Sequential => pixels.iter().map(|&p| Hsb::from_argb(p)).collect(),
            ExecutionMode::Parallel => pixels.par_iter().map(|&p| Hsb::from_argb(p)).collect(),
        };
        timer.mark(Stage::Convert);

        let histogram = match mode {
            ExecutionMode::Sequential => Histogram::count(&hsb, bins),
            ExecutionMode::Parallel => Histogram::count_par(&hsb, bins),
        };
        timer.mark(Stage::Histogram);

        let mut cumulative = match mode {
            ExecutionMode::Sequential => histogram.probabilities(pixel_count),
            ExecutionMode::Parallel => histogram.probabilities_par(pixel_count),
        };
        timer.mark(Stage::Probability);

        match mode {
            ExecutionMode::Sequential => prefix_sum(&mut cumulative),
            ExecutionMode::Parallel => prefix_sum_par(&mut cumulative),
        }
        timer.mark(Stage::Cumulative);

        let analysis = Analysis {
            histogram,
            cumulative,
            pixel_count,
        };
        Ok((pixels, hsb, analysis))
    }
}

//! Equalization settings.
//!
//! [`EqualizeConfig`] carries the externally chosen bin count and the
//! task-granularity knobs of the parallel mode. [`ConfigError`] is returned
//! when [`EqualizeConfig::check`] rejects a value.

use crate::histogram::effective_bins;
use crate::region::SplitPolicy;

/// Default number of brightness bins.
pub const DEFAULT_BINS: u32 = 256;

/// Default number of splitter tasks per pool thread.
///
/// Throughput is flat for multipliers between about 4 and 16; fewer starves
/// work stealing, more only adds splitting overhead.
pub const DEFAULT_TASK_MULTIPLIER: usize = 8;

/// Default band height at which the splitter stops halving.
pub const DEFAULT_MIN_ROWS: u32 = 2;

/// Equalization configuration.
///
/// # Example
///
/// ```
/// use histeq::EqualizeConfig;
///
/// let config = EqualizeConfig::new().with_bins(64).with_task_multiplier(4);
/// assert!(config.check().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct EqualizeConfig {
    /// Configured number of brightness bins. The effective count for an
    /// image is never larger than its pixel count.
    pub bins: u32,
    /// Parallel mode: initial splitter budget per rayon pool thread.
    pub task_multiplier: usize,
    /// Parallel mode: bands of at most this many rows are not split.
    pub min_rows: u32,
}

impl Default for EqualizeConfig {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            task_multiplier: DEFAULT_TASK_MULTIPLIER,
            min_rows: DEFAULT_MIN_ROWS,
        }
    }
}

impl EqualizeConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configured bin count.
    pub fn with_bins(mut self, bins: u32) -> Self {
        self.bins = bins;
        self
    }

    /// Set the splitter budget per pool thread.
    pub fn with_task_multiplier(mut self, multiplier: usize) -> Self {
        self.task_multiplier = multiplier;
        self
    }

    /// Set the band height below which the splitter stops halving.
    pub fn with_min_rows(mut self, rows: u32) -> Self {
        self.min_rows = rows;
        self
    }

    /// Reject zero values.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.bins == 0 {
            return Err(ConfigError::ZeroBins);
        }
        if self.task_multiplier == 0 {
            return Err(ConfigError::ZeroTaskMultiplier);
        }
        if self.min_rows == 0 {
            return Err(ConfigError::ZeroMinRows);
        }
        Ok(())
    }

    /// Bins used for an image of `pixel_count` pixels.
    pub fn effective_bins(&self, pixel_count: u64) -> usize {
        effective_bins(self.bins, pixel_count)
    }

    /// Splitter policy seeded from the current rayon pool size.
    pub fn split_policy(&self) -> SplitPolicy {
        SplitPolicy::for_current_pool(self.task_multiplier, self.min_rows)
    }
}

/// An [`EqualizeConfig`] value was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// `bins` is zero.
    #[error("bin count must be at least 1")]
    ZeroBins,
    /// `task_multiplier` is zero.
    #[error("task multiplier must be at least 1")]
    ZeroTaskMultiplier,
    /// `min_rows` is zero.
    #[error("minimum split rows must be at least 1")]
    ZeroMinRows,
}

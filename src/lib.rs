//! Brightness histogram equalization for packed ARGB images.
//!
//! The crate is built around three pieces:
//!
//! - [`PixelBuffer`] / [`PixelSlice`] / [`PixelSliceMut`]: row-major
//!   `0xAARRGGBB` pixel storage with bulk region transfers
//! - [`read_region_par`] / [`write_region_par`]: fork/join region transfers
//!   that split a request into row bands on the current rayon pool
//! - [`Equalizer`]: the seven-stage equalization pipeline, run either
//!   [`Sequential`](ExecutionMode::Sequential) or
//!   [`Parallel`](ExecutionMode::Parallel)
//!
//! Equalization works on the HSB brightness channel only. Hue and
//! saturation are preserved; output pixels are always opaque.
//!
//! Interop with the wider image ecosystem goes through [`imgref`] views of
//! `u32` pixels and [`rgb::Rgba`] 8-bit buffers.

#![forbid(unsafe_code)]

extern crate alloc;

mod buffer;
mod color;
mod config;
mod equalize;
mod histogram;
mod region;
mod timer;

pub use buffer::{BufferError, PixelBuffer, PixelSlice, PixelSliceMut, Region};
pub use color::{Hsb, OPAQUE, pack, pack_rgba, unpack};
pub use config::{
    ConfigError, DEFAULT_BINS, DEFAULT_MIN_ROWS, DEFAULT_TASK_MULTIPLIER, EqualizeConfig,
};
pub use equalize::{Analysis, EqualizeError, Equalizer, ExecutionMode};
pub use histogram::{Histogram, bin_index, effective_bins, prefix_sum, prefix_sum_par};
pub use region::{RegionRead, RegionWrite, SplitPolicy, read_region_par, write_region_par};
pub use timer::{NoTimer, Stage, StageTimer, StageTimes};

// Re-exports for interop.
pub use imgref::{ImgRef, ImgRefMut, ImgVec};
pub use rgb;
pub use rgb::Rgba;

//! Packed-color pixel buffers.
//!
//! [`PixelBuffer`] owns a tightly packed grid of `0xAARRGGBB` pixels.
//! [`PixelSlice`] and [`PixelSliceMut`] are borrowed views over a run of
//! rows that share one stride, possibly a sub-region of a larger buffer.
//!
//! All three expose the same bulk transfer primitives: copy a rectangular
//! [`Region`] out into a flat array, or in from one, where the array is laid
//! out as `offset + row * scansize + column`.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use imgref::{ImgRef, ImgRefMut, ImgVec};
use rgb::Rgba;

use crate::color;

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Rectangular area of a pixel grid, in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Region {
    /// Left column.
    pub x: u32,
    /// Top row.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in rows.
    pub height: u32,
}

impl Region {
    /// Create a region.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole `width` x `height` grid.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether the region covers no pixels.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    #[inline]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Split into rows `[y, y + at)` and `[y + at, y + height)`.
    ///
    /// # Panics
    ///
    /// Panics if `at > height`.
    pub fn split_rows(&self, at: u32) -> (Region, Region) {
        assert!(
            at <= self.height,
            "split at row {at} exceeds region height {}",
            self.height
        );
        let upper = Region {
            height: at,
            ..*self
        };
        let lower = Region {
            y: self.y + at,
            height: self.height - at,
            ..*self
        };
        (upper, lower)
    }
}

// ---------------------------------------------------------------------------
// BufferError
// ---------------------------------------------------------------------------

/// Errors from pixel buffer construction and region transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BufferError {
    /// Width times height overflows.
    #[error("width or height causes overflow")]
    InvalidDimensions,
    /// Pixel storage is too small for the given dimensions and stride.
    #[error("pixel data is too small for the given dimensions")]
    InsufficientData,
    /// Owned pixel vector does not hold exactly `width * height` pixels.
    #[error("expected {expected} pixels, got {actual}")]
    LengthMismatch {
        /// `width * height`.
        expected: usize,
        /// Length of the supplied vector.
        actual: usize,
    },
    /// Stride is smaller than the width.
    #[error("stride is smaller than width")]
    StrideTooSmall,
    /// Region does not lie inside the grid.
    #[error("region {region:?} exceeds {width}x{height} grid")]
    RegionOutOfBounds {
        /// Requested region.
        region: Region,
        /// Grid width.
        width: u32,
        /// Grid height.
        height: u32,
    },
    /// Array row pitch is smaller than the region width, so rows would overlap.
    #[error("scansize {scansize} is smaller than region width {width}")]
    ScansizeTooSmall {
        /// Requested row pitch of the flat array.
        scansize: usize,
        /// Region width.
        width: u32,
    },
    /// Flat array cannot hold the region at the given offset and scansize.
    #[error("array holds {actual} pixels, transfer needs {required}")]
    ArrayTooSmall {
        /// Minimum array length.
        required: usize,
        /// Actual array length.
        actual: usize,
    },
}

/// Validate a region transfer against a `width` x `height` grid and a flat
/// array of `len` pixels.
///
/// An empty region is always accepted once it lies inside the grid.
pub(crate) fn check_transfer(
    region: Region,
    width: u32,
    height: u32,
    len: usize,
    offset: usize,
    scansize: usize,
) -> Result<(), BufferError> {
    let inside = region.x.checked_add(region.width).is_some_and(|end| end <= width)
        && region
            .y
            .checked_add(region.height)
            .is_some_and(|end| end <= height);
    if !inside {
        return Err(BufferError::RegionOutOfBounds {
            region,
            width,
            height,
        });
    }
    if region.is_empty() {
        return Ok(());
    }
    if scansize < region.width as usize {
        return Err(BufferError::ScansizeTooSmall {
            scansize,
            width: region.width,
        });
    }
    let required = (region.height as usize - 1)
        .checked_mul(scansize)
        .and_then(|rows| rows.checked_add(offset))
        .and_then(|start| start.checked_add(region.width as usize))
        .ok_or(BufferError::InvalidDimensions)?;
    if len < required {
        return Err(BufferError::ArrayTooSmall {
            required,
            actual: len,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// PixelSlice (borrowed, immutable)
// ---------------------------------------------------------------------------

/// Borrowed view of packed pixels.
///
/// Represents a run of pixel rows, possibly a sub-region of a larger
/// buffer. All rows share the same stride, counted in pixels.
#[derive(Clone, Copy)]
pub struct PixelSlice<'a> {
    data: &'a [u32],
    width: u32,
    rows: u32,
    stride: usize,
}

impl<'a> PixelSlice<'a> {
    /// Create a new pixel slice with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stride is smaller than the width or the data
    /// cannot hold `rows` rows.
    pub fn new(data: &'a [u32], width: u32, rows: u32, stride: usize) -> Result<Self, BufferError> {
        check_layout(data.len(), width, rows, stride)?;
        Ok(Self {
            data,
            width,
            rows,
            stride,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in this slice.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Pixel stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of pixels (`width * rows`).
    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.rows as u64
    }

    /// Pixels of row `y` (no padding, exactly `width` values).
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    #[inline]
    pub fn row(&self, y: u32) -> &'a [u32] {
        assert!(
            y < self.rows,
            "row index {y} out of bounds (rows: {})",
            self.rows
        );
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }

    /// Packed pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.row(y)[x as usize]
    }

    /// Borrow a sub-range of rows.
    ///
    /// # Panics
    ///
    /// Panics if `y + count > rows`.
    pub fn sub_rows(&self, y: u32, count: u32) -> PixelSlice<'a> {
        self.crop_view(0, y, self.width, count)
    }

    /// Zero-copy crop view. Stride remains the same as the parent.
    ///
    /// # Panics
    ///
    /// Panics if the crop region is out of bounds.
    pub fn crop_view(&self, x: u32, y: u32, w: u32, h: u32) -> PixelSlice<'a> {
        let (start, end) = crop_range(self.width, self.rows, self.stride, x, y, w, h);
        PixelSlice {
            data: &self.data[start..end],
            width: w,
            rows: h,
            stride: self.stride,
        }
    }

    /// Copy `region` into `out`, row `r` landing at `offset + r * scansize`.
    ///
    /// # Errors
    ///
    /// Fails without copying anything if the region is outside the slice or
    /// `out` cannot hold it.
    pub fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        check_transfer(region, self.width, self.rows, out.len(), offset, scansize)?;
        if region.is_empty() {
            return Ok(());
        }
        let (x0, x1) = (region.x as usize, (region.x + region.width) as usize);
        for r in 0..region.height {
            let src = &self.row(region.y + r)[x0..x1];
            let start = offset + r as usize * scansize;
            out[start..start + src.len()].copy_from_slice(src);
        }
        Ok(())
    }

    /// Copy `region` into a new tightly packed vector.
    ///
    /// # Errors
    ///
    /// Fails if the region is outside the slice.
    pub fn read_region(&self, region: Region) -> Result<Vec<u32>, BufferError> {
        let len = usize::try_from(region.pixel_count()).map_err(|_| BufferError::InvalidDimensions)?;
        let mut out = vec![0u32; len];
        self.direct_read_region(region, &mut out, 0, region.width as usize)?;
        Ok(out)
    }
}

impl fmt::Debug for PixelSlice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PixelSlice({}x{}, stride {})",
            self.width, self.rows, self.stride
        )
    }
}

// ---------------------------------------------------------------------------
// PixelSliceMut (borrowed, mutable)
// ---------------------------------------------------------------------------

/// Mutable borrowed view of packed pixels.
///
/// Same layout as [`PixelSlice`]. A mutable view can be split into two
/// disjoint row bands with [`split_rows_mut`](Self::split_rows_mut), which
/// lets independent writers fill separate parts of one buffer.
pub struct PixelSliceMut<'a> {
    data: &'a mut [u32],
    width: u32,
    rows: u32,
    stride: usize,
}

impl<'a> PixelSliceMut<'a> {
    /// Create a new mutable pixel slice with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the stride is smaller than the width or the data
    /// cannot hold `rows` rows.
    pub fn new(
        data: &'a mut [u32],
        width: u32,
        rows: u32,
        stride: usize,
    ) -> Result<Self, BufferError> {
        check_layout(data.len(), width, rows, stride)?;
        Ok(Self {
            data,
            width,
            rows,
            stride,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows in this slice.
    #[inline]
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Pixel stride between row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of pixels (`width * rows`).
    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.rows as u64
    }

    /// Reborrow as an immutable view.
    pub fn as_slice(&self) -> PixelSlice<'_> {
        PixelSlice {
            data: &*self.data,
            width: self.width,
            rows: self.rows,
            stride: self.stride,
        }
    }

    /// Pixels of row `y` (immutable, no padding).
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    #[inline]
    pub fn row(&self, y: u32) -> &[u32] {
        assert!(
            y < self.rows,
            "row index {y} out of bounds (rows: {})",
            self.rows
        );
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }

    /// Mutable pixels of row `y` (no padding).
    ///
    /// # Panics
    ///
    /// Panics if `y >= rows`.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u32] {
        assert!(
            y < self.rows,
            "row index {y} out of bounds (rows: {})",
            self.rows
        );
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.width as usize]
    }

    /// Borrow a mutable sub-range of rows.
    ///
    /// # Panics
    ///
    /// Panics if `y + count > rows`.
    pub fn sub_rows_mut(&mut self, y: u32, count: u32) -> PixelSliceMut<'_> {
        let (start, end) = crop_range(self.width, self.rows, self.stride, 0, y, self.width, count);
        PixelSliceMut {
            data: &mut self.data[start..end],
            width: self.width,
            rows: count,
            stride: self.stride,
        }
    }

    /// Split into rows `[0, at)` and `[at, rows)`, each rebased to row 0.
    ///
    /// # Panics
    ///
    /// Panics if `at > rows`.
    pub fn split_rows_mut(self, at: u32) -> (PixelSliceMut<'a>, PixelSliceMut<'a>) {
        assert!(
            at <= self.rows,
            "split_rows_mut({at}) out of bounds (rows: {})",
            self.rows
        );
        // The last row may be stored without its trailing padding.
        let mid = (at as usize * self.stride).min(self.data.len());
        let (upper, lower) = self.data.split_at_mut(mid);
        (
            PixelSliceMut {
                data: upper,
                width: self.width,
                rows: at,
                stride: self.stride,
            },
            PixelSliceMut {
                data: lower,
                width: self.width,
                rows: self.rows - at,
                stride: self.stride,
            },
        )
    }

    /// Copy `region` into `out`, row `r` landing at `offset + r * scansize`.
    ///
    /// # Errors
    ///
    /// Fails without copying anything if the region is outside the slice or
    /// `out` cannot hold it.
    pub fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        self.as_slice()
            .direct_read_region(region, out, offset, scansize)
    }

    /// Copy pixels from `data` into `region`, row `r` taken from
    /// `offset + r * scansize`.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the region is outside the slice or
    /// `data` is too short.
    pub fn direct_write_region(
        &mut self,
        region: Region,
        data: &[u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        check_transfer(region, self.width, self.rows, data.len(), offset, scansize)?;
        if region.is_empty() {
            return Ok(());
        }
        let (x0, x1) = (region.x as usize, (region.x + region.width) as usize);
        for r in 0..region.height {
            let start = offset + r as usize * scansize;
            let src = &data[start..start + region.width as usize];
            self.row_mut(region.y + r)[x0..x1].copy_from_slice(src);
        }
        Ok(())
    }

    /// Copy a tightly packed `region.width * region.height` vector into
    /// `region`.
    ///
    /// # Errors
    ///
    /// Fails if the region is outside the slice or `data` is too short.
    pub fn write_region(&mut self, region: Region, data: &[u32]) -> Result<(), BufferError> {
        self.direct_write_region(region, data, 0, region.width as usize)
    }
}

impl fmt::Debug for PixelSliceMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PixelSliceMut({}x{}, stride {})",
            self.width, self.rows, self.stride
        )
    }
}

// ---------------------------------------------------------------------------
// PixelBuffer (owned)
// ---------------------------------------------------------------------------

/// Owned, tightly packed pixel buffer.
///
/// Holds exactly `width * height` packed `0xAARRGGBB` values in row-major
/// order. The size is fixed at construction; writes mutate pixels in place.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u32>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Allocate a buffer of transparent black pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0)
    }

    /// Allocate a buffer with every pixel set to `argb`.
    pub fn filled(width: u32, height: u32, argb: u32) -> Self {
        Self {
            data: vec![argb; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Wrap an existing row-major vector.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::LengthMismatch`] unless `data.len()` equals
    /// `width * height`.
    pub fn from_vec(data: Vec<u32>, width: u32, height: u32) -> Result<Self, BufferError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or(BufferError::InvalidDimensions)?;
        if data.len() != expected {
            return Err(BufferError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Pack an RGBA8 image.
    pub fn from_rgba8(img: ImgRef<'_, Rgba<u8>>) -> Self {
        let (width, height, stride) = (img.width(), img.height(), img.stride());
        let buf = img.buf();
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            let row = &buf[y * stride..y * stride + width];
            data.extend(row.iter().map(|&px| color::pack_rgba(px)));
        }
        Self {
            data,
            width: width as u32,
            height: height as u32,
        }
    }

    /// Unpack into an RGBA8 image.
    pub fn to_rgba8(&self) -> ImgVec<Rgba<u8>> {
        let pixels = self.data.iter().map(|&argb| color::unpack(argb)).collect();
        ImgVec::new(pixels, self.width as usize, self.height as usize)
    }

    /// Consume the buffer and return the backing vector.
    pub fn into_vec(self) -> Vec<u32> {
        self.data
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// All pixels in row-major order.
    #[inline]
    pub fn pixels(&self) -> &[u32] {
        &self.data
    }

    /// Packed pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate is out of bounds.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.as_slice().get(x, y)
    }

    /// Borrow the full buffer as an immutable [`PixelSlice`].
    pub fn as_slice(&self) -> PixelSlice<'_> {
        PixelSlice {
            data: &self.data,
            width: self.width,
            rows: self.height,
            stride: self.width as usize,
        }
    }

    /// Borrow the full buffer as a mutable [`PixelSliceMut`].
    pub fn as_slice_mut(&mut self) -> PixelSliceMut<'_> {
        PixelSliceMut {
            data: &mut self.data,
            width: self.width,
            rows: self.height,
            stride: self.width as usize,
        }
    }

    /// Zero-copy sub-region view (immutable).
    ///
    /// # Panics
    ///
    /// Panics if the crop region is out of bounds.
    pub fn crop_view(&self, x: u32, y: u32, w: u32, h: u32) -> PixelSlice<'_> {
        self.as_slice().crop_view(x, y, w, h)
    }

    /// Copy a sub-region into a new, tightly packed [`PixelBuffer`].
    ///
    /// # Panics
    ///
    /// Panics if the crop region is out of bounds.
    pub fn crop_copy(&self, x: u32, y: u32, w: u32, h: u32) -> PixelBuffer {
        let src = self.crop_view(x, y, w, h);
        let mut data = Vec::with_capacity(w as usize * h as usize);
        for row_y in 0..h {
            data.extend_from_slice(src.row(row_y));
        }
        PixelBuffer {
            data,
            width: w,
            height: h,
        }
    }

    /// See [`PixelSlice::direct_read_region`].
    pub fn direct_read_region(
        &self,
        region: Region,
        out: &mut [u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        self.as_slice()
            .direct_read_region(region, out, offset, scansize)
    }

    /// See [`PixelSliceMut::direct_write_region`].
    pub fn direct_write_region(
        &mut self,
        region: Region,
        data: &[u32],
        offset: usize,
        scansize: usize,
    ) -> Result<(), BufferError> {
        self.as_slice_mut()
            .direct_write_region(region, data, offset, scansize)
    }

    /// See [`PixelSlice::read_region`].
    pub fn read_region(&self, region: Region) -> Result<Vec<u32>, BufferError> {
        self.as_slice().read_region(region)
    }

    /// See [`PixelSliceMut::write_region`].
    pub fn write_region(&mut self, region: Region, data: &[u32]) -> Result<(), BufferError> {
        self.as_slice_mut().write_region(region, data)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PixelBuffer({}x{})", self.width, self.height)
    }
}

impl<'a> From<&'a PixelBuffer> for PixelSlice<'a> {
    fn from(buf: &'a PixelBuffer) -> Self {
        buf.as_slice()
    }
}

impl<'a> From<&'a mut PixelBuffer> for PixelSliceMut<'a> {
    fn from(buf: &'a mut PixelBuffer) -> Self {
        buf.as_slice_mut()
    }
}

impl<'a> From<PixelSliceMut<'a>> for PixelSlice<'a> {
    fn from(slice: PixelSliceMut<'a>) -> Self {
        PixelSlice {
            data: slice.data,
            width: slice.width,
            rows: slice.rows,
            stride: slice.stride,
        }
    }
}

// ---------------------------------------------------------------------------
// ImgRef → PixelSlice (zero-copy From impls)
// ---------------------------------------------------------------------------

impl<'a> From<ImgRef<'a, u32>> for PixelSlice<'a> {
    fn from(img: ImgRef<'a, u32>) -> Self {
        PixelSlice {
            data: img.buf(),
            width: img.width() as u32,
            rows: img.height() as u32,
            stride: img.stride(),
        }
    }
}

impl<'a> From<ImgRefMut<'a, u32>> for PixelSliceMut<'a> {
    fn from(img: ImgRefMut<'a, u32>) -> Self {
        let width = img.width() as u32;
        let rows = img.height() as u32;
        let stride = img.stride();
        PixelSliceMut {
            data: img.into_buf(),
            width,
            rows,
            stride,
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Minimum pixels needed: `(rows - 1) * stride + width`.
fn check_layout(len: usize, width: u32, rows: u32, stride: usize) -> Result<(), BufferError> {
    if stride < width as usize {
        return Err(BufferError::StrideTooSmall);
    }
    if rows > 0 {
        let required = (rows as usize - 1)
            .checked_mul(stride)
            .and_then(|preceding| preceding.checked_add(width as usize))
            .ok_or(BufferError::InvalidDimensions)?;
        if len < required {
            return Err(BufferError::InsufficientData);
        }
    }
    Ok(())
}

/// Data range `start..end` covering a crop of a strided grid.
#[allow(clippy::too_many_arguments)]
fn crop_range(
    width: u32,
    rows: u32,
    stride: usize,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> (usize, usize) {
    assert!(
        x.checked_add(w).is_some_and(|end| end <= width),
        "crop x={x} w={w} exceeds width {width}"
    );
    assert!(
        y.checked_add(h).is_some_and(|end| end <= rows),
        "crop y={y} h={h} exceeds rows {rows}"
    );
    if h == 0 || w == 0 {
        return (0, 0);
    }
    let start = y as usize * stride + x as usize;
    let end = (y as usize + h as usize - 1) * stride + (x + w) as usize;
    (start, end)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

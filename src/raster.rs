//! In-memory raster: an `f32` grid plus a validity mask.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::LercError;
use crate::mask::BitMask;

/// Largest width or height the format accepts.
pub(crate) const MAX_DIM: usize = 20_000;
/// Pixel-count ceiling carried by the format (a quarter of 1.8 GB).
pub(crate) const MAX_PIXELS: usize = 1_800_000_000 / 4;

/// Reject dimensions beyond the format's caps. Zero dimensions are the
/// caller's to reject, with an error naming where they came from.
pub(crate) fn check_dims(width: usize, height: usize) -> Result<(), LercError> {
    if width > MAX_DIM || height > MAX_DIM || width.saturating_mul(height) > MAX_PIXELS {
        return Err(LercError::DimensionsTooLarge { width, height });
    }
    Ok(())
}

/// A `height` by `width` grid of `f32` samples with per-pixel validity.
///
/// Values at invalid pixels are carried but never serialized; a fresh
/// raster starts zeroed and all-invalid.
#[derive(Clone, Debug, PartialEq)]
pub struct Lerc1Raster {
    width: usize,
    height: usize,
    values: Vec<f32>,
    mask: BitMask,
}

impl Lerc1Raster {
    /// Zeroed, all-invalid raster.
    pub fn new(width: usize, height: usize) -> Result<Self, LercError> {
        if width == 0 || height == 0 {
            return Err(LercError::InvalidParameter(
                "raster dimensions must be nonzero".into(),
            ));
        }
        check_dims(width, height)?;
        Ok(Self {
            width,
            height,
            values: vec![0.0; width * height],
            mask: BitMask::new(width * height),
        })
    }

    /// All-valid raster over row-major `values`.
    pub fn from_values(width: usize, height: usize, values: Vec<f32>) -> Result<Self, LercError> {
        if width == 0 || height == 0 {
            return Err(LercError::InvalidParameter(
                "raster dimensions must be nonzero".into(),
            ));
        }
        check_dims(width, height)?;
        if values.len() != width * height {
            return Err(LercError::InvalidParameter(alloc::format!(
                "expected {} values for {}x{}, got {}",
                width * height,
                width,
                height,
                values.len()
            )));
        }
        let mut mask = BitMask::new(width * height);
        mask.fill(true);
        Ok(Self {
            width,
            height,
            values,
            mask,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_pixels(&self) -> usize {
        self.width * self.height
    }

    /// Sample at `(row, col)`, regardless of validity.
    ///
    /// Panics if out of range.
    pub fn value(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.height && col < self.width);
        self.values[row * self.width + col]
    }

    /// Panics if out of range.
    pub fn set_value(&mut self, row: usize, col: usize, value: f32) {
        assert!(row < self.height && col < self.width);
        self.values[row * self.width + col] = value;
    }

    /// Panics if out of range.
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        assert!(row < self.height && col < self.width);
        self.mask.get(row * self.width + col)
    }

    /// Panics if out of range.
    pub fn set_valid(&mut self, row: usize, col: usize, valid: bool) {
        assert!(row < self.height && col < self.width);
        self.mask.set(row * self.width + col, valid);
    }

    /// Row-major sample buffer.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn mask(&self) -> &BitMask {
        &self.mask
    }

    pub(crate) fn mask_mut(&mut self) -> &mut BitMask {
        &mut self.mask
    }

    /// Borrow the samples as a 2D view.
    #[cfg(feature = "imgref")]
    pub fn as_imgref(&self) -> imgref::ImgRef<'_, f32> {
        imgref::ImgRef::new(&self.values, self.width, self.height)
    }

    /// Copy the samples into an owned 2D buffer.
    #[cfg(feature = "imgref")]
    pub fn to_imgvec(&self) -> imgref::ImgVec<f32> {
        imgref::ImgVec::new(self.values.clone(), self.width, self.height)
    }
}

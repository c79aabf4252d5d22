//! Stream encoding.
//!
//! A stream is the fixed header followed by a mask part and a value
//! part, each opening with tile counts, a byte count, and a value
//! maximum. Encoding plans both parts first, then writes; the plan's
//! byte counts go into the part fields, and a write that strays from
//! its plan is an error, not a corrupt stream.

use alloc::vec::Vec;

use enough::Stop;

use crate::error::LercError;
use crate::info::{HEADER_BYTES, PART_FIXED_BYTES, SIGNATURE, TYPE_FLOAT, VERSION};
use crate::raster::Lerc1Raster;
use crate::tiling;

/// Byte count of an encoded stream whose pixels are all invalid,
/// regardless of dimensions.
pub const fn void_encoded_size() -> usize {
    // constant mask part, value part holding one all-zero tile
    HEADER_BYTES + PART_FIXED_BYTES + (PART_FIXED_BYTES + 1)
}

/// Encoder configuration, builder style.
///
/// ```
/// use zenlerc::{EncodeRequest, Lerc1Raster, Unstoppable};
///
/// let img = Lerc1Raster::from_values(2, 2, vec![1.0, 2.0, 3.0, 4.0])?;
/// let bytes = EncodeRequest::new(0.01).encode(&img, Unstoppable)?;
/// # Ok::<(), zenlerc::LercError>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct EncodeRequest {
    max_z_error: f64,
    values_only: bool,
}

impl EncodeRequest {
    /// Start a request with the given absolute error bound.
    ///
    /// A bound of zero keeps values bit exact.
    pub fn new(max_z_error: f64) -> Self {
        Self {
            max_z_error,
            values_only: false,
        }
    }

    /// Emit the header and value part but no mask part. The decoder must
    /// already hold a raster with the right dimensions and mask.
    pub fn values_only(mut self, values_only: bool) -> Self {
        self.values_only = values_only;
        self
    }

    /// Exact byte count [`encode`](Self::encode) will produce.
    pub fn estimated_size(&self, img: &Lerc1Raster, stop: impl Stop) -> Result<usize, LercError> {
        Ok(self.plan(img, &stop)?.total_bytes)
    }

    /// Serialize `img` into a fresh byte vector.
    pub fn encode(&self, img: &Lerc1Raster, stop: impl Stop) -> Result<Vec<u8>, LercError> {
        let plan = self.plan(img, &stop)?;
        encode_stream(img, self.max_z_error, &plan, &stop)
    }

    fn plan(&self, img: &Lerc1Raster, stop: &dyn Stop) -> Result<EncodePlan, LercError> {
        validate_error(self.max_z_error)?;
        let mask_part = if self.values_only {
            None
        } else {
            Some(plan_mask_part(img))
        };
        let mut scratch = Vec::new();
        let tiling = tiling::find_tiling(img, self.max_z_error, &mut scratch, stop)?;
        let value_part = PartPlan {
            tiles_vert: tiling.tiles_vert,
            tiles_hori: tiling.tiles_hori,
            num_bytes: tiling.num_bytes,
            max_val: tiling.max_val,
        };
        let mut total_bytes = HEADER_BYTES + PART_FIXED_BYTES + value_part.num_bytes;
        if let Some(part) = &mask_part {
            total_bytes += PART_FIXED_BYTES + part.num_bytes;
        }
        Ok(EncodePlan {
            mask_part,
            value_part,
            total_bytes,
        })
    }
}

/// One part's fixed fields plus its planned payload size.
struct PartPlan {
    tiles_vert: usize,
    tiles_hori: usize,
    num_bytes: usize,
    max_val: f32,
}

struct EncodePlan {
    mask_part: Option<PartPlan>,
    value_part: PartPlan,
    total_bytes: usize,
}

fn validate_error(max_z_error: f64) -> Result<(), LercError> {
    if !max_z_error.is_finite() || max_z_error < 0.0 {
        return Err(LercError::InvalidParameter(alloc::format!(
            "max_z_error must be finite and non-negative, got {max_z_error}"
        )));
    }
    Ok(())
}

/// The mask part is never tiled: a constant mask is carried entirely by
/// its value-maximum field, anything else as RLE bytes.
fn plan_mask_part(img: &Lerc1Raster) -> PartPlan {
    let (num_bytes, max_val) = match img.mask().is_constant() {
        Some(false) => (0, 0.0),
        Some(true) => (0, 1.0),
        None => (img.mask().rle_size(), 1.0),
    };
    PartPlan {
        tiles_vert: 0,
        tiles_hori: 0,
        num_bytes,
        max_val,
    }
}

fn write_part_fields(out: &mut Vec<u8>, part: &PartPlan) {
    out.extend_from_slice(&(part.tiles_vert as i32).to_le_bytes());
    out.extend_from_slice(&(part.tiles_hori as i32).to_le_bytes());
    out.extend_from_slice(&(part.num_bytes as i32).to_le_bytes());
    out.extend_from_slice(&part.max_val.to_le_bytes());
}

fn encode_stream(
    img: &Lerc1Raster,
    max_z_error: f64,
    plan: &EncodePlan,
    stop: &dyn Stop,
) -> Result<Vec<u8>, LercError> {
    let mut out = Vec::with_capacity(plan.total_bytes);
    out.extend_from_slice(SIGNATURE);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&TYPE_FLOAT.to_le_bytes());
    out.extend_from_slice(&(img.height() as i32).to_le_bytes());
    out.extend_from_slice(&(img.width() as i32).to_le_bytes());
    out.extend_from_slice(&max_z_error.to_le_bytes());

    if let Some(mask_plan) = &plan.mask_part {
        write_part_fields(&mut out, mask_plan);
        if mask_plan.num_bytes > 0 {
            let before = out.len();
            img.mask().rle_compress(&mut out);
            let written = out.len() - before;
            if written != mask_plan.num_bytes {
                return Err(LercError::SizeMismatch {
                    expected: mask_plan.num_bytes,
                    actual: written,
                });
            }
        }
    }

    write_part_fields(&mut out, &plan.value_part);
    let before = out.len();
    let mut scratch = Vec::new();
    tiling::sweep_tiles(
        img,
        max_z_error,
        plan.value_part.tiles_vert,
        plan.value_part.tiles_hori,
        Some(&mut out),
        &mut scratch,
        stop,
    )?;
    let written = out.len() - before;
    if written != plan.value_part.num_bytes {
        return Err(LercError::SizeMismatch {
            expected: plan.value_part.num_bytes,
            actual: written,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use enough::Unstoppable;

    #[test]
    fn void_image_takes_67_bytes() {
        assert_eq!(void_encoded_size(), 67);
        let img = Lerc1Raster::new(1, 1).unwrap();
        let bytes = EncodeRequest::new(0.1).encode(&img, Unstoppable).unwrap();
        assert_eq!(bytes.len(), void_encoded_size());
        // single all-zero tile closes the stream
        assert_eq!(*bytes.last().unwrap(), 2);

        let big = Lerc1Raster::new(200, 100).unwrap();
        let bytes = EncodeRequest::new(0.1).encode(&big, Unstoppable).unwrap();
        assert_eq!(bytes.len(), void_encoded_size());
    }

    #[test]
    fn header_stores_height_before_width() {
        let img = Lerc1Raster::from_values(3, 2, vec![1.0; 6]).unwrap();
        let bytes = EncodeRequest::new(0.25).encode(&img, Unstoppable).unwrap();
        assert_eq!(&bytes[..10], b"CntZImage ");
        assert_eq!(&bytes[10..14], &11i32.to_le_bytes());
        assert_eq!(&bytes[14..18], &8i32.to_le_bytes());
        assert_eq!(&bytes[18..22], &2i32.to_le_bytes()); // height
        assert_eq!(&bytes[22..26], &3i32.to_le_bytes()); // width
        assert_eq!(&bytes[26..34], &0.25f64.to_le_bytes());
    }

    #[test]
    fn estimated_size_is_exact() {
        let values: Vec<f32> = (0..600).map(|i| (i % 37) as f32 * 0.21).collect();
        let mut img = Lerc1Raster::from_values(30, 20, values).unwrap();
        img.set_valid(4, 7, false);
        img.set_valid(19, 0, false);
        for values_only in [false, true] {
            let req = EncodeRequest::new(0.05).values_only(values_only);
            let estimated = req.estimated_size(&img, Unstoppable).unwrap();
            let bytes = req.encode(&img, Unstoppable).unwrap();
            assert_eq!(bytes.len(), estimated, "values_only={values_only}");
        }
    }

    #[test]
    fn values_only_stream_has_no_mask_part() {
        let img = Lerc1Raster::from_values(2, 2, vec![5.0; 4]).unwrap();
        let full = EncodeRequest::new(0.01).encode(&img, Unstoppable).unwrap();
        let bare = EncodeRequest::new(0.01)
            .values_only(true)
            .encode(&img, Unstoppable)
            .unwrap();
        assert_eq!(full.len(), bare.len() + PART_FIXED_BYTES);
        // value part is identical in both
        assert_eq!(
            &full[HEADER_BYTES + PART_FIXED_BYTES..],
            &bare[HEADER_BYTES..]
        );
    }

    #[test]
    fn rejects_bad_error_bounds() {
        let img = Lerc1Raster::new(2, 2).unwrap();
        for e in [f64::NAN, f64::INFINITY, -0.5] {
            assert!(matches!(
                EncodeRequest::new(e).encode(&img, Unstoppable),
                Err(LercError::InvalidParameter(_))
            ));
        }
    }
}

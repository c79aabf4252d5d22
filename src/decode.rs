//! Stream decoding.
//!
//! Decoding parses and validates the header, sizes the raster, then
//! reads the mask part and the value part. Each part declares its own
//! byte count; bytes past a part's payload (or past the value part) are
//! ignored, matching encoders that pad their output.

use alloc::vec::Vec;

use enough::Stop;

use crate::cursor::Cursor;
use crate::error::LercError;
use crate::info::{self, Lerc1Info};
use crate::limits::Limits;
use crate::raster::Lerc1Raster;
use crate::tiling;

/// Decoder configuration, builder style.
///
/// ```
/// use zenlerc::{encode, DecodeRequest, Lerc1Raster, Limits, Unstoppable};
///
/// let img = Lerc1Raster::from_values(2, 2, vec![1.0, 2.0, 3.0, 4.0])?;
/// let bytes = encode(&img, 0.0, Unstoppable)?;
///
/// let limits = Limits {
///     max_width: Some(1 << 12),
///     max_height: Some(1 << 12),
///     ..Limits::default()
/// };
/// let out = DecodeRequest::new(&bytes)
///     .with_limits(&limits)
///     .decode(Unstoppable)?;
/// assert_eq!(out.values(), img.values());
/// # Ok::<(), zenlerc::LercError>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    limits: Option<&'a Limits>,
    max_z_error: f64,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            limits: None,
            max_z_error: f64::INFINITY,
        }
    }

    /// Bound dimensions and decoded-raster memory before any allocation.
    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Reject streams encoded with a larger error bound than this.
    /// The default accepts any bound.
    pub fn with_max_error(mut self, max_z_error: f64) -> Self {
        self.max_z_error = max_z_error;
        self
    }

    /// Decode a full stream into a fresh raster.
    pub fn decode(&self, stop: impl Stop) -> Result<Lerc1Raster, LercError> {
        let mut cur = Cursor::new(self.data);
        let header = info::parse_header(&mut cur)?;
        if let Some(limits) = self.limits {
            limits.check(header.width, header.height)?;
            limits.check_memory(raster_bytes(header.width, header.height))?;
        }
        self.check_tolerance(&header)?;
        stop.check()?;

        let mut img = Lerc1Raster::new(header.width, header.height)?;
        read_mask_part(&mut cur, &mut img)?;
        read_value_part(&mut cur, &mut img, header.max_z_error, &stop)?;
        Ok(img)
    }

    /// Decode a values-only stream into an existing raster.
    ///
    /// The stream's dimensions must match the raster's. Only pixels the
    /// raster's current mask marks valid receive values (constant tiles
    /// still fill whole rectangles); the mask itself is untouched.
    pub fn decode_values_into(
        &self,
        img: &mut Lerc1Raster,
        stop: impl Stop,
    ) -> Result<(), LercError> {
        let mut cur = Cursor::new(self.data);
        let header = info::parse_header(&mut cur)?;
        if header.width != img.width() || header.height != img.height() {
            return Err(LercError::InvalidHeader(alloc::format!(
                "stream is {}x{}, raster is {}x{}",
                header.width,
                header.height,
                img.width(),
                img.height()
            )));
        }
        if let Some(limits) = self.limits {
            limits.check(header.width, header.height)?;
        }
        self.check_tolerance(&header)?;
        stop.check()?;
        read_value_part(&mut cur, img, header.max_z_error, &stop)
    }

    fn check_tolerance(&self, header: &Lerc1Info) -> Result<(), LercError> {
        if header.max_z_error > self.max_z_error {
            return Err(LercError::LimitExceeded(alloc::format!(
                "stream error bound {} exceeds permitted {}",
                header.max_z_error,
                self.max_z_error
            )));
        }
        Ok(())
    }
}

/// Values plus one mask bit per pixel.
fn raster_bytes(width: usize, height: usize) -> usize {
    let pixels = width * height;
    pixels * 4 + pixels.div_ceil(8)
}

struct PartFields {
    tiles_vert: i32,
    tiles_hori: i32,
    num_bytes: usize,
    max_val: f32,
}

fn read_part_fields(cur: &mut Cursor<'_>) -> Result<PartFields, LercError> {
    let tiles_vert = cur.read_i32()?;
    let tiles_hori = cur.read_i32()?;
    let num_bytes = cur.read_i32()?;
    let max_val = cur.read_f32()?;
    if num_bytes < 0 {
        return Err(LercError::InvalidData("negative part byte count".into()));
    }
    Ok(PartFields {
        tiles_vert,
        tiles_hori,
        num_bytes: num_bytes as usize,
        max_val,
    })
}

fn read_mask_part(cur: &mut Cursor<'_>, img: &mut Lerc1Raster) -> Result<(), LercError> {
    let fields = read_part_fields(cur)?;
    if fields.tiles_vert != 0 && fields.tiles_hori != 0 {
        return Err(LercError::InvalidData("mask part must not be tiled".into()));
    }
    let payload = cur.read_bytes(fields.num_bytes)?;
    if fields.num_bytes == 0 {
        // constant mask, carried by the value-maximum field
        if fields.max_val != 0.0 && fields.max_val != 1.0 {
            return Err(LercError::InvalidData(
                "constant mask value must be 0 or 1".into(),
            ));
        }
        img.mask_mut().fill(fields.max_val != 0.0);
    } else {
        img.mask_mut().rle_decompress(payload)?;
    }
    Ok(())
}

fn read_value_part(
    cur: &mut Cursor<'_>,
    img: &mut Lerc1Raster,
    max_z_error_in_file: f64,
    stop: &dyn Stop,
) -> Result<(), LercError> {
    let fields = read_part_fields(cur)?;
    if fields.tiles_vert <= 0 || fields.tiles_hori <= 0 {
        return Err(LercError::InvalidData(
            "value part needs positive tile counts".into(),
        ));
    }
    let mut part = cur.take(fields.num_bytes)?;
    let mut scratch = Vec::new();
    tiling::read_tiles(
        &mut part,
        img,
        max_z_error_in_file,
        fields.tiles_vert as usize,
        fields.tiles_hori as usize,
        fields.max_val,
        &mut scratch,
        stop,
    )
}

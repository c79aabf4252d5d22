//! Per-tile value coding.
//!
//! Each tile opens with a tag byte: the low 6 bits pick one of four
//! storages, the top 2 give the byte width of the minimum-value field
//! where one follows. A tile stores either nothing (all zero, or all
//! equal to a minimum written once), raw `f32` values, or quantized
//! offsets above the minimum, bit packed.

use core::ops::Range;

use alloc::vec::Vec;

use enough::Stop;

use crate::bitstuff::{self, FieldWidth};
use crate::cursor::Cursor;
use crate::error::LercError;
use crate::raster::Lerc1Raster;

/// Quantization ceiling: spans needing more steps than this store raw.
const MAX_QUANT: f64 = (1 << 24) as f64;

const TAG_RAW: u8 = 0;
const TAG_PACKED: u8 = 1;
const TAG_CONST_ZERO: u8 = 2;
const TAG_CONST_MIN: u8 = 3;

/// Value statistics over one tile's valid pixels.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TileStats {
    pub z_min: f32,
    pub z_max: f32,
    pub num_valid: usize,
    pub num_finite: usize,
}

pub(crate) fn compute_stats(
    img: &Lerc1Raster,
    rows: Range<usize>,
    cols: Range<usize>,
    stop: &dyn Stop,
) -> Result<TileStats, LercError> {
    let mut z_min = f32::MAX;
    let mut z_max = f32::MIN;
    let mut num_valid = 0;
    let mut num_finite = 0;
    for row in rows {
        if row % 16 == 0 {
            stop.check()?;
        }
        for col in cols.clone() {
            if img.is_valid(row, col) {
                num_valid += 1;
                let val = img.value(row, col);
                if val.is_finite() {
                    num_finite += 1;
                } else {
                    // a non-finite minimum flags the tile for raw storage
                    z_min = f32::NAN;
                }
                if val < z_min {
                    z_min = val;
                }
                if val > z_max {
                    z_max = val;
                }
            }
        }
    }
    if num_valid == 0 {
        z_min = 0.0;
        z_max = 0.0;
    }
    Ok(TileStats {
        z_min,
        z_max,
        num_valid,
        num_finite,
    })
}

/// How one tile's values go on the wire.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TileScheme {
    /// Every pixel in the tile decodes to zero; one tag byte.
    ConstZero,
    /// One raw `f32` per valid pixel.
    Raw,
    /// Every pixel in the tile decodes to `min`.
    ConstMin { min: f32, width: FieldWidth },
    /// Quantized offsets above `min`, packed at `bit_width` bits each.
    Packed {
        min: f32,
        width: FieldWidth,
        bit_width: usize,
    },
}

/// Exact byte count [`write_tile`] emits for `scheme`.
pub(crate) fn scheme_size(scheme: TileScheme, num_valid: usize) -> usize {
    match scheme {
        TileScheme::ConstZero => 1,
        TileScheme::Raw => 1 + 4 * num_valid,
        TileScheme::ConstMin { width, .. } => 1 + width.num_bytes(),
        TileScheme::Packed {
            width, bit_width, ..
        } => 1 + width.num_bytes() + bitstuff::block_size(num_valid, bit_width),
    }
}

/// Pick a storage for the given value range and error bound.
///
/// Both the size estimate and the write derive from the scheme chosen
/// here, so the two can never disagree.
fn classify(z_min: f32, z_max: f32, max_z_error: f64) -> TileScheme {
    if z_min == 0.0 && z_max == 0.0 {
        return TileScheme::ConstZero;
    }
    if max_z_error == 0.0
        || !z_min.is_finite()
        || !z_max.is_finite()
        || (f64::from(z_max) - f64::from(z_min)) / (2.0 * max_z_error) > MAX_QUANT
    {
        return TileScheme::Raw;
    }
    let scale = 0.5 / max_z_error;
    let max_elem = ((f64::from(z_max) - f64::from(z_min)) * scale + 0.5) as u32;
    if max_elem == 0 {
        TileScheme::ConstMin {
            min: z_min,
            width: flt_width(z_min),
        }
    } else {
        TileScheme::Packed {
            min: z_min,
            width: flt_width(z_min),
            bit_width: bitstuff::num_bits(max_elem),
        }
    }
}

/// Choose the smallest storage for one tile.
pub(crate) fn plan_tile(
    img: &Lerc1Raster,
    rows: Range<usize>,
    cols: Range<usize>,
    stats: TileStats,
    max_z_error: f64,
    stop: &dyn Stop,
) -> Result<TileScheme, LercError> {
    let area = rows.len() * cols.len();
    if stats.num_finite == 0 && stats.num_valid == area {
        // a full tile of one non-finite bit pattern stores as a fill
        if let Some(pattern) = uniform_bits(img, rows.clone(), cols.clone(), stop)? {
            return Ok(TileScheme::ConstMin {
                min: pattern,
                width: FieldWidth::Four,
            });
        }
    }

    let best = classify(stats.z_min, stats.z_max, max_z_error);
    let best_size = scheme_size(best, stats.num_valid);

    // moving the minimum up by almost the error bound may need fewer bytes
    let zm = (f64::from(stats.z_min) + 0.999999 * max_z_error) as f32;
    if stats.num_finite == stats.num_valid && zm <= stats.z_max {
        let mut cand = classify(zm, stats.z_max, max_z_error);
        let mut cand_size = scheme_size(cand, stats.num_valid);
        // an integral minimum can shrink the minimum-value field
        let fl = floorf(zm);
        if stats.z_min < fl {
            let int_cand = classify(fl, stats.z_max, max_z_error);
            let int_size = scheme_size(int_cand, stats.num_valid);
            if int_size < cand_size {
                cand = int_cand;
                cand_size = int_size;
            }
        }
        if cand_size < best_size {
            return Ok(cand);
        }
    }
    Ok(best)
}

/// Serialize one tile the way its scheme prescribes.
pub(crate) fn write_tile(
    out: &mut Vec<u8>,
    img: &Lerc1Raster,
    rows: Range<usize>,
    cols: Range<usize>,
    scheme: TileScheme,
    max_z_error: f64,
    scratch: &mut Vec<u32>,
    stop: &dyn Stop,
) -> Result<(), LercError> {
    match scheme {
        TileScheme::ConstZero => out.push(TAG_CONST_ZERO),
        TileScheme::Raw => {
            out.push(TAG_RAW);
            for row in rows {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for col in cols.clone() {
                    if img.is_valid(row, col) {
                        out.extend_from_slice(&img.value(row, col).to_le_bytes());
                    }
                }
            }
        }
        TileScheme::ConstMin { min, width } => {
            out.push(TAG_CONST_MIN | width.tag_bits());
            write_flt(out, min, width);
        }
        TileScheme::Packed {
            min,
            width,
            bit_width,
        } => {
            out.push(TAG_PACKED | width.tag_bits());
            write_flt(out, min, width);
            let scale = 0.5 / max_z_error;
            scratch.clear();
            for row in rows {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for col in cols.clone() {
                    if img.is_valid(row, col) {
                        scratch.push(quantize(img.value(row, col), min, scale));
                    }
                }
            }
            bitstuff::write_block(out, scratch, bit_width);
        }
    }
    Ok(())
}

/// Deserialize one tile into the raster.
///
/// Constant tiles fill the whole rectangle regardless of the mask; raw
/// and packed tiles touch only valid pixels. Packed values clamp to the
/// stream's recorded maximum.
pub(crate) fn read_tile(
    cur: &mut Cursor<'_>,
    img: &mut Lerc1Raster,
    rows: Range<usize>,
    cols: Range<usize>,
    max_z_error_in_file: f64,
    max_z_in_img: f32,
    scratch: &mut Vec<u32>,
    stop: &dyn Stop,
) -> Result<(), LercError> {
    let header = cur.read_u8()?;
    let width = FieldWidth::from_tag_bits(header)?;
    let tag = header & 0x3f;
    match tag {
        TAG_CONST_ZERO => {
            for row in rows {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for col in cols.clone() {
                    img.set_value(row, col, 0.0);
                }
            }
        }
        TAG_RAW => {
            for row in rows {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for col in cols.clone() {
                    if img.is_valid(row, col) {
                        let v = cur.read_f32()?;
                        img.set_value(row, col, v);
                    }
                }
            }
        }
        TAG_CONST_MIN => {
            let min = read_flt(cur, width)?;
            for row in rows {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for col in cols.clone() {
                    img.set_value(row, col, min);
                }
            }
        }
        TAG_PACKED => {
            let min = read_flt(cur, width)?;
            bitstuff::read_block(cur, rows.len() * cols.len(), scratch)?;
            let quanta = 2.0 * max_z_error_in_file;
            let mut i = 0;
            for row in rows {
                if row % 16 == 0 {
                    stop.check()?;
                }
                for col in cols.clone() {
                    if img.is_valid(row, col) {
                        if i >= scratch.len() {
                            return Err(LercError::InvalidData(
                                "packed tile holds fewer offsets than valid pixels".into(),
                            ));
                        }
                        let v = (f64::from(min) + quanta * f64::from(scratch[i])) as f32;
                        i += 1;
                        img.set_value(row, col, if v < max_z_in_img { v } else { max_z_in_img });
                    }
                }
            }
            if i != scratch.len() {
                return Err(LercError::InvalidData(
                    "packed tile holds more offsets than valid pixels".into(),
                ));
            }
        }
        _ => return Err(LercError::InvalidData("unknown tile tag".into())),
    }
    Ok(())
}

fn quantize(z: f32, min: f32, scale: f64) -> u32 {
    ((f64::from(z) - f64::from(min)) * scale + 0.5) as u32
}

/// `true` when every pixel in the rectangle shares one bit pattern.
fn uniform_bits(
    img: &Lerc1Raster,
    rows: Range<usize>,
    cols: Range<usize>,
    stop: &dyn Stop,
) -> Result<Option<f32>, LercError> {
    let first = img.value(rows.start, cols.start);
    let bits = first.to_bits();
    for row in rows {
        if row % 16 == 0 {
            stop.check()?;
        }
        for col in cols.clone() {
            if img.value(row, col).to_bits() != bits {
                return Ok(None);
            }
        }
    }
    Ok(Some(first))
}

/// Narrowest field for a minimum value: small exact integers shrink to
/// one or two bytes, everything else stays a full `f32`.
fn flt_width(z: f32) -> FieldWidth {
    if !z.is_finite() || z > 32767.0 || z < -32768.0 || z != f32::from(z as i16) {
        FieldWidth::Four
    } else if z > 127.0 || z < -128.0 {
        FieldWidth::Two
    } else {
        FieldWidth::One
    }
}

fn write_flt(out: &mut Vec<u8>, z: f32, width: FieldWidth) {
    match width {
        FieldWidth::One => out.push(z as i8 as u8),
        FieldWidth::Two => out.extend_from_slice(&(z as i16).to_le_bytes()),
        FieldWidth::Four => out.extend_from_slice(&z.to_le_bytes()),
    }
}

fn read_flt(cur: &mut Cursor<'_>, width: FieldWidth) -> Result<f32, LercError> {
    Ok(match width {
        FieldWidth::One => f32::from(cur.read_u8()? as i8),
        FieldWidth::Two => f32::from(cur.read_i16()?),
        FieldWidth::Four => cur.read_f32()?,
    })
}

/// `floor` without `std`. Exact: any float of magnitude 2^23 or more is
/// already integral.
fn floorf(z: f32) -> f32 {
    if !z.is_finite() || z >= 8_388_608.0 || z <= -8_388_608.0 {
        return z;
    }
    let t = z as i32 as f32;
    if t > z { t - 1.0 } else { t }
}

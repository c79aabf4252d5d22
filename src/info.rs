//! Fixed stream header: signature, version, pixel type, dimensions, and
//! the error bound the stream was encoded with. Height precedes width on
//! the wire.

use crate::cursor::Cursor;
use crate::error::LercError;
use crate::raster;

pub(crate) const SIGNATURE: &[u8; 10] = b"CntZImage ";
pub(crate) const VERSION: i32 = 11;
pub(crate) const TYPE_FLOAT: i32 = 8;
/// Signature, version, type, height, width, error bound.
pub(crate) const HEADER_BYTES: usize = 10 + 4 + 4 + 4 + 4 + 8;
/// Tile counts, byte count, and value maximum opening each part.
pub(crate) const PART_FIXED_BYTES: usize = 4 + 4 + 4 + 4;

/// Header fields of an encoded stream.
///
/// Obtained via [`Lerc1Info::from_bytes`] to size buffers or reject
/// streams before decoding anything.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lerc1Info {
    pub width: usize,
    pub height: usize,
    /// Error bound the stream was encoded with.
    pub max_z_error: f64,
}

impl Lerc1Info {
    /// Parse and validate the fixed header without touching the payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LercError> {
        let mut cur = Cursor::new(data);
        parse_header(&mut cur)
    }
}

pub(crate) fn parse_header(cur: &mut Cursor<'_>) -> Result<Lerc1Info, LercError> {
    if cur.read_bytes(SIGNATURE.len())? != SIGNATURE {
        return Err(LercError::UnrecognizedFormat);
    }
    let version = cur.read_i32()?;
    let type_code = cur.read_i32()?;
    let height = cur.read_i32()?;
    let width = cur.read_i32()?;
    let max_z_error = cur.read_f64()?;
    if version != VERSION {
        return Err(LercError::InvalidHeader(alloc::format!(
            "unsupported version {version}"
        )));
    }
    if type_code != TYPE_FLOAT {
        return Err(LercError::InvalidHeader(alloc::format!(
            "unsupported pixel type {type_code}"
        )));
    }
    if width <= 0 || height <= 0 {
        return Err(LercError::InvalidHeader("nonpositive dimensions".into()));
    }
    let (width, height) = (width as usize, height as usize);
    raster::check_dims(width, height)?;
    Ok(Lerc1Info {
        width,
        height,
        max_z_error,
    })
}

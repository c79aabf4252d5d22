//! # zenlerc
//!
//! LERC1 ("CntZImage") raster codec: error-bounded compression of `f32`
//! grids with per-pixel validity masks.
//!
//! Every valid sample decodes to within the caller's absolute error
//! bound `max_z_error`; a bound of zero keeps values bit exact. The
//! validity mask always survives exactly. Each tile picks the cheapest
//! of four storages (all zero, constant, bit-packed offsets, raw
//! floats), so flat regions cost almost nothing.
//!
//! ## Non-Goals
//!
//! - Later LERC versions (multi-band, integer pixel types, LERC2 headers)
//! - Georeferencing and container metadata; this crate moves pixels only
//!
//! ## Usage
//!
//! ```
//! use zenlerc::{decode, encode, Lerc1Raster, Unstoppable};
//!
//! let values: Vec<f32> = (0..30 * 20).map(|i| (i % 37) as f32 * 0.25).collect();
//! let mut img = Lerc1Raster::from_values(30, 20, values)?;
//! img.set_valid(3, 4, false); // mark a pixel as missing
//!
//! let bytes = encode(&img, 0.01, Unstoppable)?;
//! let out = decode(&bytes, Unstoppable)?;
//!
//! assert_eq!(out.mask(), img.mask());
//! assert!((out.value(0, 5) - img.value(0, 5)).abs() <= 0.01);
//! # Ok::<(), zenlerc::LercError>(())
//! ```
//!
//! ## Credits
//!
//! The format is Esri's LERC version 1 as carried by GDAL's MRF driver;
//! streams written here decode with those readers and vice versa.

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::vec::Vec;

mod bitstuff;
mod cursor;
mod decode;
mod encode;
mod error;
mod info;
mod limits;
mod mask;
mod raster;
mod tile;
mod tiling;

// Re-exports
pub use decode::DecodeRequest;
pub use encode::{EncodeRequest, void_encoded_size};
pub use enough::{Stop, Unstoppable};
pub use error::LercError;
pub use info::Lerc1Info;
pub use limits::Limits;
pub use mask::BitMask;
pub use raster::Lerc1Raster;

/// Encode `img` under the given absolute error bound.
pub fn encode(img: &Lerc1Raster, max_z_error: f64, stop: impl Stop) -> Result<Vec<u8>, LercError> {
    EncodeRequest::new(max_z_error).encode(img, stop)
}

/// Exact encoded byte count without writing the stream.
pub fn estimate_encoded_size(
    img: &Lerc1Raster,
    max_z_error: f64,
    stop: impl Stop,
) -> Result<usize, LercError> {
    EncodeRequest::new(max_z_error).estimated_size(img, stop)
}

/// Decode a stream into a fresh raster.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<Lerc1Raster, LercError> {
    DecodeRequest::new(data).decode(stop)
}

/// Decode with dimension and memory limits enforced before allocation.
pub fn decode_with_limits(
    data: &[u8],
    limits: &Limits,
    stop: impl Stop,
) -> Result<Lerc1Raster, LercError> {
    DecodeRequest::new(data).with_limits(limits).decode(stop)
}

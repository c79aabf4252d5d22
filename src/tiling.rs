//! Tile grid selection and the sweeps over it.
//!
//! The value part is cut into a grid of roughly square tiles. Tile rows
//! advance by `height / tiles_vert` (and columns likewise), so a short
//! extra band appears when the division rounds down. Sizing and writing
//! share one sweep; a write that disagrees with its own size estimate is
//! reported rather than silently emitted.

use alloc::vec::Vec;

use enough::Stop;

use crate::cursor::Cursor;
use crate::error::LercError;
use crate::raster::Lerc1Raster;
use crate::tile;

/// Tile edge lengths tried by [`find_tiling`], in order.
const TILE_EDGES: [usize; 6] = [8, 11, 15, 20, 32, 64];

/// A tile grid with the byte count and value maximum of its sweep.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Tiling {
    pub tiles_vert: usize,
    pub tiles_hori: usize,
    pub num_bytes: usize,
    pub max_val: f32,
}

/// Walk the tile grid, sizing every tile and optionally writing it.
///
/// Returns the total byte count and the maximum value seen over valid
/// pixels.
pub(crate) fn sweep_tiles(
    img: &Lerc1Raster,
    max_z_error: f64,
    tiles_vert: usize,
    tiles_hori: usize,
    mut out: Option<&mut Vec<u8>>,
    scratch: &mut Vec<u32>,
    stop: &dyn Stop,
) -> Result<(usize, f32), LercError> {
    let height = img.height();
    let width = img.width();
    let tile_height = height / tiles_vert;
    let tile_width = width / tiles_hori;
    let mut num_bytes = 0;
    let mut max_val = f32::MIN;
    let mut r0 = 0;
    while r0 < height {
        let r1 = height.min(r0 + tile_height);
        let mut c0 = 0;
        while c0 < width {
            let c1 = width.min(c0 + tile_width);
            let stats = tile::compute_stats(img, r0..r1, c0..c1, stop)?;
            if max_val < stats.z_max {
                max_val = stats.z_max;
            }
            let scheme = tile::plan_tile(img, r0..r1, c0..c1, stats, max_z_error, stop)?;
            let planned = tile::scheme_size(scheme, stats.num_valid);
            num_bytes += planned;
            if let Some(buf) = out.as_deref_mut() {
                let before = buf.len();
                tile::write_tile(buf, img, r0..r1, c0..c1, scheme, max_z_error, scratch, stop)?;
                let written = buf.len() - before;
                if written != planned {
                    return Err(LercError::SizeMismatch {
                        expected: planned,
                        actual: written,
                    });
                }
            }
            c0 = c1;
        }
        r0 = r1;
    }
    Ok((num_bytes, max_val))
}

/// Try the candidate tile grids and keep the smallest.
///
/// The whole image as one tile is the baseline, and its value maximum is
/// the one the stream records. The search stops early once sizes start
/// to grow again.
pub(crate) fn find_tiling(
    img: &Lerc1Raster,
    max_z_error: f64,
    scratch: &mut Vec<u32>,
    stop: &dyn Stop,
) -> Result<Tiling, LercError> {
    let (num_bytes, max_val) = sweep_tiles(img, max_z_error, 1, 1, None, scratch, stop)?;
    let mut best = Tiling {
        tiles_vert: 1,
        tiles_hori: 1,
        num_bytes,
        max_val,
    };
    for edge in TILE_EDGES {
        let tiles_vert = img.height() / edge;
        let tiles_hori = img.width() / edge;
        if tiles_vert * tiles_hori < 2 {
            return Ok(best);
        }
        let (num_bytes, _) =
            sweep_tiles(img, max_z_error, tiles_vert, tiles_hori, None, scratch, stop)?;
        if num_bytes > best.num_bytes {
            break;
        }
        if num_bytes < best.num_bytes {
            best.tiles_vert = tiles_vert;
            best.tiles_hori = tiles_hori;
            best.num_bytes = num_bytes;
        }
    }
    Ok(best)
}

/// Read every tile of a value part into the raster.
pub(crate) fn read_tiles(
    cur: &mut Cursor<'_>,
    img: &mut Lerc1Raster,
    max_z_error_in_file: f64,
    tiles_vert: usize,
    tiles_hori: usize,
    max_z_in_img: f32,
    scratch: &mut Vec<u32>,
    stop: &dyn Stop,
) -> Result<(), LercError> {
    if tiles_vert == 0 || tiles_hori == 0 {
        return Err(LercError::InvalidData(
            "value part with zero tile count".into(),
        ));
    }
    let height = img.height();
    let width = img.width();
    let tile_height = height / tiles_vert;
    let tile_width = width / tiles_hori;
    // a grid finer than the raster would loop forever
    if tile_height == 0 || tile_width == 0 {
        return Err(LercError::InvalidData(
            "tile grid finer than the raster".into(),
        ));
    }
    let mut r0 = 0;
    while r0 < height {
        let r1 = height.min(r0 + tile_height);
        let mut c0 = 0;
        while c0 < width {
            let c1 = width.min(c0 + tile_width);
            tile::read_tile(
                cur,
                img,
                r0..r1,
                c0..c1,
                max_z_error_in_file,
                max_z_in_img,
                scratch,
                stop,
            )?;
            c0 = c1;
        }
        r0 = r1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use enough::Unstoppable;

    fn noise(width: usize, height: usize, seed: u32) -> Lerc1Raster {
        let mut state = seed | 1;
        let values = (0..width * height)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 2000) as f32 * 0.05 - 50.0
            })
            .collect();
        Lerc1Raster::from_values(width, height, values).unwrap()
    }

    #[test]
    fn estimate_matches_written_for_every_grid() {
        let img = noise(33, 21, 0xbeef);
        let mut scratch = Vec::new();
        for (tiles_vert, tiles_hori) in [(1, 1), (2, 1), (3, 2), (4, 3)] {
            let (estimated, _) = sweep_tiles(
                &img,
                0.1,
                tiles_vert,
                tiles_hori,
                None,
                &mut scratch,
                &Unstoppable,
            )
            .unwrap();
            let mut buf = Vec::new();
            let (written, _) = sweep_tiles(
                &img,
                0.1,
                tiles_vert,
                tiles_hori,
                Some(&mut buf),
                &mut scratch,
                &Unstoppable,
            )
            .unwrap();
            assert_eq!(estimated, written);
            assert_eq!(buf.len(), written, "{tiles_vert}x{tiles_hori}");
        }
    }

    #[test]
    fn tiles_roundtrip_across_short_bands() {
        // 21 rows over 4 tile rows leaves a one-row band at the bottom
        let img = noise(33, 21, 7);
        let mut scratch = Vec::new();
        let mut buf = Vec::new();
        let (_, max_val) = sweep_tiles(
            &img,
            0.1,
            4,
            3,
            Some(&mut buf),
            &mut scratch,
            &Unstoppable,
        )
        .unwrap();
        let mut out =
            Lerc1Raster::from_values(33, 21, alloc::vec![0.0; 33 * 21]).unwrap();
        let mut cur = Cursor::new(&buf);
        read_tiles(
            &mut cur,
            &mut out,
            0.1,
            4,
            3,
            max_val,
            &mut scratch,
            &Unstoppable,
        )
        .unwrap();
        assert_eq!(cur.remaining(), 0);
        for (&got, &want) in out.values().iter().zip(img.values()) {
            assert!((got - want).abs() <= 0.1 + 1.0e-5, "{got} vs {want}");
        }
    }

    #[test]
    fn small_images_keep_a_single_tile() {
        let img = noise(7, 7, 3);
        let mut scratch = Vec::new();
        let tiling = find_tiling(&img, 0.1, &mut scratch, &Unstoppable).unwrap();
        assert_eq!((tiling.tiles_vert, tiling.tiles_hori), (1, 1));
    }

    #[test]
    fn search_never_beats_its_own_baseline() {
        let img = noise(64, 48, 11);
        let mut scratch = Vec::new();
        let (single, max_val) =
            sweep_tiles(&img, 0.1, 1, 1, None, &mut scratch, &Unstoppable).unwrap();
        let tiling = find_tiling(&img, 0.1, &mut scratch, &Unstoppable).unwrap();
        assert!(tiling.num_bytes <= single);
        // the recorded maximum comes from the whole image, not the grid
        assert_eq!(tiling.max_val, max_val);
        let overall = img.values().iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(tiling.max_val, overall);
    }

    #[test]
    fn all_invalid_image_sweeps_to_one_byte() {
        let img = Lerc1Raster::new(10, 10).unwrap();
        let mut scratch = Vec::new();
        let (num_bytes, max_val) =
            sweep_tiles(&img, 0.1, 1, 1, None, &mut scratch, &Unstoppable).unwrap();
        assert_eq!(num_bytes, 1);
        assert_eq!(max_val, 0.0);
    }

    #[test]
    fn read_rejects_impossible_grids() {
        let mut img = Lerc1Raster::new(10, 10).unwrap();
        let mut scratch = Vec::new();
        let mut cur = Cursor::new(&[]);
        assert!(matches!(
            read_tiles(
                &mut cur,
                &mut img,
                0.1,
                0,
                1,
                0.0,
                &mut scratch,
                &Unstoppable,
            ),
            Err(LercError::InvalidData(_))
        ));
        let mut cur = Cursor::new(&[]);
        assert!(matches!(
            read_tiles(
                &mut cur,
                &mut img,
                0.1,
                100,
                1,
                0.0,
                &mut scratch,
                &Unstoppable,
            ),
            Err(LercError::InvalidData(_))
        ));
    }
}
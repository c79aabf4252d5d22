//! Per-pixel validity mask and its RLE wire form.
//!
//! Pixels map to bits MSB-first: pixel `k` lives in bit `7 - (k & 7)` of
//! byte `k >> 3`. The packed byte array is what gets RLE compressed, using
//! signed 16-bit little-endian counts: a negative count repeats the next
//! byte `-count` times, a positive count is followed by that many literal
//! bytes, and `-32768` terminates the stream.

use alloc::vec;
use alloc::vec::Vec;

use crate::cursor::Cursor;
use crate::error::LercError;

const MAX_RUN: usize = 32767;
const MIN_RUN: usize = 5;
const EOT: i16 = -(MAX_RUN as i16) - 1;

/// Validity bitmap addressed by linear pixel index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitMask {
    num_bits: usize,
    bytes: Vec<u8>,
}

impl BitMask {
    /// All pixels invalid.
    pub(crate) fn new(num_bits: usize) -> Self {
        Self {
            num_bits,
            bytes: vec![0; num_bits.div_ceil(8)],
        }
    }

    /// Number of pixels covered.
    pub fn len(&self) -> usize {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Validity of pixel `k`.
    ///
    /// Panics if `k` is out of range.
    pub fn get(&self, k: usize) -> bool {
        assert!(k < self.num_bits);
        self.bytes[k >> 3] & (0x80 >> (k & 7)) != 0
    }

    /// Set the validity of pixel `k`.
    ///
    /// Panics if `k` is out of range.
    pub fn set(&mut self, k: usize, valid: bool) {
        assert!(k < self.num_bits);
        if valid {
            self.bytes[k >> 3] |= 0x80 >> (k & 7);
        } else {
            self.bytes[k >> 3] &= !(0x80 >> (k & 7));
        }
    }

    /// Number of valid pixels.
    pub fn count_valid(&self) -> usize {
        // relies on slack bits in the last byte staying zero
        self.bytes.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Set every pixel to `valid`.
    pub(crate) fn fill(&mut self, valid: bool) {
        self.bytes.fill(if valid { 0xff } else { 0x00 });
        if valid {
            self.clear_slack();
        }
    }

    /// `Some(value)` when every pixel carries the same validity.
    pub(crate) fn is_constant(&self) -> Option<bool> {
        if self.bytes.iter().all(|&b| b == 0) {
            return Some(false);
        }
        let Some((last, body)) = self.bytes.split_last() else {
            return Some(false);
        };
        if body.iter().all(|&b| b == 0xff) && *last == self.full_last_byte() {
            return Some(true);
        }
        None
    }

    fn full_last_byte(&self) -> u8 {
        match self.num_bits & 7 {
            0 => 0xff,
            used => 0xffu8 << (8 - used),
        }
    }

    fn clear_slack(&mut self) {
        let full = self.full_last_byte();
        if let Some(last) = self.bytes.last_mut() {
            *last &= full;
        }
    }

    /// Exact byte count [`rle_compress`](Self::rle_compress) will produce.
    pub(crate) fn rle_size(&self) -> usize {
        let bytes = &self.bytes;
        let mut size = 2; // end marker
        let mut pos = 0;
        let mut lit_start = 0;
        while pos < bytes.len() {
            let run = run_length(&bytes[pos..]);
            if run < MIN_RUN {
                pos += 1;
                if pos - lit_start == MAX_RUN {
                    size += 2 + (pos - lit_start);
                    lit_start = pos;
                }
            } else {
                if pos > lit_start {
                    size += 2 + (pos - lit_start);
                }
                pos += run;
                lit_start = pos;
                size += 3; // any run is count + one byte
            }
        }
        if pos > lit_start {
            size += 2 + (pos - lit_start);
        }
        size
    }

    /// Append the RLE form of the mask bytes to `out`.
    pub(crate) fn rle_compress(&self, out: &mut Vec<u8>) {
        let bytes = &self.bytes;
        let mut pos = 0;
        let mut lit_start = 0;
        while pos < bytes.len() {
            let run = run_length(&bytes[pos..]);
            if run < MIN_RUN {
                pos += 1;
                if pos - lit_start == MAX_RUN {
                    write_literal(out, &bytes[lit_start..pos]);
                    lit_start = pos;
                }
            } else {
                if pos > lit_start {
                    write_literal(out, &bytes[lit_start..pos]);
                }
                out.extend_from_slice(&(-(run as i32) as i16).to_le_bytes());
                out.push(bytes[pos]);
                pos += run;
                lit_start = pos;
            }
        }
        if pos > lit_start {
            write_literal(out, &bytes[lit_start..pos]);
        }
        out.extend_from_slice(&EOT.to_le_bytes());
    }

    /// Rebuild the mask from an RLE payload.
    ///
    /// The mask must be filled exactly and the end marker must follow;
    /// payload bytes after the marker are ignored. Counts widen to `i32`
    /// first: `-32768` read mid-stream is a run of 32768, not the marker.
    pub(crate) fn rle_decompress(&mut self, payload: &[u8]) -> Result<(), LercError> {
        let mut cur = Cursor::new(payload);
        let total = self.bytes.len();
        let mut filled = 0;
        while filled < total {
            let count = i32::from(cur.read_i16()?);
            if count < 0 {
                let repeat = (-count) as usize;
                if repeat > total - filled {
                    return Err(LercError::InvalidData("mask run overruns mask".into()));
                }
                let b = cur.read_u8()?;
                self.bytes[filled..filled + repeat].fill(b);
                filled += repeat;
            } else {
                let n = count as usize;
                if n > total - filled {
                    return Err(LercError::InvalidData(
                        "mask literal block overruns mask".into(),
                    ));
                }
                self.bytes[filled..filled + n].copy_from_slice(cur.read_bytes(n)?);
                filled += n;
            }
        }
        if cur.read_i16()? != EOT {
            return Err(LercError::InvalidData("missing mask end marker".into()));
        }
        self.clear_slack();
        Ok(())
    }
}

/// How many times the leading byte repeats, capped at [`MAX_RUN`].
fn run_length(bytes: &[u8]) -> usize {
    let max = bytes.len().min(MAX_RUN);
    let b = bytes[0];
    match bytes[1..max].iter().position(|&x| x != b) {
        Some(i) => i + 1,
        None => max,
    }
}

fn write_literal(out: &mut Vec<u8>, block: &[u8]) {
    out.extend_from_slice(&(block.len() as i16).to_le_bytes());
    out.extend_from_slice(block);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(mask: &BitMask) -> BitMask {
        let mut payload = Vec::new();
        mask.rle_compress(&mut payload);
        assert_eq!(payload.len(), mask.rle_size());
        let mut out = BitMask::new(mask.len());
        out.rle_decompress(&payload).unwrap();
        out
    }

    #[test]
    fn bit_order_is_msb_first() {
        let mut mask = BitMask::new(16);
        mask.set(0, true);
        mask.set(9, true);
        assert!(mask.get(0));
        assert!(!mask.get(1));
        assert!(mask.get(9));
        assert_eq!(mask.count_valid(), 2);
    }

    #[test]
    fn fill_keeps_slack_bits_zero() {
        let mut mask = BitMask::new(11);
        mask.fill(true);
        assert_eq!(mask.count_valid(), 11);
        assert_eq!(mask.is_constant(), Some(true));
        mask.fill(false);
        assert_eq!(mask.count_valid(), 0);
        assert_eq!(mask.is_constant(), Some(false));
    }

    #[test]
    fn mixed_mask_is_not_constant() {
        let mut mask = BitMask::new(64);
        mask.fill(true);
        mask.set(17, false);
        assert_eq!(mask.is_constant(), None);
    }

    #[test]
    fn constant_runs_compress_to_one_record() {
        let mut mask = BitMask::new(800);
        mask.fill(true);
        let mut payload = Vec::new();
        mask.rle_compress(&mut payload);
        // one run record (2 + 1) plus the end marker
        assert_eq!(payload.len(), 5);
        assert_eq!(roundtrip(&mask), mask);
    }

    #[test]
    fn alternating_bits_compress_as_a_run() {
        let mut mask = BitMask::new(64);
        for k in (0..64).step_by(2) {
            mask.set(k, true);
        }
        let mut payload = Vec::new();
        mask.rle_compress(&mut payload);
        // 8 identical 0xaa bytes form one run, not a literal
        assert_eq!(payload.len(), 5);
        assert_eq!(roundtrip(&mask), mask);
    }

    #[test]
    fn literal_blocks_split_at_max_run() {
        // noise over enough bytes to force a literal block split
        let bits = (MAX_RUN + 10) * 8;
        let mut mask = BitMask::new(bits);
        let mut state = 0x2545_f491u32;
        for k in 0..bits {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            mask.set(k, state & 1 == 1);
        }
        assert_eq!(roundtrip(&mask), mask);
    }

    #[test]
    fn min_run_boundary() {
        // four repeats stay literal, five become a run
        for repeats in [MIN_RUN - 1, MIN_RUN] {
            let mut mask = BitMask::new((repeats + 1) * 8);
            for k in 0..8 {
                mask.set(k, true); // first byte 0xff, then `repeats` zero bytes
            }
            assert_eq!(roundtrip(&mask), mask);
        }
    }

    #[test]
    fn empty_mask_is_just_the_end_marker() {
        let empty = BitMask::new(0);
        let mut payload = Vec::new();
        empty.rle_compress(&mut payload);
        assert_eq!(payload, EOT.to_le_bytes());
        assert_eq!(roundtrip(&empty), empty);
    }

    #[test]
    fn single_bit_mask_roundtrips() {
        for valid in [false, true] {
            let mut mask = BitMask::new(1);
            mask.set(0, valid);
            let out = roundtrip(&mask);
            assert_eq!(out.get(0), valid);
            assert_eq!(out, mask);
        }
    }

    #[test]
    fn runs_split_at_the_max_run_cap() {
        // 70000 identical bytes need three run records
        let mut mask = BitMask::new(70_000 * 8);
        mask.fill(true);
        let mut payload = Vec::new();
        mask.rle_compress(&mut payload);
        let mut expect = Vec::new();
        for count in [-(MAX_RUN as i16), -(MAX_RUN as i16), -4466] {
            expect.extend_from_slice(&count.to_le_bytes());
            expect.push(0xff);
        }
        expect.extend_from_slice(&EOT.to_le_bytes());
        assert_eq!(payload, expect);
        assert_eq!(roundtrip(&mask), mask);
    }

    #[test]
    fn min_int_count_is_a_run_not_a_marker() {
        // 512x512 bits is exactly 32768 mask bytes, fillable by a single
        // run whose count equals the end marker value
        let mut payload = Vec::new();
        payload.extend_from_slice(&(-32768i16).to_le_bytes());
        payload.push(0xff);
        payload.extend_from_slice(&EOT.to_le_bytes());
        let mut mask = BitMask::new(512 * 512);
        mask.rle_decompress(&payload).unwrap();
        assert_eq!(mask.count_valid(), 512 * 512);
    }

    #[test]
    fn decompress_rejects_overrun_and_truncation() {
        let mut mask = BitMask::new(40); // 5 bytes
        let mut run_too_long = Vec::new();
        run_too_long.extend_from_slice(&(-100i16).to_le_bytes());
        run_too_long.push(0xff);
        run_too_long.extend_from_slice(&EOT.to_le_bytes());
        assert!(matches!(
            mask.rle_decompress(&run_too_long),
            Err(LercError::InvalidData(_))
        ));

        let mut literal_too_long = Vec::new();
        literal_too_long.extend_from_slice(&100i16.to_le_bytes());
        literal_too_long.extend_from_slice(&[0u8; 100]);
        literal_too_long.extend_from_slice(&EOT.to_le_bytes());
        assert!(matches!(
            mask.rle_decompress(&literal_too_long),
            Err(LercError::InvalidData(_))
        ));

        let mut truncated = Vec::new();
        truncated.extend_from_slice(&5i16.to_le_bytes());
        truncated.extend_from_slice(&[0u8; 2]);
        assert!(matches!(
            mask.rle_decompress(&truncated),
            Err(LercError::UnexpectedEof)
        ));
    }

    #[test]
    fn decompress_requires_end_marker() {
        let mask = {
            let mut m = BitMask::new(40);
            m.fill(true);
            m
        };
        let mut payload = Vec::new();
        mask.rle_compress(&mut payload);
        let len = payload.len();
        payload[len - 1] ^= 0x40; // corrupt the marker
        let mut out = BitMask::new(40);
        assert!(matches!(
            out.rle_decompress(&payload),
            Err(LercError::InvalidData(_))
        ));
    }

    #[test]
    fn bytes_after_marker_are_ignored() {
        let mask = {
            let mut m = BitMask::new(24);
            m.set(3, true);
            m
        };
        let mut payload = Vec::new();
        mask.rle_compress(&mut payload);
        payload.extend_from_slice(&[0xde, 0xad]);
        let mut out = BitMask::new(24);
        out.rle_decompress(&payload).unwrap();
        assert_eq!(out, mask);
    }
}

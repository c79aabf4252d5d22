//! Fixed-width bit packing for quantized tile residuals.
//!
//! A packed block is a header byte (bit width in the low 6 bits, element
//! count width in the top 2), the element count in 1, 2 or 4 little-endian
//! bytes, and the elements themselves packed MSB-first into 32-bit words
//! stored little-endian. The final word is trimmed to the bytes it needs.

use alloc::vec::Vec;

use crate::cursor::Cursor;
use crate::error::LercError;

/// Byte width of a variable-width integer or float field, encoded in the
/// top two bits of a header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FieldWidth {
    One,
    Two,
    Four,
}

impl FieldWidth {
    pub(crate) fn num_bytes(self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    pub(crate) fn tag_bits(self) -> u8 {
        match self {
            Self::One => 0x80,
            Self::Two => 0x40,
            Self::Four => 0x00,
        }
    }

    /// Narrowest width that holds `n`.
    pub(crate) fn for_uint(n: usize) -> Self {
        if n <= 0xff {
            Self::One
        } else if n <= 0xffff {
            Self::Two
        } else {
            Self::Four
        }
    }

    /// Decode the top two bits of a header byte. `0b11` is unassigned.
    pub(crate) fn from_tag_bits(byte: u8) -> Result<Self, LercError> {
        match byte & 0xc0 {
            0x80 => Ok(Self::One),
            0x40 => Ok(Self::Two),
            0x00 => Ok(Self::Four),
            _ => Err(LercError::InvalidData("unassigned field width tag".into())),
        }
    }
}

pub(crate) fn write_uint(out: &mut Vec<u8>, n: usize, width: FieldWidth) {
    match width {
        FieldWidth::One => out.push(n as u8),
        FieldWidth::Two => out.extend_from_slice(&(n as u16).to_le_bytes()),
        FieldWidth::Four => out.extend_from_slice(&(n as u32).to_le_bytes()),
    }
}

/// Bits needed for `v`, at least 1.
pub(crate) fn num_bits(v: u32) -> usize {
    (32 - v.leading_zeros()).max(1) as usize
}

/// Payload bytes for `count` elements of `bit_width` bits each.
pub(crate) fn packed_bytes(count: usize, bit_width: usize) -> usize {
    ((count as u64) * (bit_width as u64)).div_ceil(8) as usize
}

/// Full block size: header byte, count field, payload.
pub(crate) fn block_size(count: usize, bit_width: usize) -> usize {
    1 + FieldWidth::for_uint(count).num_bytes() + packed_bytes(count, bit_width)
}

/// Append a packed block of `values` to `out`.
///
/// Every value must fit in `bit_width` bits, `1..=31`.
pub(crate) fn write_block(out: &mut Vec<u8>, values: &[u32], bit_width: usize) {
    let count_width = FieldWidth::for_uint(values.len());
    out.push(bit_width as u8 | count_width.tag_bits());
    write_uint(out, values.len(), count_width);

    let mut acc: u32 = 0;
    let mut free = 32;
    for &val in values {
        if free >= bit_width {
            acc |= val << (free - bit_width);
            free -= bit_width;
        } else {
            acc |= val >> (bit_width - free);
            out.extend_from_slice(&acc.to_le_bytes());
            free += 32 - bit_width;
            acc = val << free;
        }
    }
    // trailing word, trimmed to the bytes still carrying bits
    let mut tail = 4;
    while free >= 8 {
        acc >>= 8;
        free -= 8;
        tail -= 1;
    }
    out.extend_from_slice(&acc.to_le_bytes()[..tail]);
}

/// Parse a packed block into `out`, replacing its contents.
///
/// `max_count` caps the element count at the surrounding tile's pixel count.
pub(crate) fn read_block(
    cur: &mut Cursor<'_>,
    max_count: usize,
    out: &mut Vec<u32>,
) -> Result<(), LercError> {
    let header = cur.read_u8()?;
    let bit_width = (header & 0x3f) as usize;
    if bit_width >= 32 {
        return Err(LercError::InvalidData("packed block bit width >= 32".into()));
    }
    let count_width = FieldWidth::from_tag_bits(header)?;
    let count = cur.read_uint(count_width.num_bytes())? as usize;
    if count > max_count {
        return Err(LercError::InvalidData(
            "packed block has more elements than tile pixels".into(),
        ));
    }

    out.clear();
    if bit_width == 0 {
        out.resize(count, 0);
        return Ok(());
    }

    let mut num_bytes = packed_bytes(count, bit_width);
    if num_bytes > cur.remaining() {
        return Err(LercError::UnexpectedEof);
    }
    let mut acc: u32 = 0;
    let mut avail = 0;
    for _ in 0..count {
        let val;
        if avail >= bit_width {
            val = acc >> (32 - bit_width);
            acc <<= bit_width;
            avail -= bit_width;
        } else {
            let high = if avail > 0 {
                (acc >> (32 - avail)) << (bit_width - avail)
            } else {
                0
            };
            // the last word may be partial; its bytes sit at the high end
            let nb = num_bytes.min(4);
            let mut buf = [0u8; 4];
            buf[4 - nb..].copy_from_slice(cur.read_bytes(nb)?);
            acc = u32::from_le_bytes(buf);
            num_bytes -= nb;
            avail += 32 - bit_width;
            val = high | (acc >> avail);
            acc <<= 32 - avail;
        }
        out.push(val);
    }
    debug_assert_eq!(num_bytes, 0);
    Ok(())
}

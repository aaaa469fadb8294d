//! Low-level bit packing for byte spans of a coded message.
//!
//! A field of `bit_length` bits sits `bit_position` bits above the least
//! significant bit of its byte span. The span covers
//! `ceil((bit_length + bit_position) / 8)` bytes and is stored high byte first
//! unless the coded type asks for low-high order.

use crate::errors::ReadError;

/// Byte order of a multi-byte coded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most significant byte first.
    #[default]
    HighLow,
    /// Least significant byte first.
    LowHigh,
}

/// Number of bytes spanned by a field of `bit_length` bits at `bit_position`.
pub fn byte_span(bit_length: usize, bit_position: usize) -> usize {
    (bit_length + bit_position).div_ceil(8)
}

/// Mask selecting the low `bit_length` bits of a `u64`.
pub fn mask(bit_length: usize) -> u64 {
    if bit_length >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_length) - 1
    }
}

/// Packs the low `bit_length` bits of `value` at `bit_position` into a fresh byte span.
///
/// `bit_length` must be in `1..=64` and `bit_position` below 8.
pub fn pack_bits(value: u64, bit_length: usize, bit_position: usize, byte_order: ByteOrder) -> Vec<u8> {
    let span = byte_span(bit_length, bit_position);
    let raw = u128::from(value & mask(bit_length)) << bit_position;

    let mut out = raw.to_be_bytes()[16 - span..].to_vec();
    if byte_order == ByteOrder::LowHigh {
        out.reverse();
    }

    out
}

/// Reads the field of `bit_length` bits at `bit_position` from the byte span starting at `byte_position`.
pub fn unpack_bits(
    data: &[u8],
    byte_position: usize,
    bit_length: usize,
    bit_position: usize,
    byte_order: ByteOrder,
) -> Result<u64, ReadError> {
    let span = byte_span(bit_length, bit_position);
    let bytes = read_bytes_at(data, byte_position, span)?;

    let fold = |acc: u128, b: &u8| (acc << 8) | u128::from(*b);
    let raw = match byte_order {
        ByteOrder::HighLow => bytes.iter().fold(0u128, fold),
        ByteOrder::LowHigh => bytes.iter().rev().fold(0u128, fold),
    };

    Ok((raw >> bit_position) as u64 & mask(bit_length))
}

/// Borrows `len` bytes starting at `byte_position`.
pub fn read_bytes_at(data: &[u8], byte_position: usize, len: usize) -> Result<&[u8], ReadError> {
    byte_position
        .checked_add(len)
        .and_then(|end| data.get(byte_position..end))
        .ok_or(ReadError::OutOfBounds {
            byte_position,
            byte_length: len,
            message_length: data.len(),
        })
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

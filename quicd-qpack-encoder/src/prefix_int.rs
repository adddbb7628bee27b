//! Prefix integer encoding and decoding per RFC 7541 Section 5.1.
//!
//! Used throughout QPACK for indexes, lengths, counts and stream IDs. An
//! integer shares its first byte with N high bits of instruction pattern:
//! values below `2^N - 1` fit in the prefix, larger values set every prefix
//! bit and continue in 7-bit groups, least significant first.
//!
//! RFC 9204 Section 4.1.1 requires support for values up to 62 bits.

use bytes::BufMut;

use crate::error::{Error, Result};

/// Maximum integer value accepted by the decoder (2^62 - 1).
pub const MAX_INTEGER: u64 = (1u64 << 62) - 1;

#[inline]
fn prefix_max(prefix_bits: u8) -> u64 {
    debug_assert!((1..=8).contains(&prefix_bits));
    (1u64 << prefix_bits) - 1
}

/// Encode `value` with an N-bit prefix into `buf`.
///
/// `pattern` carries the instruction bits above the prefix; its low
/// `prefix_bits` bits must be zero.
#[inline]
pub fn encode_int<B: BufMut>(value: u64, prefix_bits: u8, pattern: u8, buf: &mut B) {
    let max = prefix_max(prefix_bits);
    debug_assert_eq!(u64::from(pattern) & max, 0, "pattern overlaps prefix");

    // Fast path: fits in first byte (most common case)
    if value < max {
        buf.put_u8(pattern | value as u8);
        return;
    }

    buf.put_u8(pattern | max as u8);
    let mut remaining = value - max;
    while remaining >= 128 {
        buf.put_u8(0x80 | (remaining & 0x7F) as u8);
        remaining >>= 7;
    }
    buf.put_u8(remaining as u8);
}

/// Decode an N-bit prefix integer from the start of `data`.
///
/// Returns `(value, bytes_consumed)`. A truncated integer yields
/// [`Error::Incomplete`] so incremental readers can wait for more bytes; an
/// integer above [`MAX_INTEGER`] is a protocol violation.
pub fn decode_int(data: &[u8], prefix_bits: u8) -> Result<(u64, usize)> {
    let first = *data.first().ok_or(Error::Incomplete)?;
    let max = prefix_max(prefix_bits);
    let mut value = u64::from(first) & max;

    if value < max {
        return Ok((value, 1));
    }

    let mut shift = 0u32;
    for (i, &byte) in data[1..].iter().enumerate() {
        let chunk = u64::from(byte & 0x7F);
        if shift > 56 || (chunk << shift) >> shift != chunk {
            return Err(Error::ProtocolViolation("prefix integer overflow".into()));
        }
        value = value
            .checked_add(chunk << shift)
            .filter(|v| *v <= MAX_INTEGER)
            .ok_or_else(|| Error::ProtocolViolation("prefix integer exceeds 62 bits".into()))?;

        if byte & 0x80 == 0 {
            return Ok((value, i + 2));
        }
        shift += 7;
    }

    Err(Error::Incomplete)
}

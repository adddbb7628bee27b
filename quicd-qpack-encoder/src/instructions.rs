//! QPACK encoder and decoder stream instructions per RFC 9204.
//!
//! Encoder stream instructions (Section 4.3):
//! - Set Dynamic Table Capacity
//! - Insert With Name Reference
//! - Insert With Literal Name
//! - Duplicate
//!
//! Decoder stream instructions (Section 4.4):
//! - Section Acknowledgement
//! - Stream Cancellation
//! - Insert Count Increment
//!
//! Dynamic indices on the encoder stream are relative to the insert count
//! at the time the instruction is processed: 0 is the newest entry.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::huffman;
use crate::prefix_int::{decode_int, encode_int};

/// Encoder stream instruction types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderInstruction {
    /// Set Dynamic Table Capacity.
    /// Pattern: 001xxxxx (capacity with 5-bit prefix)
    SetCapacity { capacity: u64 },

    /// Insert With Name Reference.
    /// Pattern: 1Txxxxxx (T=1 static, T=0 dynamic relative; 6-bit prefix)
    InsertWithNameRef {
        is_static: bool,
        name_index: u64,
        value: Bytes,
    },

    /// Insert With Literal Name.
    /// Pattern: 01Hxxxxx (H=Huffman flag, name length with 5-bit prefix)
    InsertWithLiteralName { name: Bytes, value: Bytes },

    /// Duplicate an existing entry.
    /// Pattern: 000xxxxx (relative index with 5-bit prefix)
    Duplicate { index: u64 },
}

impl EncoderInstruction {
    /// Append the wire form to `buf`. With `huffman` set, string literals
    /// are Huffman-coded when that is shorter.
    pub fn encode(&self, huffman: bool, buf: &mut BytesMut) {
        match self {
            EncoderInstruction::SetCapacity { capacity } => {
                encode_int(*capacity, 5, 0x20, buf);
            }

            EncoderInstruction::InsertWithNameRef {
                is_static,
                name_index,
                value,
            } => {
                let pattern = if *is_static { 0xC0 } else { 0x80 };
                encode_int(*name_index, 6, pattern, buf);
                encode_string(value, 7, 0x00, huffman, buf);
            }

            EncoderInstruction::InsertWithLiteralName { name, value } => {
                encode_string(name, 5, 0x40, huffman, buf);
                encode_string(value, 7, 0x00, huffman, buf);
            }

            EncoderInstruction::Duplicate { index } => {
                encode_int(*index, 5, 0x00, buf);
            }
        }
    }

    /// Encode into a standalone chunk.
    pub fn to_bytes(&self, huffman: bool) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(huffman, &mut buf);
        buf.freeze()
    }

    /// Decode one instruction from the start of `data`.
    /// Returns (instruction, bytes_consumed).
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or(Error::Incomplete)?;

        if first & 0x80 != 0 {
            let is_static = first & 0x40 != 0;
            let (name_index, mut pos) = decode_int(data, 6)?;
            let (value, consumed) = decode_string(&data[pos..], 7)?;
            pos += consumed;
            Ok((
                EncoderInstruction::InsertWithNameRef {
                    is_static,
                    name_index,
                    value,
                },
                pos,
            ))
        } else if first & 0xC0 == 0x40 {
            let (name, mut pos) = decode_string(data, 5)?;
            let (value, consumed) = decode_string(&data[pos..], 7)?;
            pos += consumed;
            Ok((EncoderInstruction::InsertWithLiteralName { name, value }, pos))
        } else if first & 0xE0 == 0x20 {
            let (capacity, pos) = decode_int(data, 5)?;
            Ok((EncoderInstruction::SetCapacity { capacity }, pos))
        } else {
            let (index, pos) = decode_int(data, 5)?;
            Ok((EncoderInstruction::Duplicate { index }, pos))
        }
    }
}

/// Decoder stream instruction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderInstruction {
    /// Section Acknowledgement.
    /// Pattern: 1xxxxxxx (stream ID with 7-bit prefix)
    SectionAck { stream_id: u64 },

    /// Stream Cancellation.
    /// Pattern: 01xxxxxx (stream ID with 6-bit prefix)
    StreamCancel { stream_id: u64 },

    /// Insert Count Increment.
    /// Pattern: 00xxxxxx (increment with 6-bit prefix)
    InsertCountIncrement { increment: u64 },
}

impl DecoderInstruction {
    /// Append the wire form to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match self {
            DecoderInstruction::SectionAck { stream_id } => encode_int(*stream_id, 7, 0x80, buf),
            DecoderInstruction::StreamCancel { stream_id } => encode_int(*stream_id, 6, 0x40, buf),
            DecoderInstruction::InsertCountIncrement { increment } => {
                encode_int(*increment, 6, 0x00, buf)
            }
        }
    }

    /// Encode into a standalone chunk.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one instruction from the start of `data`.
    /// Returns (instruction, bytes_consumed).
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let first = *data.first().ok_or(Error::Incomplete)?;

        if first & 0x80 != 0 {
            let (stream_id, pos) = decode_int(data, 7)?;
            Ok((DecoderInstruction::SectionAck { stream_id }, pos))
        } else if first & 0x40 != 0 {
            let (stream_id, pos) = decode_int(data, 6)?;
            Ok((DecoderInstruction::StreamCancel { stream_id }, pos))
        } else {
            let (increment, pos) = decode_int(data, 6)?;
            Ok((DecoderInstruction::InsertCountIncrement { increment }, pos))
        }
    }
}

/// Encode a string literal: `H` flag just above an N-bit length prefix,
/// then the (possibly Huffman-coded) octets.
pub(crate) fn encode_string(
    data: &[u8],
    prefix_bits: u8,
    pattern: u8,
    huffman: bool,
    buf: &mut BytesMut,
) {
    debug_assert!(prefix_bits < 8);
    let h_bit = 1u8 << prefix_bits;

    if huffman {
        let huffman_len = huffman::encoded_size(data);
        if huffman_len < data.len() {
            encode_int(huffman_len as u64, prefix_bits, pattern | h_bit, buf);
            huffman::encode(data, buf);
            return;
        }
    }

    encode_int(data.len() as u64, prefix_bits, pattern, buf);
    buf.extend_from_slice(data);
}

/// Decode a string literal whose length uses an N-bit prefix with the
/// `H` flag directly above it. Returns (data, bytes_consumed).
pub fn decode_string(data: &[u8], prefix_bits: u8) -> Result<(Bytes, usize)> {
    let first = *data.first().ok_or(Error::Incomplete)?;
    let is_huffman = first & (1u8 << prefix_bits) != 0;
    let (len, offset) = decode_int(data, prefix_bits)?;

    let len = usize::try_from(len)
        .map_err(|_| Error::ProtocolViolation("string literal too long".into()))?;
    let end = offset.checked_add(len).ok_or(Error::Incomplete)?;
    let raw = data.get(offset..end).ok_or(Error::Incomplete)?;

    let decoded = if is_huffman {
        let mut out = Vec::with_capacity(raw.len() * 8 / 5);
        huffman::decode(raw, &mut out)?;
        Bytes::from(out)
    } else {
        Bytes::copy_from_slice(raw)
    };

    Ok((decoded, end))
}

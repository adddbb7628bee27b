//! Field section encoding (RFC 9204 Section 4.5).
//!
//! A field section is a prefix (Required Insert Count and Base) followed by
//! field line representations. Representations are built with absolute
//! dynamic indices and converted to relative or post-base form against the
//! section's Base only when serialized.

use bytes::{Bytes, BytesMut};

use crate::instructions::encode_string;
use crate::prefix_int::encode_int;

/// Encoded Required Insert Count (RFC 9204 Section 4.5.1.1).
///
/// `max_entries` is the negotiated maximum capacity divided by 32; the
/// count is sent modulo twice that so it fits in a small integer.
pub fn encode_required_insert_count(required_insert_count: u64, max_entries: u64) -> u64 {
    if required_insert_count == 0 {
        return 0;
    }
    debug_assert!(max_entries > 0, "dynamic reference without table capacity");
    required_insert_count % (2 * max_entries) + 1
}

/// One field line representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Representation {
    /// Indexed Field Line, static table.
    IndexedStatic { index: u64 },

    /// Indexed Field Line (relative) or Indexed Field Line With Post-Base
    /// Index, depending on the Base.
    IndexedDynamic { absolute_index: u64 },

    /// Literal Field Line With Name Reference, static table.
    LiteralStaticName {
        name_index: u64,
        value: Bytes,
        never_indexed: bool,
    },

    /// Literal Field Line With (Post-Base) Name Reference, dynamic table.
    LiteralDynamicName {
        name_index: u64,
        value: Bytes,
        never_indexed: bool,
    },

    /// Literal Field Line With Literal Name.
    LiteralName {
        name: Bytes,
        value: Bytes,
        never_indexed: bool,
    },
}

impl Representation {
    /// Append the wire form relative to `base`.
    pub fn encode(&self, base: u64, huffman: bool, buf: &mut BytesMut) {
        match self {
            Representation::IndexedStatic { index } => {
                // 1T | Index (6+), T=1
                encode_int(*index, 6, 0xC0, buf);
            }

            Representation::IndexedDynamic { absolute_index } => {
                if *absolute_index < base {
                    // 1T | Index (6+), T=0
                    encode_int(base - 1 - absolute_index, 6, 0x80, buf);
                } else {
                    // 0001 | Index (4+)
                    encode_int(absolute_index - base, 4, 0x10, buf);
                }
            }

            Representation::LiteralStaticName {
                name_index,
                value,
                never_indexed,
            } => {
                // 01NT | Name Index (4+), T=1
                let pattern = 0x50 | if *never_indexed { 0x20 } else { 0 };
                encode_int(*name_index, 4, pattern, buf);
                encode_string(value, 7, 0x00, huffman, buf);
            }

            Representation::LiteralDynamicName {
                name_index,
                value,
                never_indexed,
            } => {
                if *name_index < base {
                    // 01NT | Name Index (4+), T=0
                    let pattern = 0x40 | if *never_indexed { 0x20 } else { 0 };
                    encode_int(base - 1 - name_index, 4, pattern, buf);
                } else {
                    // 0000N | Name Index (3+)
                    let pattern = if *never_indexed { 0x08 } else { 0 };
                    encode_int(name_index - base, 3, pattern, buf);
                }
                encode_string(value, 7, 0x00, huffman, buf);
            }

            Representation::LiteralName {
                name,
                value,
                never_indexed,
            } => {
                // 001NH | Name Length (3+)
                let pattern = 0x20 | if *never_indexed { 0x10 } else { 0 };
                encode_string(name, 3, pattern, huffman, buf);
                encode_string(value, 7, 0x00, huffman, buf);
            }
        }
    }
}

/// A complete field section ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub required_insert_count: u64,
    pub base: u64,
    pub lines: Vec<Representation>,
}

impl HeaderBlock {
    /// Serialize prefix and field lines.
    pub fn encode(&self, max_entries: u64, huffman: bool) -> Bytes {
        let mut buf = BytesMut::new();

        let encoded_ric = encode_required_insert_count(self.required_insert_count, max_entries);
        encode_int(encoded_ric, 8, 0x00, &mut buf);

        // S | Delta Base (7+)
        if self.base >= self.required_insert_count {
            encode_int(self.base - self.required_insert_count, 7, 0x00, &mut buf);
        } else {
            encode_int(self.required_insert_count - self.base - 1, 7, 0x80, &mut buf);
        }

        for line in &self.lines {
            line.encode(self.base, huffman, &mut buf);
        }

        buf.freeze()
    }
}

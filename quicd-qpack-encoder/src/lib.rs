//! QPACK encoder: Header Compression for HTTP/3 (RFC 9204)
//!
//! This crate implements the encoder half of QPACK: dynamic table management
//! and the blocked stream coordination between the encoder stream, the
//! decoder stream and the field sections sent on request streams.
//!
//! # Features
//!
//! - **Never stalls**: when the dynamic table cannot be used safely a field
//!   falls back to a literal; encoding only fails once the connection is dead.
//! - **Bounded blocking**: unacknowledged references respect the peer's
//!   SETTINGS_QPACK_BLOCKED_STREAMS.
//! - **Eviction safety**: entries referenced by unacknowledged field sections
//!   are never evicted; capacity shrinks are deferred until they can be.
//! - **Draining**: exact matches close to eviction are duplicated instead of
//!   referenced.
//! - **Zero-copy**: names and values are `Bytes`, shared between the table
//!   and the emitted instructions.
//!
//! # Example
//!
//! ```rust
//! use quicd_qpack_encoder::{Encoder, HeaderField};
//!
//! let mut encoder = Encoder::new(4096, 100);
//!
//! let headers = vec![
//!     HeaderField::new(":method", "GET"),
//!     HeaderField::new(":path", "/"),
//!     HeaderField::new("x-request-id", "42"),
//! ];
//! let section = encoder.encode(0, &headers).unwrap();
//!
//! // Send the encoder stream data before the field section.
//! let encoder_stream = encoder.drain_encoder_stream();
//! assert!(!encoder_stream.is_empty());
//! assert!(!section.is_empty());
//!
//! // Section Acknowledgement for stream 0 from the peer's decoder stream.
//! encoder.process_decoder_stream(&[0x80]).unwrap();
//! assert_eq!(encoder.known_received_count(), 1);
//! ```

pub mod blocking;
pub mod config;
pub mod decoder_stream;
pub mod dynamic_table;
pub mod encoder;
pub mod error;
pub mod field;
pub mod header_block;
pub mod header_table;
pub mod huffman;
pub mod instructions;
pub mod prefix_int;
pub mod shared;
pub mod static_table;

// Re-export main types
pub use blocking::BlockingManager;
pub use config::EncoderConfig;
pub use dynamic_table::DynamicTable;
pub use encoder::Encoder;
pub use error::{DecoderFeedbackError, Error, Result};
pub use field::HeaderField;
pub use header_table::{HeaderTable, Location, MatchType};
pub use instructions::{DecoderInstruction, EncoderInstruction};
pub use shared::SharedEncoder;

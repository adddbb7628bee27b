//! QPACK encoder per RFC 9204.
//!
//! Per field, in order of preference:
//! - an indexed reference to an exact static or dynamic match
//! - a Duplicate of an exact match that is about to be evicted
//! - a new dynamic table entry, referenced right away
//! - a literal, with a name reference when one is usable
//!
//! Every dynamic reference that the decoder has not acknowledged may block
//! the stream on the peer, so each one is checked against the blocked
//! stream budget first. When the table cannot help the field is sent as a
//! literal; encoding a field section never fails for lack of table space.
//!
//! Field sections are encoded with Base equal to the Required Insert Count,
//! so every dynamic reference uses the pre-base relative forms.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::blocking::BlockingManager;
use crate::config::EncoderConfig;
use crate::decoder_stream::DecoderStreamReceiver;
use crate::dynamic_table::DynamicTable;
use crate::error::{Error, Result};
use crate::field::HeaderField;
use crate::header_block::{HeaderBlock, Representation};
use crate::header_table::{HeaderTable, Location, MatchType};
use crate::instructions::EncoderInstruction;
use crate::static_table;

/// QPACK encoder state for one connection.
#[derive(Debug)]
pub struct Encoder {
    table: HeaderTable,
    blocking: BlockingManager,
    decoder_stream: DecoderStreamReceiver,

    /// Encoder stream instructions not yet handed to the transport.
    encoder_stream: VecDeque<Bytes>,
    encoder_stream_buffered: usize,

    /// Capacity change waiting for referenced entries to be released.
    pending_capacity: Option<usize>,

    config: EncoderConfig,
    closed: bool,
}

impl Encoder {
    /// Create an encoder for the peer's SETTINGS_QPACK_MAX_TABLE_CAPACITY and
    /// SETTINGS_QPACK_BLOCKED_STREAMS, with the full capacity announced on
    /// the encoder stream.
    pub fn new(max_table_capacity: usize, max_blocked_streams: u64) -> Self {
        Self::from_config(EncoderConfig::with_limits(
            max_table_capacity,
            max_blocked_streams,
        ))
    }

    /// Create an encoder from a validated configuration.
    pub fn with_config(config: EncoderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| Error::InvalidConfig(errors.join("; ")))?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: EncoderConfig) -> Self {
        let mut encoder = Self {
            table: HeaderTable::new(config.max_table_capacity),
            blocking: BlockingManager::new(config.max_blocked_streams),
            decoder_stream: DecoderStreamReceiver::new(),
            encoder_stream: VecDeque::new(),
            encoder_stream_buffered: 0,
            pending_capacity: None,
            config,
            closed: false,
        };

        let initial = encoder.config.effective_initial_capacity();
        let applied = encoder.table.dynamic_mut().set_capacity(initial, u64::MAX);
        if initial > 0 && matches!(applied, Ok(true)) {
            debug!(capacity = initial, "initial dynamic table capacity");
            encoder.queue_instruction(EncoderInstruction::SetCapacity {
                capacity: initial as u64,
            });
        }

        encoder
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// The encoder's dynamic table.
    pub fn dynamic_table(&self) -> &DynamicTable {
        self.table.dynamic()
    }

    pub fn blocking(&self) -> &BlockingManager {
        &self.blocking
    }

    pub fn inserted_count(&self) -> u64 {
        self.table.dynamic().inserted_count()
    }

    pub fn known_received_count(&self) -> u64 {
        self.blocking.known_received_count()
    }

    pub fn blocked_stream_count(&self) -> usize {
        self.blocking.blocked_stream_count()
    }

    /// Capacity change still waiting on referenced entries, if any.
    pub fn pending_capacity(&self) -> Option<usize> {
        self.pending_capacity
    }

    /// True once a fatal error or [`close`](Self::close) ended the connection.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Encode a header list for `stream_id` into a field section.
    ///
    /// Encoder stream instructions produced along the way are queued; the
    /// transport must send them before, or together with, the returned
    /// field section.
    pub fn encode(&mut self, stream_id: u64, fields: &[HeaderField]) -> Result<Bytes> {
        self.ensure_open()?;

        self.blocking.begin_section(stream_id);
        let lines: Vec<Representation> = fields
            .iter()
            .map(|field| self.encode_field(stream_id, field))
            .collect();
        let required_insert_count = self.blocking.finish_section(stream_id);

        trace!(
            stream_id,
            required_insert_count,
            fields = fields.len(),
            "encoded field section"
        );

        let block = HeaderBlock {
            required_insert_count,
            base: required_insert_count,
            lines,
        };
        Ok(block.encode(self.max_entries(), self.config.huffman))
    }

    /// Change the dynamic table capacity.
    ///
    /// A shrink that would evict entries the decoder has not acknowledged,
    /// or that unacknowledged field sections still reference, is deferred:
    /// no entries are inserted until it completes, and it is retried after
    /// each batch of decoder feedback.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        self.ensure_open()?;

        let maximum = self.table.dynamic().max_capacity();
        if capacity > maximum {
            return Err(Error::CapacityExceedsLimit {
                requested: capacity,
                maximum,
            });
        }

        self.pending_capacity = Some(capacity);
        self.apply_pending_capacity()
    }

    /// Feed bytes read from the peer's decoder stream.
    ///
    /// Returns the number of instructions applied. Any error is fatal for
    /// the connection.
    pub fn process_decoder_stream(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;

        let inserted_count = self.table.dynamic().inserted_count();
        let applied = self
            .decoder_stream
            .process(data, &mut self.blocking, inserted_count)
            .map_err(|err| {
                self.closed = true;
                err
            })?;

        self.apply_pending_capacity()?;
        Ok(applied)
    }

    /// Tear down the connection state. Every outstanding section is
    /// forgotten and later calls fail with [`Error::ConnectionClosed`].
    pub fn close(&mut self) {
        debug!(
            pending_blocked = self.blocking.blocked_stream_count(),
            "closing qpack encoder"
        );
        self.blocking.clear();
        self.pending_capacity = None;
        self.closed = true;
    }

    /// Next chunk of encoder stream data.
    pub fn poll_encoder_stream(&mut self) -> Option<Bytes> {
        let chunk = self.encoder_stream.pop_front()?;
        self.encoder_stream_buffered -= chunk.len();
        Some(chunk)
    }

    /// All pending encoder stream data as one buffer.
    pub fn drain_encoder_stream(&mut self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoder_stream_buffered);
        for chunk in self.encoder_stream.drain(..) {
            buf.extend_from_slice(&chunk);
        }
        self.encoder_stream_buffered = 0;
        buf.freeze()
    }

    /// Bytes queued on the encoder stream.
    pub fn encoder_stream_buffered(&self) -> usize {
        self.encoder_stream_buffered
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn max_entries(&self) -> u64 {
        (self.table.dynamic().max_capacity() / 32) as u64
    }

    fn queue_instruction(&mut self, instruction: EncoderInstruction) {
        trace!(?instruction, "queue encoder instruction");
        let chunk = instruction.to_bytes(self.config.huffman);
        self.encoder_stream_buffered += chunk.len();
        self.encoder_stream.push_back(chunk);
    }

    fn apply_pending_capacity(&mut self) -> Result<()> {
        let Some(capacity) = self.pending_capacity else {
            return Ok(());
        };

        let protect_from = self.blocking.eviction_bound();
        if self.table.dynamic_mut().set_capacity(capacity, protect_from)? {
            debug!(capacity, "dynamic table capacity changed");
            self.pending_capacity = None;
            self.queue_instruction(EncoderInstruction::SetCapacity {
                capacity: capacity as u64,
            });
        } else {
            debug!(capacity, protect_from, "capacity change deferred");
        }
        Ok(())
    }

    fn encode_field(&mut self, stream_id: u64, field: &HeaderField) -> Representation {
        let found = self.table.lookup(&field.name, &field.value);

        if field.sensitive {
            let name_match = match found {
                MatchType::Exact(location) | MatchType::Name(location) => {
                    Some(self.prefer_static_name(field, location))
                }
                MatchType::NoMatch => None,
            };
            return self.literal(stream_id, field, name_match);
        }

        let name_match = match found {
            MatchType::Exact(Location::Static(index)) => {
                return Representation::IndexedStatic { index };
            }
            MatchType::Exact(Location::Dynamic(index)) => {
                if let Some(absolute_index) = self.reference_exact(stream_id, index) {
                    return Representation::IndexedDynamic { absolute_index };
                }
                // Inserting another copy would need the same space and budget
                // the Duplicate was just refused.
                let location = self.prefer_static_name(field, Location::Dynamic(index));
                return self.literal(stream_id, field, Some(location));
            }
            MatchType::Name(location) => Some(location),
            MatchType::NoMatch => None,
        };

        if let Some(absolute_index) = self.insert(stream_id, field, name_match) {
            self.blocking.record_reference(stream_id, absolute_index);
            return Representation::IndexedDynamic { absolute_index };
        }

        self.literal(stream_id, field, name_match)
    }

    fn prefer_static_name(&self, field: &HeaderField, location: Location) -> Location {
        match location {
            Location::Dynamic(_) => static_table::find_name(&field.name)
                .map(Location::Static)
                .unwrap_or(location),
            Location::Static(_) => location,
        }
    }

    fn is_draining(&self, index: u64) -> bool {
        index < self.table.dynamic().draining_index(self.config.draining_fraction)
    }

    /// Whether `stream_id` may take on a new unacknowledged reference.
    fn check_blocking(&self, stream_id: u64) -> Result<()> {
        if self.blocking.can_block(stream_id) {
            Ok(())
        } else {
            Err(Error::BlockingBudgetExceeded(stream_id))
        }
    }

    /// Whether a new reference from `stream_id` to `index` is allowed.
    fn check_reference(&self, stream_id: u64, index: u64) -> Result<()> {
        if self.blocking.is_acknowledged(index) {
            return Ok(());
        }
        self.check_blocking(stream_id)
    }

    /// Reference an exact dynamic match, duplicating it first if it is
    /// draining. Returns the index to reference.
    fn reference_exact(&mut self, stream_id: u64, index: u64) -> Option<u64> {
        if !self.is_draining(index) {
            if let Err(err) = self.check_reference(stream_id, index) {
                trace!(stream_id, index, error = %err, "reference refused");
                return None;
            }
            self.blocking.record_reference(stream_id, index);
            return Some(index);
        }

        if !self.insertion_allowed(stream_id) {
            return None;
        }

        let entry = self.table.dynamic().get(index)?;
        let (name, value) = (entry.name().clone(), entry.value().clone());
        let relative = self.table.dynamic().relative_index(index);

        // The decoder reads the duplicated entry before inserting, so the
        // source itself may be evicted by this insertion.
        let protect_from = self.blocking.eviction_bound();
        let duplicate = match self.table.dynamic_mut().insert_entry(name, value, protect_from) {
            Ok(duplicate) => duplicate,
            Err(err) => {
                trace!(stream_id, index, error = %err, "duplicate refused");
                return None;
            }
        };

        trace!(stream_id, index, duplicate, "duplicated draining entry");
        self.queue_instruction(EncoderInstruction::Duplicate { index: relative });
        self.blocking.record_reference(stream_id, duplicate);
        Some(duplicate)
    }

    /// Preconditions shared by every insertion, independent of its size.
    fn insertion_allowed(&self, stream_id: u64) -> bool {
        if self.pending_capacity.is_some() {
            trace!(stream_id, "insertion refused: capacity change pending");
            return false;
        }
        if let Err(err) = self.check_blocking(stream_id) {
            trace!(stream_id, error = %err, "insertion refused");
            return false;
        }
        if self.encoder_stream_buffered >= self.config.max_encoder_stream_buffer {
            trace!(
                stream_id,
                buffered = self.encoder_stream_buffered,
                "insertion refused: encoder stream backlog"
            );
            return false;
        }
        true
    }

    /// Insert `field` into the dynamic table, naming it by reference when
    /// possible. Returns the new entry's absolute index.
    fn insert(
        &mut self,
        stream_id: u64,
        field: &HeaderField,
        name_match: Option<Location>,
    ) -> Option<u64> {
        if !self.insertion_allowed(stream_id) {
            return None;
        }

        let instruction = match name_match {
            Some(Location::Static(name_index)) => EncoderInstruction::InsertWithNameRef {
                is_static: true,
                name_index,
                value: field.value.clone(),
            },
            Some(Location::Dynamic(index)) => EncoderInstruction::InsertWithNameRef {
                is_static: false,
                name_index: self.table.dynamic().relative_index(index),
                value: field.value.clone(),
            },
            None => EncoderInstruction::InsertWithLiteralName {
                name: field.name.clone(),
                value: field.value.clone(),
            },
        };

        let protect_from = self.blocking.eviction_bound();
        let index = match self.table.dynamic_mut().insert_entry(
            field.name.clone(),
            field.value.clone(),
            protect_from,
        ) {
            Ok(index) => index,
            Err(err) => {
                trace!(stream_id, error = %err, "insertion refused");
                return None;
            }
        };

        trace!(stream_id, index, "inserted entry");
        self.queue_instruction(instruction);
        Some(index)
    }

    fn literal(
        &mut self,
        stream_id: u64,
        field: &HeaderField,
        name_match: Option<Location>,
    ) -> Representation {
        let never_indexed = field.sensitive;

        match name_match {
            Some(Location::Static(name_index)) => Representation::LiteralStaticName {
                name_index,
                value: field.value.clone(),
                never_indexed,
            },
            Some(Location::Dynamic(index))
                if !self.is_draining(index) && self.check_reference(stream_id, index).is_ok() =>
            {
                self.blocking.record_reference(stream_id, index);
                Representation::LiteralDynamicName {
                    name_index: index,
                    value: field.value.clone(),
                    never_indexed,
                }
            }
            _ => Representation::LiteralName {
                name: field.name.clone(),
                value: field.value.clone(),
                never_indexed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn field(name: &'static str, value: &'static str) -> HeaderField {
        HeaderField::new(name, value)
    }

    /// Encoder with the initial capacity announcement already drained.
    fn encoder(max_table_capacity: usize, max_blocked_streams: u64) -> Encoder {
        let mut encoder = Encoder::new(max_table_capacity, max_blocked_streams);
        encoder.drain_encoder_stream();
        encoder
    }

    #[test]
    fn test_initial_capacity_announced() {
        let mut encoder = Encoder::new(4096, 100);
        assert_eq!(encoder.dynamic_table().capacity(), 4096);
        assert_eq!(hex(&encoder.drain_encoder_stream()), "3fe11f");

        let mut encoder = Encoder::new(0, 100);
        assert!(encoder.drain_encoder_stream().is_empty());
    }

    #[test]
    fn test_literal_insertion() {
        let mut encoder = encoder(4096, 1);

        let section = encoder.encode(1, &[field("foo", "bar")]).unwrap();
        assert_eq!(hex(&encoder.drain_encoder_stream()), "6294e703626172");
        assert_eq!(hex(&section), "020080");
        assert_eq!(encoder.inserted_count(), 1);
        assert_eq!(encoder.blocked_stream_count(), 1);
    }

    #[test]
    fn test_empty_header_list() {
        let mut encoder = encoder(4096, 10);
        assert_eq!(hex(&encoder.encode(0, &[]).unwrap()), "0000");

        encoder.encode(4, &[field("foo", "bar")]).unwrap();
        assert_eq!(hex(&encoder.encode(8, &[]).unwrap()), "0000");
        assert_eq!(encoder.blocking().pending_sections(8), 0);
    }

    #[test]
    fn test_static_exact_match() {
        let mut encoder = encoder(4096, 10);
        let section = encoder
            .encode(0, &[field(":method", "GET"), field(":path", "/")])
            .unwrap();
        assert_eq!(hex(&section), "0000d1c1");
        assert_eq!(encoder.encoder_stream_buffered(), 0);
    }

    #[test]
    fn test_static_name_insertion() {
        let mut encoder = encoder(4096, 10);
        encoder.encode(0, &[field(":authority", "example.com")]).unwrap();

        let stream = encoder.drain_encoder_stream();
        // Insert With Name Reference, static index 0
        assert_eq!(stream[0], 0xC0);
        assert_eq!(encoder.dynamic_table().get(0).unwrap().value().as_ref(), b"example.com");
    }

    #[test]
    fn test_reuse_acknowledged_entry() {
        let mut encoder = encoder(4096, 10);
        encoder.encode(0, &[field("foo", "bar")]).unwrap();
        encoder.process_decoder_stream(&[0x80]).unwrap();
        encoder.drain_encoder_stream();
        assert_eq!(encoder.known_received_count(), 1);

        let section = encoder.encode(4, &[field("foo", "bar")]).unwrap();
        assert_eq!(hex(&section), "020080");
        assert_eq!(encoder.blocked_stream_count(), 0);
        assert_eq!(encoder.encoder_stream_buffered(), 0);
    }

    #[test]
    fn test_blocked_stream_fallback() {
        let mut encoder = encoder(4096, 1);
        encoder.encode(1, &[field("foo", "bar")]).unwrap();
        encoder.drain_encoder_stream();

        let section = encoder.encode(5, &[field("foo", "bar")]).unwrap();
        assert_eq!(hex(&section), "00002a94e703626172");
        assert_eq!(encoder.blocked_stream_count(), 1);
        assert_eq!(encoder.encoder_stream_buffered(), 0);
        assert_eq!(encoder.inserted_count(), 1);
    }

    #[test]
    fn test_blocked_stream_keeps_referencing() {
        let mut encoder = encoder(4096, 1);
        encoder.encode(1, &[field("foo", "bar")]).unwrap();

        // Trailers on the same stream may use the entry and insert more.
        let section = encoder.encode(1, &[field("foo", "bar"), field("x", "y")]).unwrap();
        assert_eq!(hex(&section), "03008180");
        assert_eq!(encoder.blocking().pending_sections(1), 2);
    }

    #[test]
    fn test_zero_blocked_streams_never_inserts() {
        let mut encoder = encoder(4096, 0);
        let section = encoder.encode(0, &[field("foo", "bar")]).unwrap();
        assert_eq!(hex(&section), "00002a94e703626172");
        assert_eq!(encoder.inserted_count(), 0);
    }

    #[test]
    fn test_draining_entry_is_duplicated() {
        // Ten 34-byte entries fill the table; the oldest three are draining.
        let mut encoder = encoder(340, 10);
        let names = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let fields: Vec<HeaderField> = names.iter().map(|n| field(n, "v")).collect();
        encoder.encode(0, &fields).unwrap();
        encoder.process_decoder_stream(&[0x80]).unwrap();
        encoder.drain_encoder_stream();

        let section = encoder.encode(4, &[field("a", "v")]).unwrap();
        // Duplicate relative index 9
        assert_eq!(hex(&encoder.drain_encoder_stream()), "09");
        // Required Insert Count 11 with 10 max entries encodes as 12
        assert_eq!(hex(&section), "0c0080");
        assert!(encoder.dynamic_table().get(0).is_none());
        assert_eq!(encoder.dynamic_table().get(10).unwrap().name().as_ref(), b"a");
    }

    #[test]
    fn test_draining_entry_without_budget_is_literal() {
        let mut encoder = encoder(340, 1);
        let names = ["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"];
        let fields: Vec<HeaderField> = names.iter().map(|n| field(n, "v")).collect();
        encoder.encode(0, &fields).unwrap();
        // Insert Count Increment of 10: stream 0 still holds the only
        // blocking slot and pins every entry.
        encoder.process_decoder_stream(&[0x0a]).unwrap();
        encoder.drain_encoder_stream();

        let section = encoder.encode(4, &[field("a", "v")]).unwrap();
        assert_eq!(hex(&section), "000021610176");
        assert_eq!(encoder.encoder_stream_buffered(), 0);
        assert_eq!(encoder.blocked_stream_count(), 1);
    }

    #[test]
    fn test_unacknowledged_entry_is_not_evicted() {
        // Room for two 34-byte entries.
        let mut encoder = encoder(68, 10);
        encoder.encode(0, &[field("a", "v")]).unwrap();
        // Stream Cancellation for stream 0: entry 0 is unreferenced but the
        // decoder never acknowledged it.
        encoder.process_decoder_stream(&[0x40]).unwrap();
        encoder.encode(4, &[field("b", "v")]).unwrap();
        encoder.drain_encoder_stream();

        let section = encoder.encode(8, &[field("c", "v")]).unwrap();
        assert_eq!(hex(&section), "000021630176");
        assert_eq!(encoder.encoder_stream_buffered(), 0);
        assert_eq!(encoder.inserted_count(), 2);
        assert_eq!(encoder.dynamic_table().dropped_count(), 0);

        // Once the decoder reports both insertions, entry 0 may go.
        encoder.process_decoder_stream(&[0x02]).unwrap();
        let section = encoder.encode(12, &[field("c", "v")]).unwrap();
        assert_eq!(hex(&encoder.drain_encoder_stream()), "41630176");
        assert_eq!(encoder.inserted_count(), 3);
        assert_eq!(encoder.dynamic_table().dropped_count(), 1);
        assert_eq!(hex(&section), "040080");
    }

    #[test]
    fn test_sensitive_field_never_inserted() {
        let mut encoder = encoder(4096, 10);
        let section = encoder
            .encode(0, &[HeaderField::sensitive("authorization", "secret")])
            .unwrap();
        // 01NT, N=1 T=1, static name index 84
        assert_eq!(hex(&section[..4]), "00007f45");

        let section = encoder
            .encode(4, &[HeaderField::sensitive("x-token", "abc")])
            .unwrap();
        // 001NH, N=1
        assert_eq!(section[2] & 0xF0, 0x30);

        assert_eq!(encoder.inserted_count(), 0);
        assert_eq!(encoder.encoder_stream_buffered(), 0);
    }

    #[test]
    fn test_sensitive_field_skips_dynamic_exact_match() {
        let mut encoder = encoder(4096, 10);
        encoder.encode(0, &[field("x-token", "abc")]).unwrap();
        encoder.drain_encoder_stream();

        let section = encoder
            .encode(4, &[HeaderField::sensitive("x-token", "abc")])
            .unwrap();
        // Literal with dynamic name reference, N=1, relative index 0
        assert_eq!(hex(&section[..3]), "020060");
        assert_eq!(encoder.inserted_count(), 1);
    }

    #[test]
    fn test_capacity_change_deferred() {
        let mut encoder = encoder(4096, 10);
        encoder.encode(0, &[field("foo", "bar")]).unwrap();
        encoder.drain_encoder_stream();

        encoder.set_capacity(0).unwrap();
        assert_eq!(encoder.pending_capacity(), Some(0));
        assert_eq!(encoder.dynamic_table().capacity(), 4096);
        assert_eq!(encoder.encoder_stream_buffered(), 0);

        // No insertions while the change is pending.
        encoder.encode(4, &[field("x", "y")]).unwrap();
        assert_eq!(encoder.inserted_count(), 1);

        encoder.process_decoder_stream(&[0x80]).unwrap();
        assert_eq!(encoder.pending_capacity(), None);
        assert_eq!(encoder.dynamic_table().capacity(), 0);
        assert!(encoder.dynamic_table().is_empty());
        assert_eq!(hex(&encoder.drain_encoder_stream()), "20");
    }

    #[test]
    fn test_capacity_above_maximum() {
        let mut encoder = encoder(4096, 10);
        assert_eq!(
            encoder.set_capacity(8192),
            Err(Error::CapacityExceedsLimit {
                requested: 8192,
                maximum: 4096
            })
        );
        assert!(!encoder.is_closed());
    }

    #[test]
    fn test_fatal_decoder_stream_error_closes() {
        let mut encoder = encoder(4096, 10);
        let err = encoder.process_decoder_stream(&[0x00]).unwrap_err();
        assert!(err.is_fatal());
        assert!(encoder.is_closed());
        assert_eq!(encoder.encode(0, &[]), Err(Error::ConnectionClosed));
        assert_eq!(encoder.process_decoder_stream(&[0x01]), Err(Error::ConnectionClosed));
    }

    #[test]
    fn test_encoder_stream_backlog_limits_insertion() {
        let config = EncoderConfig {
            max_encoder_stream_buffer: 1,
            ..Default::default()
        };
        let mut encoder = Encoder::with_config(config).unwrap();
        // The capacity announcement alone exceeds the backlog limit.
        encoder.encode(0, &[field("foo", "bar")]).unwrap();
        assert_eq!(encoder.inserted_count(), 0);

        assert!(encoder.poll_encoder_stream().is_some());
        assert!(encoder.poll_encoder_stream().is_none());
        encoder.encode(4, &[field("foo", "bar")]).unwrap();
        assert_eq!(encoder.inserted_count(), 1);
    }

    #[test]
    fn test_invalid_config() {
        let config = EncoderConfig {
            draining_fraction: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            Encoder::with_config(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_close_releases_state() {
        let mut encoder = encoder(4096, 10);
        encoder.encode(0, &[field("foo", "bar")]).unwrap();
        encoder.close();
        assert_eq!(encoder.blocked_stream_count(), 0);
        assert_eq!(encoder.blocking().smallest_blocking_index(), u64::MAX);
        assert_eq!(encoder.encode(0, &[]), Err(Error::ConnectionClosed));
    }
}

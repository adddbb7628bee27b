//! Minimal QPACK decoder used to check what the encoder emits.
//!
//! Keeps a replica of the dynamic table fed from the encoder stream, decodes
//! field sections and produces decoder stream feedback. Every inconsistency
//! is reported as an error string so tests can assert on it.

#![allow(dead_code)]

use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;

use quicd_qpack_encoder::error::Error;
use quicd_qpack_encoder::field::entry_size;
use quicd_qpack_encoder::instructions::decode_string;
use quicd_qpack_encoder::prefix_int::decode_int;
use quicd_qpack_encoder::static_table;
use quicd_qpack_encoder::{DecoderInstruction, EncoderInstruction, HeaderField};

pub type DecodeResult<T> = std::result::Result<T, String>;

#[derive(Debug)]
pub struct ReferenceDecoder {
    entries: VecDeque<(Bytes, Bytes)>,
    max_capacity: usize,
    capacity: usize,
    size: usize,
    dropped: u64,
    /// Insert count already reported through acknowledgements or increments.
    reported: u64,
    encoder_stream: BytesMut,
    feedback: BytesMut,
}

impl ReferenceDecoder {
    pub fn new(max_capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_capacity,
            capacity: 0,
            size: 0,
            dropped: 0,
            reported: 0,
            encoder_stream: BytesMut::new(),
            feedback: BytesMut::new(),
        }
    }

    pub fn inserted_count(&self) -> u64 {
        self.dropped + self.entries.len() as u64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Applies encoder stream bytes; partial instructions wait for more.
    pub fn feed_encoder_stream(&mut self, data: &[u8]) -> DecodeResult<()> {
        self.encoder_stream.extend_from_slice(data);

        loop {
            let (instruction, consumed) = match EncoderInstruction::decode(&self.encoder_stream) {
                Ok(decoded) => decoded,
                Err(Error::Incomplete) => return Ok(()),
                Err(err) => return Err(format!("encoder stream: {}", err)),
            };
            self.encoder_stream.advance(consumed);
            self.apply(instruction)?;
        }
    }

    fn apply(&mut self, instruction: EncoderInstruction) -> DecodeResult<()> {
        match instruction {
            EncoderInstruction::SetCapacity { capacity } => {
                let capacity = capacity as usize;
                if capacity > self.max_capacity {
                    return Err(format!("capacity {} above maximum", capacity));
                }
                self.evict_to(capacity);
                self.capacity = capacity;
                Ok(())
            }
            EncoderInstruction::InsertWithNameRef {
                is_static,
                name_index,
                value,
            } => {
                let name = if is_static {
                    let entry = static_table::get(name_index)
                        .ok_or_else(|| format!("static index {} out of range", name_index))?;
                    Bytes::from_static(entry.name)
                } else {
                    let absolute = self.relative_to_absolute(name_index)?;
                    self.entry(absolute)?.0.clone()
                };
                self.insert(name, value)
            }
            EncoderInstruction::InsertWithLiteralName { name, value } => self.insert(name, value),
            EncoderInstruction::Duplicate { index } => {
                let absolute = self.relative_to_absolute(index)?;
                let (name, value) = self.entry(absolute)?.clone();
                self.insert(name, value)
            }
        }
    }

    fn relative_to_absolute(&self, relative: u64) -> DecodeResult<u64> {
        self.inserted_count()
            .checked_sub(relative + 1)
            .ok_or_else(|| format!("relative index {} out of range", relative))
    }

    fn entry(&self, absolute: u64) -> DecodeResult<&(Bytes, Bytes)> {
        if absolute < self.dropped {
            return Err(format!("entry {} was evicted", absolute));
        }
        self.entries
            .get((absolute - self.dropped) as usize)
            .ok_or_else(|| format!("entry {} not inserted", absolute))
    }

    fn insert(&mut self, name: Bytes, value: Bytes) -> DecodeResult<()> {
        let size = entry_size(&name, &value);
        if size > self.capacity {
            return Err(format!("entry of size {} exceeds capacity {}", size, self.capacity));
        }
        self.evict_to(self.capacity - size);
        self.entries.push_back((name, value));
        self.size += size;
        Ok(())
    }

    fn evict_to(&mut self, target: usize) {
        while self.size > target {
            let Some((name, value)) = self.entries.pop_front() else {
                break;
            };
            self.size -= entry_size(&name, &value);
            self.dropped += 1;
        }
    }

    /// Decodes a field section, queuing a Section Acknowledgement if it
    /// referenced the dynamic table.
    pub fn decode_section(&mut self, stream_id: u64, data: &[u8]) -> DecodeResult<Vec<HeaderField>> {
        let mut pos = 0;

        let (encoded_ric, consumed) = decode_int(data, 8).map_err(|e| e.to_string())?;
        pos += consumed;
        let required_insert_count = self.decode_required_insert_count(encoded_ric)?;
        if required_insert_count > self.inserted_count() {
            return Err(format!(
                "blocked: required insert count {} but only {} inserted",
                required_insert_count,
                self.inserted_count()
            ));
        }

        let sign = *data.get(pos).ok_or("truncated prefix")? & 0x80 != 0;
        let (delta_base, consumed) = decode_int(&data[pos..], 7).map_err(|e| e.to_string())?;
        pos += consumed;
        let base = if sign {
            required_insert_count
                .checked_sub(delta_base + 1)
                .ok_or("negative base")?
        } else {
            required_insert_count + delta_base
        };

        let mut fields = Vec::new();
        let mut max_referenced = None;

        while pos < data.len() {
            let first = data[pos];
            let rest = &data[pos..];

            let (field, dynamic, consumed) = if first & 0x80 != 0 {
                // Indexed Field Line
                let (index, n) = decode_int(rest, 6).map_err(|e| e.to_string())?;
                if first & 0x40 != 0 {
                    let (name, value) = self.static_entry(index)?;
                    (HeaderField::new(name, value), None, n)
                } else {
                    let absolute = base.checked_sub(index + 1).ok_or("relative index below zero")?;
                    let (name, value) = self.entry(absolute)?.clone();
                    (HeaderField::new(name, value), Some(absolute), n)
                }
            } else if first & 0x40 != 0 {
                // Literal Field Line With Name Reference
                let (index, n) = decode_int(rest, 4).map_err(|e| e.to_string())?;
                let (value, m) = decode_string(&rest[n..], 7).map_err(|e| e.to_string())?;
                let (name, dynamic) = if first & 0x10 != 0 {
                    (self.static_entry(index)?.0, None)
                } else {
                    let absolute = base.checked_sub(index + 1).ok_or("relative index below zero")?;
                    (self.entry(absolute)?.0.clone(), Some(absolute))
                };
                let field = literal(name, value, first & 0x20 != 0);
                (field, dynamic, n + m)
            } else if first & 0x20 != 0 {
                // Literal Field Line With Literal Name
                let (name, n) = decode_string(rest, 3).map_err(|e| e.to_string())?;
                let (value, m) = decode_string(&rest[n..], 7).map_err(|e| e.to_string())?;
                (literal(name, value, first & 0x10 != 0), None, n + m)
            } else if first & 0x10 != 0 {
                // Indexed Field Line With Post-Base Index
                let (index, n) = decode_int(rest, 4).map_err(|e| e.to_string())?;
                let absolute = base + index;
                let (name, value) = self.entry(absolute)?.clone();
                (HeaderField::new(name, value), Some(absolute), n)
            } else {
                // Literal Field Line With Post-Base Name Reference
                let (index, n) = decode_int(rest, 3).map_err(|e| e.to_string())?;
                let (value, m) = decode_string(&rest[n..], 7).map_err(|e| e.to_string())?;
                let absolute = base + index;
                let name = self.entry(absolute)?.0.clone();
                (literal(name, value, first & 0x08 != 0), Some(absolute), n + m)
            };

            if let Some(absolute) = dynamic {
                if absolute >= required_insert_count {
                    return Err(format!(
                        "reference to {} beyond required insert count {}",
                        absolute, required_insert_count
                    ));
                }
                max_referenced = max_referenced.max(Some(absolute));
            }
            fields.push(field);
            pos += consumed;
        }

        if required_insert_count > 0 {
            if max_referenced.map(|i| i + 1) != Some(required_insert_count) {
                return Err(format!(
                    "required insert count {} does not match references",
                    required_insert_count
                ));
            }
            DecoderInstruction::SectionAck { stream_id }.encode(&mut self.feedback);
            self.reported = self.reported.max(required_insert_count);
        }

        Ok(fields)
    }

    fn decode_required_insert_count(&self, encoded: u64) -> DecodeResult<u64> {
        if encoded == 0 {
            return Ok(0);
        }
        let max_entries = (self.max_capacity / 32) as u64;
        let full_range = 2 * max_entries;
        if encoded > full_range {
            return Err(format!("encoded insert count {} out of range", encoded));
        }

        let max_value = self.inserted_count() + max_entries;
        let max_wrapped = (max_value / full_range) * full_range;
        let mut required = max_wrapped + encoded - 1;
        if required > max_value {
            if required <= full_range {
                return Err("invalid required insert count".to_string());
            }
            required -= full_range;
        }
        if required == 0 {
            return Err("required insert count of zero".to_string());
        }
        Ok(required)
    }

    fn static_entry(&self, index: u64) -> DecodeResult<(Bytes, Bytes)> {
        let entry = static_table::get(index).ok_or_else(|| format!("static index {} out of range", index))?;
        Ok((Bytes::from_static(entry.name), Bytes::from_static(entry.value)))
    }

    /// Queues an Insert Count Increment for insertions not yet reported.
    pub fn increment_insert_count(&mut self) {
        let increment = self.inserted_count() - self.reported;
        if increment > 0 {
            DecoderInstruction::InsertCountIncrement { increment }.encode(&mut self.feedback);
            self.reported = self.inserted_count();
        }
    }

    /// Queues a Stream Cancellation.
    pub fn cancel_stream(&mut self, stream_id: u64) {
        DecoderInstruction::StreamCancel { stream_id }.encode(&mut self.feedback);
    }

    /// Pending decoder stream bytes.
    pub fn take_feedback(&mut self) -> Bytes {
        self.feedback.split().freeze()
    }
}

fn literal(name: Bytes, value: Bytes, never_indexed: bool) -> HeaderField {
    if never_indexed {
        HeaderField::sensitive(name, value)
    } else {
        HeaderField::new(name, value)
    }
}

/// Routes encoder logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fields(pairs: &[(&'static str, &'static str)]) -> Vec<HeaderField> {
    pairs.iter().map(|&pair| HeaderField::from(pair)).collect()
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

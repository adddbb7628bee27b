//! Connection-scoped encoder handle.
//!
//! Request streams of one connection are often driven from separate tasks,
//! but the dynamic table and the blocked stream budget are shared by all of
//! them. `SharedEncoder` routes every call through one lock, so each field
//! section is built against a table no other stream can change halfway.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::EncoderConfig;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::field::HeaderField;

/// Cloneable handle to one connection's [`Encoder`].
#[derive(Debug, Clone)]
pub struct SharedEncoder {
    inner: Arc<Mutex<Encoder>>,
}

impl SharedEncoder {
    pub fn new(encoder: Encoder) -> Self {
        Self {
            inner: Arc::new(Mutex::new(encoder)),
        }
    }

    pub fn with_config(config: EncoderConfig) -> Result<Self> {
        Encoder::with_config(config).map(Self::new)
    }

    /// Encode a header list for `stream_id`. Encoder stream data queued by
    /// this call is returned alongside the field section so the caller can
    /// send it first.
    pub fn encode(&self, stream_id: u64, fields: &[HeaderField]) -> Result<(Bytes, Bytes)> {
        let mut encoder = self.inner.lock();
        let section = encoder.encode(stream_id, fields)?;
        Ok((encoder.drain_encoder_stream(), section))
    }

    pub fn process_decoder_stream(&self, data: &[u8]) -> Result<usize> {
        self.inner.lock().process_decoder_stream(data)
    }

    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        self.inner.lock().set_capacity(capacity)
    }

    pub fn drain_encoder_stream(&self) -> Bytes {
        self.inner.lock().drain_encoder_stream()
    }

    pub fn close(&self) {
        self.inner.lock().close();
    }

    /// Runs `f` with exclusive access to the encoder.
    pub fn with<R>(&self, f: impl FnOnce(&mut Encoder) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

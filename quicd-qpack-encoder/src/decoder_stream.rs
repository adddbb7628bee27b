//! Decoder stream receiver.
//!
//! Reads the peer decoder's feedback (RFC 9204 Section 4.4) and applies it
//! to the [`BlockingManager`]. Transport reads may split instructions at any
//! byte, so incomplete tails are buffered until the next call. Instructions
//! are applied strictly in arrival order.
//!
//! Any invalid instruction is a connection error
//! (`QPACK_DECODER_STREAM_ERROR`). The first one is latched and every later
//! call fails with it.

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::blocking::BlockingManager;
use crate::error::{DecoderFeedbackError, Error, Result};
use crate::instructions::DecoderInstruction;

#[derive(Debug, Default)]
pub struct DecoderStreamReceiver {
    buffer: BytesMut,
    error: Option<Error>,
}

impl DecoderStreamReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of a partially received instruction.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// The latched fatal error, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Feeds newly read bytes and applies every complete instruction.
    ///
    /// `inserted_count` bounds Insert Count Increments. Returns the number of
    /// instructions applied.
    pub fn process(
        &mut self,
        data: &[u8],
        blocking: &mut BlockingManager,
        inserted_count: u64,
    ) -> Result<usize> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        self.buffer.extend_from_slice(data);
        let mut applied = 0;

        loop {
            let (instruction, consumed) = match DecoderInstruction::decode(&self.buffer) {
                Ok(decoded) => decoded,
                Err(Error::Incomplete) => break,
                // The only malformation a decoder instruction can carry is an
                // integer beyond 62 bits.
                Err(_) => return Err(self.fail(DecoderFeedbackError::Overflow.into())),
            };
            self.buffer.advance(consumed);

            trace!(?instruction, "decoder stream instruction");
            let outcome = match instruction {
                DecoderInstruction::SectionAck { stream_id } => {
                    blocking.on_header_acknowledgement(stream_id)
                }
                DecoderInstruction::StreamCancel { stream_id } => {
                    blocking.on_stream_cancellation(stream_id);
                    Ok(())
                }
                DecoderInstruction::InsertCountIncrement { increment } => {
                    blocking.on_insert_count_increment(increment, inserted_count)
                }
            };

            if let Err(err) = outcome {
                return Err(self.fail(err.into()));
            }
            applied += 1;
        }

        Ok(applied)
    }

    fn fail(&mut self, err: Error) -> Error {
        warn!(error = %err, "decoder stream error");
        self.buffer.clear();
        self.error = Some(err.clone());
        err
    }
}

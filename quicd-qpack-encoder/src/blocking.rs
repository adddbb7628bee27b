//! Blocked stream accounting.
//!
//! A field section that references a dynamic entry the decoder has not yet
//! received blocks its stream on the peer until the encoder stream catches
//! up. The peer bounds how many streams may be blocked at once
//! (SETTINGS_QPACK_BLOCKED_STREAMS); this module tracks which streams count
//! against that bound, which entries are still referenced by unacknowledged
//! sections, and the Known Received Count.
//!
//! Each encoded section with a non-zero Required Insert Count opens a
//! [`SectionContext`]. A stream may own several (headers, then trailers);
//! the decoder acknowledges them in order. Contexts are released only by a
//! Section Acknowledgement, a Stream Cancellation or connection teardown.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::DecoderFeedbackError;

/// Dynamic table references made by one field section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionContext {
    required_insert_count: u64,
    referenced: Vec<u64>,
    blocking: bool,
}

impl SectionContext {
    /// True if the section referenced an entry the decoder had not
    /// acknowledged when it was encoded.
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }
}

/// Tracks outstanding field sections and the blocked stream budget.
#[derive(Debug)]
pub struct BlockingManager {
    known_received_count: u64,
    max_blocked_streams: u64,
    /// Section under construction, per stream.
    open: HashMap<u64, SectionContext>,
    /// Unacknowledged sections per stream, oldest first.
    pending: HashMap<u64, VecDeque<SectionContext>>,
    blocked: HashSet<u64>,
    /// Absolute index -> number of outstanding references.
    references: BTreeMap<u64, usize>,
}

impl BlockingManager {
    pub fn new(max_blocked_streams: u64) -> Self {
        Self {
            known_received_count: 0,
            max_blocked_streams,
            open: HashMap::new(),
            pending: HashMap::new(),
            blocked: HashSet::new(),
            references: BTreeMap::new(),
        }
    }

    /// Number of insertions the decoder has confirmed.
    pub fn known_received_count(&self) -> u64 {
        self.known_received_count
    }

    pub fn max_blocked_streams(&self) -> u64 {
        self.max_blocked_streams
    }

    /// True if the decoder has confirmed the entry at `index`.
    pub fn is_acknowledged(&self, index: u64) -> bool {
        index < self.known_received_count
    }

    /// Whether a new unacknowledged reference on `stream_id` stays within
    /// the blocked stream budget. A stream that is already blocked may keep
    /// adding references.
    pub fn can_block(&self, stream_id: u64) -> bool {
        if self.max_blocked_streams == 0 {
            return false;
        }
        (self.blocked.len() as u64) < self.max_blocked_streams || self.blocked.contains(&stream_id)
    }

    /// Number of streams currently counted as blocked.
    pub fn blocked_stream_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_blocked(&self, stream_id: u64) -> bool {
        self.blocked.contains(&stream_id)
    }

    /// Number of unacknowledged sections on `stream_id`.
    pub fn pending_sections(&self, stream_id: u64) -> usize {
        self.pending.get(&stream_id).map_or(0, VecDeque::len)
    }

    /// Smallest absolute index referenced by any outstanding or open
    /// section, or `u64::MAX` when nothing is referenced. That entry and
    /// every newer one must survive eviction.
    pub fn smallest_blocking_index(&self) -> u64 {
        self.references.keys().next().copied().unwrap_or(u64::MAX)
    }

    /// Oldest entry eviction must keep. Entries the decoder has not
    /// acknowledged stay in the table even when nothing references them.
    pub fn eviction_bound(&self) -> u64 {
        self.smallest_blocking_index().min(self.known_received_count)
    }

    /// Starts collecting references for a new field section on `stream_id`.
    pub fn begin_section(&mut self, stream_id: u64) {
        let previous = self.open.insert(stream_id, SectionContext::default());
        debug_assert!(previous.is_none(), "section already open on stream");
    }

    /// Records a reference from the open section on `stream_id` to the
    /// entry at `index`.
    ///
    /// An unacknowledged reference marks the stream blocked; callers check
    /// [`can_block`](Self::can_block) first.
    pub fn record_reference(&mut self, stream_id: u64, index: u64) {
        let context = self.open.entry(stream_id).or_default();
        context.referenced.push(index);
        *self.references.entry(index).or_insert(0) += 1;

        if index >= self.known_received_count {
            context.blocking = true;
            self.blocked.insert(stream_id);
        }
    }

    /// Closes the open section on `stream_id` and returns its Required
    /// Insert Count. A section without dynamic references is dropped: the
    /// decoder never acknowledges it.
    pub fn finish_section(&mut self, stream_id: u64) -> u64 {
        let Some(mut context) = self.open.remove(&stream_id) else {
            return 0;
        };
        let Some(max_index) = context.referenced.iter().copied().max() else {
            return 0;
        };

        context.required_insert_count = max_index + 1;
        let required_insert_count = context.required_insert_count;
        self.pending.entry(stream_id).or_default().push_back(context);
        required_insert_count
    }

    /// Applies an Insert Count Increment.
    ///
    /// The stream blocked set is left alone: streams leave it only when
    /// their sections are acknowledged or cancelled.
    pub fn on_insert_count_increment(
        &mut self,
        increment: u64,
        inserted_count: u64,
    ) -> Result<(), DecoderFeedbackError> {
        if increment == 0 {
            return Err(DecoderFeedbackError::InvalidZeroIncrement);
        }
        let requested = self
            .known_received_count
            .checked_add(increment)
            .ok_or(DecoderFeedbackError::Overflow)?;
        if requested > inserted_count {
            return Err(DecoderFeedbackError::ImpossibleInsertCount {
                requested,
                inserted: inserted_count,
            });
        }

        self.known_received_count = requested;
        Ok(())
    }

    /// Applies a Section Acknowledgement for the oldest outstanding section
    /// on `stream_id`.
    pub fn on_header_acknowledgement(&mut self, stream_id: u64) -> Result<(), DecoderFeedbackError> {
        let queue = self
            .pending
            .get_mut(&stream_id)
            .ok_or(DecoderFeedbackError::IncorrectAcknowledgement(stream_id))?;
        let context = queue
            .pop_front()
            .ok_or(DecoderFeedbackError::IncorrectAcknowledgement(stream_id))?;

        let still_blocking = queue.iter().any(SectionContext::is_blocking);
        if queue.is_empty() {
            self.pending.remove(&stream_id);
        }
        if !still_blocking {
            self.blocked.remove(&stream_id);
        }

        self.known_received_count = self.known_received_count.max(context.required_insert_count);
        debug!(
            stream_id,
            required_insert_count = context.required_insert_count,
            known_received_count = self.known_received_count,
            "section acknowledged"
        );
        self.release(&context);
        Ok(())
    }

    /// Drops every outstanding section on `stream_id`. Returns how many were
    /// released; a stream that never referenced the table releases none.
    pub fn on_stream_cancellation(&mut self, stream_id: u64) -> usize {
        self.blocked.remove(&stream_id);
        let Some(queue) = self.pending.remove(&stream_id) else {
            return 0;
        };

        debug!(stream_id, sections = queue.len(), "stream cancelled");
        for context in &queue {
            self.release(context);
        }
        queue.len()
    }

    /// Forgets all streams and references at connection teardown.
    pub fn clear(&mut self) {
        self.open.clear();
        self.pending.clear();
        self.blocked.clear();
        self.references.clear();
    }

    fn release(&mut self, context: &SectionContext) {
        for index in &context.referenced {
            if let Some(count) = self.references.get_mut(index) {
                *count -= 1;
                if *count == 0 {
                    self.references.remove(index);
                }
            }
        }
    }
}

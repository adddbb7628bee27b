//! Dynamic table implementation.
//!
//! The dynamic table is a FIFO of field lines bounded by a byte capacity
//! (RFC 9204 Section 3.2). Entries are addressed by a permanent absolute
//! index: the n-th inserted entry has index n - 1 and the index is never
//! reused. Storage is a ring buffer; an absolute index maps to the slot
//! `index - dropped_count`, and every access validates it against the
//! evicted prefix.
//!
//! Eviction is oldest first and is always bounded by a `protect_from`
//! index supplied by the caller: entries at or above it are still referenced
//! by a field section the decoder has not acknowledged and must survive.

use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

use crate::error::{Error, Result};
use crate::field::entry_size;

/// Entry in the dynamic table. Immutable after insertion.
#[derive(Clone, PartialEq, Eq)]
pub struct Entry {
    absolute_index: u64,
    name: Bytes,
    value: Bytes,
}

impl Entry {
    pub fn absolute_index(&self) -> u64 {
        self.absolute_index
    }

    pub fn name(&self) -> &Bytes {
        &self.name
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Size for capacity accounting: name + value + 32.
    pub fn size(&self) -> usize {
        entry_size(&self.name, &self.value)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entry#{}({:?}: {:?})",
            self.absolute_index,
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value)
        )
    }
}

/// The encoder's dynamic table.
#[derive(Debug)]
pub struct DynamicTable {
    entries: VecDeque<Entry>,
    capacity: usize,
    max_capacity: usize,
    size: usize,
    dropped_count: u64,
}

impl DynamicTable {
    /// Creates an empty table. The capacity starts at zero (RFC 9204
    /// Section 3.2.3) and may be raised up to `max_capacity`, the value the
    /// peer advertised in SETTINGS_QPACK_MAX_TABLE_CAPACITY.
    pub fn new(max_capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: 0,
            max_capacity,
            size: 0,
            dropped_count: 0,
        }
    }

    /// Current capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Negotiated maximum capacity in bytes.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Sum of live entry sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of insertions since the connection started.
    pub fn inserted_count(&self) -> u64 {
        self.dropped_count + self.entries.len() as u64
    }

    /// Number of evicted entries; also the absolute index of the oldest
    /// live entry.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// Live entries, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Entry at absolute `index`, if it has been inserted and not evicted.
    pub fn get(&self, index: u64) -> Option<&Entry> {
        let slot = index.checked_sub(self.dropped_count)?;
        self.entries.get(usize::try_from(slot).ok()?)
    }

    /// Relative index of `absolute` as used on the encoder stream: 0 is
    /// the most recently inserted entry.
    pub fn relative_index(&self, absolute: u64) -> u64 {
        debug_assert!(absolute < self.inserted_count());
        self.inserted_count() - 1 - absolute
    }

    /// Newest entry matching `name` and `value` exactly, else the newest
    /// entry matching `name`. Returns `(absolute_index, is_exact)`.
    pub fn lookup(&self, name: &[u8], value: &[u8]) -> Option<(u64, bool)> {
        let mut name_match = None;
        for entry in self.entries.iter().rev() {
            if entry.name.as_ref() != name {
                continue;
            }
            if entry.value.as_ref() == value {
                return Some((entry.absolute_index, true));
            }
            name_match.get_or_insert(entry.absolute_index);
        }
        name_match.map(|index| (index, false))
    }

    /// Bytes that eviction could free without touching `protect_from` or
    /// any newer entry.
    fn evictable_size(&self, protect_from: u64) -> usize {
        self.entries
            .iter()
            .take_while(|e| e.absolute_index < protect_from)
            .map(Entry::size)
            .sum()
    }

    /// Largest entry that can be inserted without evicting `protect_from`
    /// or anything newer.
    pub fn max_insert_size_without_evicting(&self, protect_from: u64) -> usize {
        self.capacity - self.size + self.evictable_size(protect_from)
    }

    /// First index outside the draining region.
    ///
    /// Entries below the returned index are close enough to eviction that
    /// new references to them are discouraged: they sit in the oldest part
    /// of the table that, together with the free space, makes up
    /// `draining_fraction` of the capacity. Returns `inserted_count()` when
    /// every entry is draining.
    pub fn draining_index(&self, draining_fraction: f32) -> u64 {
        if self.entries.is_empty() {
            return self.inserted_count();
        }

        let required_space = (f64::from(draining_fraction) * self.capacity as f64) as usize;
        let mut space = self.capacity - self.size;
        let mut index = self.dropped_count;

        for entry in &self.entries {
            if space >= required_space {
                return index;
            }
            space += entry.size();
            index += 1;
        }

        self.inserted_count()
    }

    /// Sets a new capacity, evicting entries if necessary.
    ///
    /// Returns `Ok(false)` and leaves the table untouched if shrinking would
    /// evict `protect_from` or a newer entry; the caller retries once those
    /// references are released.
    pub fn set_capacity(&mut self, new_capacity: usize, protect_from: u64) -> Result<bool> {
        if new_capacity > self.max_capacity {
            return Err(Error::CapacityExceedsLimit {
                requested: new_capacity,
                maximum: self.max_capacity,
            });
        }

        if self.size > new_capacity {
            let pinned = self.size - self.evictable_size(protect_from);
            if pinned > new_capacity {
                return Ok(false);
            }
            self.evict_to(new_capacity);
        }

        self.capacity = new_capacity;
        Ok(true)
    }

    /// Inserts a new entry, evicting the oldest unprotected entries to make
    /// room. Returns the new entry's absolute index.
    pub fn insert_entry(&mut self, name: Bytes, value: Bytes, protect_from: u64) -> Result<u64> {
        let size = entry_size(&name, &value);
        let available = self.max_insert_size_without_evicting(protect_from);
        if size > available {
            return Err(Error::InsufficientSpace {
                needed: size,
                available,
            });
        }

        self.evict_to(self.capacity - size);

        let absolute_index = self.inserted_count();
        self.entries.push_back(Entry {
            absolute_index,
            name,
            value,
        });
        self.size += size;

        Ok(absolute_index)
    }

    fn evict_to(&mut self, target_size: usize) {
        while self.size > target_size {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            self.size -= entry.size();
            self.dropped_count += 1;
            trace!(index = entry.absolute_index, "evicted dynamic table entry");
        }
    }
}

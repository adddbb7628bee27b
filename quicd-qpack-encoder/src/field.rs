//! Header field representation.
//!
//! An HTTP header or trailer field as handed to the encoder by the
//! validation layer: already-sanitized name and value bytes.

use bytes::Bytes;
use std::fmt;

/// Per-entry overhead counted against the dynamic table capacity
/// (RFC 9204 Section 3.2.1).
pub const ENTRY_OVERHEAD: usize = 32;

/// Size of a name-value pair for dynamic table accounting.
#[inline]
pub fn entry_size(name: &[u8], value: &[u8]) -> usize {
    name.len() + value.len() + ENTRY_OVERHEAD
}

/// An HTTP field line (name-value pair).
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
    /// Never insert this field into the dynamic table and ask intermediaries
    /// to keep it literal (the N bit of RFC 9204 Section 4.5.4).
    pub sensitive: bool,
}

impl HeaderField {
    /// Creates a new field line.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            sensitive: false,
        }
    }

    /// Creates a field line that must stay out of the dynamic table.
    pub fn sensitive(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            sensitive: true,
            ..Self::new(name, value)
        }
    }

    /// Returns the size of this field line for dynamic table accounting.
    pub fn size(&self) -> usize {
        entry_size(&self.name, &self.value)
    }
}

impl fmt::Debug for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HeaderField({:?}: {:?}{})",
            String::from_utf8_lossy(&self.name),
            String::from_utf8_lossy(&self.value),
            if self.sensitive { ", sensitive" } else { "" }
        )
    }
}

impl From<(&'static str, &'static str)> for HeaderField {
    fn from((name, value): (&'static str, &'static str)) -> Self {
        Self::new(name, value)
    }
}

impl From<(&[u8], &[u8])> for HeaderField {
    fn from((name, value): (&[u8], &[u8])) -> Self {
        Self::new(Bytes::copy_from_slice(name), Bytes::copy_from_slice(value))
    }
}

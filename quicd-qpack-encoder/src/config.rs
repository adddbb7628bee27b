//! Encoder configuration.
//!
//! The table and blocking limits come from the peer's HTTP/3 SETTINGS; the
//! remaining fields tune how aggressively the encoder uses the dynamic
//! table.

use serde::{Deserialize, Serialize};

/// Largest value SETTINGS_QPACK_MAX_TABLE_CAPACITY may carry (2^30).
pub const MAX_TABLE_CAPACITY_LIMIT: usize = 1 << 30;

/// QPACK encoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Peer's SETTINGS_QPACK_MAX_TABLE_CAPACITY.
    ///
    /// Zero disables the dynamic table; every field is then encoded from
    /// the static table or as a literal.
    ///
    /// **Default:** `4096`
    pub max_table_capacity: usize,

    /// Peer's SETTINGS_QPACK_BLOCKED_STREAMS.
    ///
    /// **Default:** `100`
    pub max_blocked_streams: u64,

    /// Capacity announced on the encoder stream at startup.
    ///
    /// `None` uses `max_table_capacity`.
    ///
    /// **Default:** `None`
    pub initial_capacity: Option<usize>,

    /// Share of the table capacity, counted from the oldest entry, inside
    /// which entries are considered about to be evicted. New references to
    /// those entries are avoided; an exact match there is duplicated.
    ///
    /// **Default:** `0.25`
    pub draining_fraction: f32,

    /// Huffman-code string literals when that is shorter.
    ///
    /// **Default:** `true`
    pub huffman: bool,

    /// Encoder stream backlog in bytes above which no new entries are
    /// inserted until the application drains the stream.
    ///
    /// **Default:** `65536`
    pub max_encoder_stream_buffer: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            max_table_capacity: 4096,
            max_blocked_streams: 100,
            initial_capacity: None,
            draining_fraction: 0.25,
            huffman: true,
            max_encoder_stream_buffer: 64 * 1024,
        }
    }
}

impl EncoderConfig {
    /// Config for the given peer settings with every other field at its
    /// default.
    pub fn with_limits(max_table_capacity: usize, max_blocked_streams: u64) -> Self {
        Self {
            max_table_capacity,
            max_blocked_streams,
            ..Default::default()
        }
    }

    /// Capacity to announce at startup.
    pub fn effective_initial_capacity(&self) -> usize {
        self.initial_capacity.unwrap_or(self.max_table_capacity)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.max_table_capacity > MAX_TABLE_CAPACITY_LIMIT {
            errors.push(format!(
                "max_table_capacity {} exceeds limit {}",
                self.max_table_capacity, MAX_TABLE_CAPACITY_LIMIT
            ));
        }

        if let Some(initial) = self.initial_capacity {
            if initial > self.max_table_capacity {
                errors.push(format!(
                    "initial_capacity {} exceeds max_table_capacity {}",
                    initial, self.max_table_capacity
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.draining_fraction) {
            errors.push(format!(
                "draining_fraction must be between 0.0 and 1.0, got {}",
                self.draining_fraction
            ));
        }

        if self.max_encoder_stream_buffer == 0 {
            errors.push("max_encoder_stream_buffer must be non-zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EncoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_initial_capacity(), 4096);
    }

    #[test]
    fn test_with_limits() {
        let config = EncoderConfig::with_limits(0, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_initial_capacity(), 0);
        assert!(config.huffman);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = EncoderConfig {
            initial_capacity: Some(8192),
            draining_fraction: 1.5,
            max_encoder_stream_buffer: 0,
            ..Default::default()
        };

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("initial_capacity"));
    }

    #[test]
    fn test_rejects_oversized_capacity() {
        let config = EncoderConfig::with_limits(MAX_TABLE_CAPACITY_LIMIT + 1, 10);
        assert!(config.validate().is_err());
    }
}

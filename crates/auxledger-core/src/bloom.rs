//! Logs bloom over emitted events.
//!
//! Standard 2048-bit Ethereum log bloom: every log contributes its emitting
//! address and each of its topics. Membership tests can give false positives
//! but never false negatives.

use ethereum_types::{Bloom, BloomInput};

use crate::constants::BLOOM_BYTES;
use crate::error::QueryError;
use crate::types::LogEvent;

/// Aggregated bloom for all logs committed at one height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogsBloom(Bloom);

impl LogsBloom {
    /// Build a bloom from a sequence of events.
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a LogEvent>) -> Self {
        let mut bloom = Self::default();
        for event in events {
            bloom.accrue_event(event);
        }
        bloom
    }

    pub fn accrue_event(&mut self, event: &LogEvent) {
        if !event.address.is_empty() {
            self.0.accrue(BloomInput::Raw(&event.address));
        }
        for topic in &event.topics {
            self.0.accrue(BloomInput::Raw(topic));
        }
    }

    /// Whether `topic` may have been emitted. `false` is definitive.
    pub fn may_contain(&self, topic: &[u8]) -> bool {
        self.0.contains_input(BloomInput::Raw(topic))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, QueryError> {
        if bytes.len() != BLOOM_BYTES {
            return Err(QueryError::InvalidBloom(bytes.len()));
        }
        Ok(Self(Bloom::from_slice(bytes)))
    }
}

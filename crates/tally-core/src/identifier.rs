//! # Invoice Numbers
//!
//! Invoice numbers come from an [`InvoiceIdentifierGenerator`]. Two
//! strategies ship with the crate:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Timestamp   INV-20240315143022-9f2c4e1a7b3d                            │
//! │              └┬┘ └─────┬──────┘ └─────┬────┘                            │
//! │            prefix  UTC second   48 random bits (UUID v4)               │
//! │                                                                         │
//! │  Sequential  INV-000042                                                 │
//! │              atomic counter, deterministic, single writer              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither strategy is globally unique by construction. Storage enforces
//! uniqueness and the billing service retries with a fresh number when an
//! insert reports a duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::ValidationError;

/// Produces invoice numbers.
pub trait InvoiceIdentifierGenerator: Send + Sync {
    fn next_identifier(&self) -> String;
}

// =============================================================================
// Timestamp Strategy
// =============================================================================

/// `PREFIX-YYYYMMDDHHMMSS-<12 hex digits>`.
#[derive(Debug, Clone)]
pub struct TimestampIdentifierGenerator {
    prefix: String,
}

impl TimestampIdentifierGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Builds a number for a given instant. The random suffix still varies.
    pub fn identifier_at(&self, now: DateTime<Utc>) -> String {
        // The first 12 hex digits of a v4 UUID precede the version nibble,
        // so all 48 bits are random.
        let random = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            self.prefix,
            now.format("%Y%m%d%H%M%S"),
            &random[..12]
        )
    }
}

impl InvoiceIdentifierGenerator for TimestampIdentifierGenerator {
    fn next_identifier(&self) -> String {
        self.identifier_at(Utc::now())
    }
}

// =============================================================================
// Sequential Strategy
// =============================================================================

/// `PREFIX-000001`, `PREFIX-000002`, ...
#[derive(Debug)]
pub struct SequentialIdentifierGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdentifierGenerator {
    /// Starts counting at 1.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// Starts counting at `first`, e.g. one past the stored invoice count.
    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(first),
        }
    }
}

impl InvoiceIdentifierGenerator for SequentialIdentifierGenerator {
    fn next_identifier(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:06}", self.prefix, n)
    }
}

// =============================================================================
// Strategy Selection
// =============================================================================

/// Which generator to build, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierStrategy {
    #[default]
    Timestamp,
    Sequential,
}

impl IdentifierStrategy {
    /// Builds the generator. `sequence_start` only matters for `Sequential`.
    pub fn build(self, prefix: &str, sequence_start: u64) -> Box<dyn InvoiceIdentifierGenerator> {
        match self {
            IdentifierStrategy::Timestamp => Box::new(TimestampIdentifierGenerator::new(prefix)),
            IdentifierStrategy::Sequential => {
                Box::new(SequentialIdentifierGenerator::starting_at(prefix, sequence_start))
            }
        }
    }
}

impl fmt::Display for IdentifierStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierStrategy::Timestamp => write!(f, "timestamp"),
            IdentifierStrategy::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for IdentifierStrategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timestamp" => Ok(IdentifierStrategy::Timestamp),
            "sequential" => Ok(IdentifierStrategy::Sequential),
            _ => Err(ValidationError::InvalidFormat {
                field: "identifier_strategy".to_string(),
                reason: format!("'{}' is not one of: timestamp, sequential", s),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_timestamp_format() {
        let gen = TimestampIdentifierGenerator::new("INV");
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 22).unwrap();
        let id = gen.identifier_at(at);

        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1], "20240315143022");
        assert_eq!(parts[2].len(), 12);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timestamp_same_second_differs() {
        let gen = TimestampIdentifierGenerator::new("INV");
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 22).unwrap();
        let ids: HashSet<String> = (0..1000).map(|_| gen.identifier_at(at)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_sequential() {
        let gen = SequentialIdentifierGenerator::new("INV");
        assert_eq!(gen.next_identifier(), "INV-000001");
        assert_eq!(gen.next_identifier(), "INV-000002");

        let gen = SequentialIdentifierGenerator::starting_at("BILL", 42);
        assert_eq!(gen.next_identifier(), "BILL-000042");
    }

    #[test]
    fn test_strategy_parse_and_build() {
        assert_eq!(
            "Sequential".parse::<IdentifierStrategy>().unwrap(),
            IdentifierStrategy::Sequential
        );
        assert!("random".parse::<IdentifierStrategy>().is_err());

        let gen = IdentifierStrategy::Sequential.build("INV", 7);
        assert_eq!(gen.next_identifier(), "INV-000007");
        assert!(IdentifierStrategy::Timestamp
            .build("INV", 1)
            .next_identifier()
            .starts_with("INV-"));
    }
}

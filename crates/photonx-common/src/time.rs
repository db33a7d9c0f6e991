//! Time utilities for the PhotonX protocol.
//!
//! Durable records carry UTC timestamps; wire messages carry epoch
//! milliseconds as unsigned integers.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Get the current time as epoch milliseconds.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Convert epoch milliseconds to a timestamp.
pub fn from_millis(millis: u64) -> Timestamp {
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Check whether a wire timestamp falls inside the skew window around
/// `reference_ms` (both early and late arrivals are bounded).
pub fn within_skew(timestamp_ms: u64, reference_ms: u64, window_ms: u64) -> bool {
    let diff = reference_ms.abs_diff(timestamp_ms);
    diff <= window_ms
}

/// A deadline for an in-flight operation.
#[derive(Debug, Clone)]
pub struct Deadline {
    /// Instant past which the operation must abort.
    pub at: Timestamp,
    /// Operation description for timeout errors.
    pub operation: String,
}

impl Deadline {
    /// Create a deadline `duration` from now.
    pub fn after(duration: Duration, operation: impl Into<String>) -> Self {
        Self {
            at: now() + duration,
            operation: operation.into(),
        }
    }

    /// Create a deadline the given number of milliseconds from now.
    pub fn after_millis(millis: u64, operation: impl Into<String>) -> Self {
        Self::after(Duration::milliseconds(millis as i64), operation)
    }

    /// Check if the deadline has passed.
    pub fn is_exceeded(&self) -> bool {
        now() > self.at
    }

    /// Time remaining, zero once exceeded.
    pub fn remaining(&self) -> std::time::Duration {
        (self.at - now()).to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_skew() {
        assert!(within_skew(10_000, 10_500, 1_000));
        assert!(within_skew(10_500, 10_000, 1_000));
        assert!(!within_skew(10_000, 50_000, 1_000));
    }

    #[test]
    fn test_millis_roundtrip() {
        let ms = now_millis();
        let ts = from_millis(ms);
        assert_eq!(ts.timestamp_millis() as u64, ms);
    }

    #[test]
    fn test_deadline() {
        let deadline = Deadline::after_millis(10_000, "test");
        assert!(!deadline.is_exceeded());
        assert!(deadline.remaining() > std::time::Duration::ZERO);

        let past = Deadline::after(Duration::milliseconds(-1), "past");
        assert!(past.is_exceeded());
        assert_eq!(past.remaining(), std::time::Duration::ZERO);
    }
}

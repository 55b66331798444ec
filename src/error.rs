//! Error types for queue construction and SPMC overlap detection.
//!
//! Transient full/empty conditions are not errors: push hands the rejected
//! value back as `Err(value)` and pop returns `None`. The types here cover
//! the two genuine failure modes the crate exposes.

use thiserror::Error;

/// Construction was attempted with an unusable capacity.
///
/// Every queue requires a power-of-two capacity of at least 2 so that index
/// wrapping is a single mask instruction. This is a logic error on the
/// caller's side and is never recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue capacity must be a power of two and at least 2, got {requested}")]
pub struct CapacityError {
    /// The capacity the caller asked for.
    pub requested: usize,
}

/// A broadcast (SPMC) consumer was lapped by the producer.
///
/// The slot at the consumer's read position has been overwritten with a value
/// from a later lap of the ring, so the values between the consumer's cursor
/// and the producer's cursor are partially lost. The consumer that observes
/// this can call `respawn()` to resynchronize to the producer's current
/// position, accepting the dropped interval, or stop consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "consumer lapped by producer at sequence {seq}: expected lap {expected_lap}, found lap {observed_lap}"
)]
pub struct Overlapped {
    /// The monotone read sequence at which the lap was detected.
    pub seq: u64,
    /// The lap count the consumer expected to find in the slot.
    pub expected_lap: u32,
    /// The lap count actually stored in the slot.
    pub observed_lap: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_display() {
        let err = CapacityError { requested: 3 };
        assert_eq!(
            err.to_string(),
            "queue capacity must be a power of two and at least 2, got 3"
        );
    }

    #[test]
    fn test_overlapped_display_names_position() {
        let err = Overlapped {
            seq: 17,
            expected_lap: 2,
            observed_lap: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("sequence 17"));
        assert!(msg.contains("expected lap 2"));
        assert!(msg.contains("found lap 4"));
    }
}

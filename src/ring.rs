//! Building blocks shared by the three queue flavors.
//!
//! Every queue in this crate is a fixed-capacity circular buffer indexed by
//! monotone cursors. This module holds the pieces they all rely on:
//!
//! - [`validate_capacity`] - the power-of-two capacity contract
//! - [`CachePadded`] - cache-line isolation for cursors
//! - [`PhantomUnsync`] - the `Send`-but-not-`Sync` marker used by handles

use std::cell::Cell;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use crate::error::CapacityError;

/// Size of a cache line on the targets we care about.
///
/// x86_64 and aarch64 both use 64-byte destructive interference in practice;
/// padding cursors to this size keeps the producer and consumer cache lines
/// disjoint.
pub(crate) const CACHE_LINE_SIZE: usize = 64;

/// Pads and aligns its contents to a full cache line.
///
/// Producer and consumer cursors are wrapped in this so that a writer
/// invalidating its own cursor's cache line never invalidates the peer's.
#[derive(Debug, Default)]
#[repr(align(64))]
pub(crate) struct CachePadded<T> {
    value: T,
}

impl<T> CachePadded<T> {
    pub(crate) const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CachePadded<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CachePadded<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

// The padding wrapper must occupy exactly one cache line for an
// atomic-sized payload, or cursor isolation silently degrades.
const _: () = assert!(std::mem::size_of::<CachePadded<u64>>() == CACHE_LINE_SIZE);
const _: () = assert!(std::mem::align_of::<CachePadded<u64>>() == CACHE_LINE_SIZE);

/// Marker type to opt-out of `Sync` while remaining `Send`.
///
/// Embedding this in a handle lets the handle move to another thread but
/// forbids sharing `&Handle` across threads, which is how the single-role
/// contracts (one SPSC producer, one MPSC consumer, ...) are expressed.
pub(crate) type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Checks the capacity contract shared by all queue flavors.
///
/// Capacity must be a power of two (so cursors wrap with a bitmask) and at
/// least 2. Returns the index mask `capacity - 1` on success.
///
/// # Errors
///
/// Returns [`CapacityError`] when the contract is violated. This is a logic
/// error in the caller; there is no recovery.
pub(crate) fn validate_capacity(capacity: usize) -> Result<usize, CapacityError> {
    if capacity < 2 || !capacity.is_power_of_two() {
        return Err(CapacityError {
            requested: capacity,
        });
    }
    Ok(capacity - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_line_alignment() {
        assert_eq!(
            std::mem::align_of::<CachePadded<std::sync::atomic::AtomicUsize>>(),
            CACHE_LINE_SIZE
        );
        assert_eq!(
            std::mem::size_of::<CachePadded<std::sync::atomic::AtomicUsize>>(),
            CACHE_LINE_SIZE
        );
    }

    #[test]
    fn test_validate_capacity_accepts_powers_of_two() {
        for cap in [2usize, 4, 8, 64, 1024, 1 << 20] {
            assert_eq!(validate_capacity(cap).unwrap(), cap - 1);
        }
    }

    #[test]
    fn test_validate_capacity_rejects_invalid() {
        for cap in [0usize, 1, 3, 6, 100, (1 << 20) + 1] {
            let err = validate_capacity(cap).unwrap_err();
            assert_eq!(err.requested, cap);
        }
    }
}

//! Core broadcast SPMC ring buffer algorithm.
//!
//! A bounded ring with one writer and any number of independent readers.
//! Unlike a work-distribution queue, every reader observes the full produced
//! sequence: values are copied out, never removed, and the producer
//! overwrites the oldest slot instead of failing when the ring is full.
//!
//! # Algorithm
//!
//! The producer owns a monotone write sequence. Slot index is
//! `seq & (capacity - 1)` and the slot's *lap* is `seq >> log2(capacity)`,
//! i.e. how many times the producer has wrapped past slot 0. On publish the
//! producer stores the payload, then the slot's lap tag (release), then the
//! shared write cursor (release).
//!
//! A reader at read sequence `r` expects the slot to carry lap `r >> log2`.
//! If the stored lap differs, the producer has cycled past the reader within
//! the ring and the slot's value belongs to a later lap: the reader has been
//! overlapped and the intervening values are lost. The lap tag is re-checked
//! after the value copy, so a lap that lands mid-copy is reported as overlap
//! instead of delivering a torn value. Elements are `Copy`, so a discarded
//! torn read is harmless.
//!
//! # Safety
//!
//! Publishing requires exactly one producer. Reading is safe from any number
//! of threads; readers share nothing but the ring itself.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};

use crate::error::{CapacityError, Overlapped};
use crate::ring::{CachePadded, validate_capacity};

/// A single slot: the payload plus the lap tag it was written under.
struct Slot<T> {
    /// Lap count of the write sequence that last stored this slot.
    version: AtomicU32,

    /// The payload. Overwritten in place on every lap.
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Core broadcast ring state.
pub(crate) struct Ring<T> {
    /// Index mask, `capacity - 1`.
    mask: u64,

    /// `log2(capacity)`; shifts a sequence down to its lap count.
    lap_shift: u32,

    /// Ring buffer slots.
    slots: Box<[Slot<T>]>,

    /// Total values published, i.e. the producer's next write sequence.
    /// Readers compare their own sequence against this for emptiness.
    cursor: CachePadded<AtomicU64>,
}

impl<T> Ring<T> {
    /// Allocates a ring with `capacity` slots.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        let mask = validate_capacity(capacity)?;
        let slots = (0..capacity)
            .map(|_| Slot {
                version: AtomicU32::new(0),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Ok(Self {
            mask: mask as u64,
            lap_shift: capacity.trailing_zeros(),
            slots,
            cursor: CachePadded::new(AtomicU64::new(0)),
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        (self.mask + 1) as usize
    }

    /// Lap count of a write or read sequence.
    #[inline]
    fn lap(&self, seq: u64) -> u32 {
        (seq >> self.lap_shift) as u32
    }

    #[inline]
    fn slot(&self, seq: u64) -> &Slot<T> {
        &self.slots[(seq & self.mask) as usize]
    }

    /// The producer's published write sequence.
    #[inline]
    pub(crate) fn published(&self) -> u64 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Number of slots holding live values. Saturates at `capacity` once the
    /// ring has wrapped; broadcast slots are never vacated by readers.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        let published = self.cursor.load(Ordering::Relaxed);
        published.min(self.mask + 1) as usize
    }

    /// Whether nothing has been published yet.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) == 0
    }

    /// Whether every slot holds a live value (the ring has wrapped at least
    /// once, so the producer is now overwriting).
    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.cursor.load(Ordering::Relaxed) > self.mask
    }
}

impl<T: Copy> Ring<T> {
    /// Publishes `item` at write sequence `seq`.
    ///
    /// Never fails: the slot for `seq` is overwritten regardless of reader
    /// positions. Readers that were relying on the old value detect the lap
    /// through the version tag.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread publishes (single producer), and
    /// that `seq` values are issued consecutively from 0.
    #[inline]
    pub(crate) unsafe fn publish(&self, seq: u64, item: T) {
        let slot = self.slot(seq);

        // Payload first. Readers of the previous lap may be copying this
        // slot concurrently; they discard the result when the lap tag below
        // becomes visible. T: Copy keeps the torn copy inert.
        unsafe {
            (*slot.value.get()).write(item);
        }

        // Tag the slot with this write's lap, then publish the cursor. Both
        // release: a reader that acquires either sees the payload store.
        slot.version.store(self.lap(seq), Ordering::Release);
        self.cursor.store(seq + 1, Ordering::Release);
    }

    /// Reads the value at read sequence `seq`.
    ///
    /// Returns `Ok(None)` when `seq` has caught up with the published write
    /// cursor (empty for this reader).
    ///
    /// # Errors
    ///
    /// Returns [`Overlapped`] when the slot's lap tag does not match the lap
    /// expected at `seq`, before or after the copy: the producer has cycled
    /// past this reader and the value at `seq` is gone.
    #[inline]
    pub(crate) fn read(&self, seq: u64) -> Result<Option<T>, Overlapped> {
        let published = self.cursor.load(Ordering::Acquire);
        debug_assert!(seq <= published);
        if seq == published {
            return Ok(None);
        }

        let slot = self.slot(seq);
        let expected_lap = self.lap(seq);

        let observed = slot.version.load(Ordering::Acquire);
        if observed != expected_lap {
            return Err(Overlapped {
                seq,
                expected_lap,
                observed_lap: observed,
            });
        }

        // SAFETY: The matching lap tag proves the producer initialized this
        // slot at sequence `seq`, and the acquire load above makes that
        // payload store visible. The producer may be overwriting it right
        // now; the volatile read tolerates the tear and the re-check below
        // rejects it.
        let value = unsafe { (slot.value.get() as *const MaybeUninit<T>).read_volatile() };

        // Order the copy before the re-check, then make sure the slot was
        // not relabelled underneath it.
        fence(Ordering::Acquire);
        let reread = slot.version.load(Ordering::Relaxed);
        if reread != expected_lap {
            return Err(Overlapped {
                seq,
                expected_lap,
                observed_lap: reread,
            });
        }

        // SAFETY: Lap tag was stable across the copy, so the bytes read are
        // the fully initialized payload for `seq`.
        Ok(Some(unsafe { value.assume_init() }))
    }
}

// SAFETY: Ring is Send because all fields are Send; T: Copy payloads carry
// no drop obligations.
unsafe impl<T: Send> Send for Ring<T> {}

// SAFETY: Ring is Sync because concurrent access is mediated by atomics:
// the single writer publishes with release stores, readers acquire the
// cursor and lap tags, and stale reads are rejected by the lap re-check.
unsafe impl<T: Send> Sync for Ring<T> {}

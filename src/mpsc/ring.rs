//! Core lock-free MPSC ring buffer algorithm.
//!
//! A bounded MPSC (Multi-Producer Single-Consumer) ring using per-cell
//! sequence numbers for synchronization.
//!
//! # Algorithm
//!
//! The algorithm is based on Dmitry Vyukov's bounded MPMC queue, simplified
//! for the single-consumer case:
//!
//! - Each cell has an atomic sequence number, initialized to its index
//! - A producer claims a cell by CAS-advancing `head` when the cell's
//!   sequence equals its head snapshot
//! - After writing, the producer publishes by setting `seq = pos + 1`
//! - The consumer reads a cell only when `seq == tail + 1`
//! - After reading, the consumer sets `seq = tail + capacity`, handing the
//!   cell to the producer expected there on the next lap
//!
//! The sequence number therefore always names the cursor value allowed to
//! act on the cell next, which bounds the per-cell state machine without
//! locks. Push is lock-free (the CAS may retry under contention); pop is
//! wait-free.
//!
//! # Safety
//!
//! Push may be called from any number of threads concurrently. Pop requires
//! exactly one consumer (single consumer invariant).

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::CapacityError;
use crate::ring::{CachePadded, validate_capacity};

/// A cell in the MPSC ring with a sequence number for synchronization.
struct Cell<T> {
    /// Sequence number for synchronization.
    /// - Initial: cell index (0, 1, 2, ..., capacity-1)
    /// - After producer write: position + 1 (signals "data ready")
    /// - After consumer read: position + capacity (signals "cell free")
    seq: AtomicUsize,

    /// The actual data stored in this cell.
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Core MPSC ring buffer state.
pub(crate) struct Ring<T> {
    /// Index mask, `capacity - 1`.
    mask: usize,

    /// Ring buffer cells with per-cell sequence numbers.
    cells: Box<[Cell<T>]>,

    /// Next position to claim for writing.
    /// Producers advance this via compare-and-swap.
    head: CachePadded<AtomicUsize>,

    /// Next position to read from. Only the consumer modifies this.
    tail: CachePadded<AtomicUsize>,
}

impl<T> Ring<T> {
    /// Allocates a ring with `capacity` cells, all of them usable.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, CapacityError> {
        let mask = validate_capacity(capacity)?;
        let cells = (0..capacity)
            .map(|i| Cell {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Ok(Self {
            mask,
            cells,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of occupied cells, counting claimed-but-unpublished ones.
    /// Racy snapshot.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Attempts to push an item onto the queue.
    ///
    /// Lock-free: safe to call from any number of threads concurrently. The
    /// claim loop retries only when another producer wins the CAS; a full
    /// queue returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the queue is full from this producer's
    /// viewpoint (the cell's sequence lags its head snapshot).
    #[inline]
    pub(crate) fn push(&self, item: T) -> Result<(), T> {
        let mut pos = self.head.load(Ordering::Relaxed);

        let cell = loop {
            let cell = &self.cells[pos & self.mask];
            let seq = cell.seq.load(Ordering::Acquire);

            // Signed distance between the cell's round and ours; wrapping
            // arithmetic keeps this correct across cursor overflow.
            let diff = seq.wrapping_sub(pos) as isize;

            if diff == 0 {
                // Cell is writable at this position; try to claim it.
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break cell,
                    // Another producer advanced head first; retry there.
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // The consumer has not yet released this cell: the queue is
                // full from this producer's viewpoint.
                return Err(item);
            } else {
                // Another producer already claimed this cell; refresh and
                // retry at the new head.
                pos = self.head.load(Ordering::Relaxed);
            }
        };

        // SAFETY: The CAS succeeded, so this producer exclusively owns the
        // cell for position `pos`: no other producer can claim it, and the
        // consumer will not read it until `seq` is published below.
        unsafe {
            (*cell.value.get()).write(item);
        }

        // Publish the write; the consumer reads at seq == pos + 1.
        cell.seq.store(pos.wrapping_add(1), Ordering::Release);

        Ok(())
    }

    /// Attempts to pop an item from the queue.
    ///
    /// Returns `None` if no published item is available.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls this method (single consumer).
    #[inline]
    pub(crate) unsafe fn pop(&self) -> Option<T> {
        let pos = self.tail.load(Ordering::Relaxed);
        let cell = &self.cells[pos & self.mask];

        let seq = cell.seq.load(Ordering::Acquire);

        // The cell is readable once the producer has published seq == pos + 1.
        // A smaller sequence means the cell is still empty or mid-write.
        if (seq.wrapping_sub(pos.wrapping_add(1)) as isize) < 0 {
            return None;
        }

        // SAFETY: The sequence check above confirms the claiming producer
        // finished writing, and the acquire load makes that write visible.
        // Single-consumer invariant means nobody else reads this cell.
        let item = unsafe { (*cell.value.get()).assume_init_read() };

        // Release the cell to the producer expected here next lap.
        cell.seq
            .store(pos.wrapping_add(self.capacity()), Ordering::Release);

        // Only the consumer writes tail; relaxed is enough.
        self.tail.store(pos.wrapping_add(1), Ordering::Relaxed);

        Some(item)
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        // Exclusive access: every claimed cell was published (no producer is
        // mid-push once the last handle is gone), so everything between the
        // cursors is initialized.
        let head = self.head.load(Ordering::Relaxed);
        let mut pos = self.tail.load(Ordering::Relaxed);

        while pos != head {
            // SAFETY: Cells in [tail, head) hold published, unconsumed items.
            unsafe {
                (*self.cells[pos & self.mask].value.get()).assume_init_drop();
            }
            pos = pos.wrapping_add(1);
        }
    }
}

// SAFETY: Ring is Send because all fields are Send.
unsafe impl<T: Send> Send for Ring<T> {}

// SAFETY: Ring is Sync because concurrent access is mediated by atomics:
// producers synchronize with each other through the head CAS and with the
// consumer through the per-cell sequence numbers (Release publish, Acquire
// read).
unsafe impl<T: Send> Sync for Ring<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_producer_single_consumer() {
        let ring: Ring<u64> = Ring::with_capacity(8).unwrap();

        assert!(ring.push(1).is_ok());
        assert!(ring.push(2).is_ok());
        assert!(ring.push(3).is_ok());

        unsafe {
            assert_eq!(ring.pop(), Some(1));
            assert_eq!(ring.pop(), Some(2));
            assert_eq!(ring.pop(), Some(3));
            assert_eq!(ring.pop(), None);
        }
    }

    #[test]
    fn test_queue_full() {
        let ring: Ring<u64> = Ring::with_capacity(4).unwrap();

        // All four cells are usable.
        assert!(ring.push(1).is_ok());
        assert!(ring.push(2).is_ok());
        assert!(ring.push(3).is_ok());
        assert!(ring.push(4).is_ok());
        assert_eq!(ring.push(5), Err(5));
        assert!(ring.is_full());

        unsafe {
            assert_eq!(ring.pop(), Some(1));
        }
        assert!(ring.push(5).is_ok());
        assert_eq!(ring.push(6), Err(6));
    }

    #[test]
    fn test_sequence_wraps_across_rounds() {
        let ring: Ring<u64> = Ring::with_capacity(4).unwrap();

        for round in 0..6 {
            for i in 0..4 {
                ring.push(round * 10 + i).unwrap();
            }
            for i in 0..4 {
                assert_eq!(unsafe { ring.pop() }, Some(round * 10 + i));
            }
            assert_eq!(unsafe { ring.pop() }, None);
        }
    }

    #[test]
    fn test_multiple_producers() {
        let ring: Arc<Ring<u64>> = Arc::new(Ring::with_capacity(64).unwrap());
        let num_producers = 4;
        let items_per_producer = 10;

        let mut handles = vec![];
        for p in 0..num_producers {
            let ring = Arc::clone(&ring);
            handles.push(thread::spawn(move || {
                for i in 0..items_per_producer {
                    let value = (p * 100 + i) as u64;
                    while ring.push(value).is_err() {
                        thread::yield_now();
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let mut items = vec![];
        while let Some(item) = unsafe { ring.pop() } {
            items.push(item);
        }

        assert_eq!(items.len(), num_producers * items_per_producer);
        for p in 0..num_producers {
            for i in 0..items_per_producer {
                let expected = (p * 100 + i) as u64;
                assert!(items.contains(&expected), "missing value {expected}");
            }
        }
    }

    #[test]
    fn test_drops_unconsumed_items() {
        use std::sync::atomic::AtomicUsize;

        #[derive(Debug)]
        struct Counted(Arc<AtomicUsize>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let ring: Ring<Counted> = Ring::with_capacity(8).unwrap();
            for _ in 0..6 {
                ring.push(Counted(Arc::clone(&drops))).unwrap();
            }
            drop(unsafe { ring.pop() }.unwrap());
            drop(unsafe { ring.pop() }.unwrap());
            assert_eq!(drops.load(Ordering::Relaxed), 2);
        }
        assert_eq!(drops.load(Ordering::Relaxed), 6);
    }
}

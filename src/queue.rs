//! Capability traits shared by the queue handles.
//!
//! Benchmarks and generic callers treat any flavor uniformly through these
//! bounds instead of naming a concrete queue. There is no runtime
//! polymorphism: the traits are plain generic constraints, and role
//! separation stays a compile-time property (a consumer handle simply has no
//! way to implement [`QueueProducer`]).

/// Observational surface common to every bounded queue handle.
///
/// All values are racy snapshots: by the time a caller inspects them, the
/// peer role may have moved on.
pub trait BoundedQueue {
    /// Total number of slots allocated at construction.
    fn capacity(&self) -> usize;

    /// Approximate number of occupied slots.
    fn len(&self) -> usize;

    /// Whether the queue appears empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue appears full.
    fn is_full(&self) -> bool;
}

/// Write capability: handles that can feed values into a queue.
pub trait QueueProducer<T>: BoundedQueue {
    /// Attempts to push a value without blocking.
    ///
    /// # Errors
    ///
    /// Returns `Err(value)` when the queue cannot accept the value right
    /// now, handing it back for retry. Flavors whose push cannot fail
    /// (broadcast) always return `Ok`.
    fn try_push(&mut self, value: T) -> Result<(), T>;
}

/// Read capability: handles that can drain values out of a queue.
///
/// The broadcast consumer does not implement this trait: its pop can fail
/// with an overlap error that a plain `Option` cannot carry.
pub trait QueueConsumer<T>: BoundedQueue {
    /// Attempts to pop a value without blocking. `None` means empty.
    fn try_pop(&mut self) -> Option<T>;
}

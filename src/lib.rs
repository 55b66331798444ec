//! Bounded, lock-free ring-buffer queues for predictable low-latency
//! handoff between threads.
//!
//! Three topologies, each tuned to a producer/consumer cardinality:
//!
//! - [`spsc`] - one producer, one consumer; wait-free both ways
//! - [`mpsc`] - many producers, one consumer; per-cell sequence numbers and
//!   a compare-and-swap-advanced head (Vyukov-style cell array)
//! - [`spmc`] - one producer, many consumers; a broadcast ring where every
//!   consumer observes the full produced sequence and detects being lapped
//!
//! The flavors share a design idiom, not code: a fixed power-of-two
//! capacity indexed by bitmask, monotone cursors on separate cache lines,
//! and acquire/release cursor publication as the only synchronization. No
//! operation blocks, allocates, or makes a syscall after construction;
//! full and empty are reported as values (`Err(item)` / `None`), not
//! waited out.
//!
//! Each flavor exposes a `channel(capacity)` constructor returning a
//! producer/consumer handle pair. Handles are cheap values that carry the
//! role-local state; which handles are `Clone` encodes the topology (the
//! MPSC producer and the SPMC consumer are, the rest are not), and no
//! handle is `Sync`, so role contracts hold at compile time.
//!
//! ```
//! use rhea::spsc;
//!
//! let (mut tx, mut rx) = spsc::channel::<u64>(1024).unwrap();
//! tx.push(7).unwrap();
//! assert_eq!(rx.pop(), Some(7));
//! ```

pub mod error;
pub mod mpsc;
pub mod queue;
pub mod spmc;
pub mod spsc;

pub(crate) mod ring;
pub(crate) mod trace;

pub use error::{CapacityError, Overlapped};
pub use queue::{BoundedQueue, QueueConsumer, QueueProducer};
pub use trace::init_tracing;

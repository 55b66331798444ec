//! Property tests: the queues are checked against a straightforward model
//! over arbitrary operation sequences.

use std::collections::VecDeque;

use proptest::prelude::*;

use rhea::{mpsc, spmc, spsc};

#[derive(Debug, Clone, Copy)]
enum Op {
    Push(u32),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    /// SPSC behaves exactly like a bounded FIFO holding `capacity - 1`
    /// items: same accept/reject decisions, same pop results, same length.
    #[test]
    fn spsc_matches_bounded_fifo_model(
        ops in proptest::collection::vec(op_strategy(), 1..256)
    ) {
        const CAPACITY: usize = 8;

        let (mut tx, mut rx) = spsc::channel::<u32>(CAPACITY).unwrap();
        let mut model: VecDeque<u32> = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    let accepted = tx.push(v).is_ok();
                    prop_assert_eq!(accepted, model.len() < CAPACITY - 1);
                    if accepted {
                        model.push_back(v);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(rx.pop(), model.pop_front());
                }
            }
        }

        prop_assert_eq!(rx.len(), model.len());
        prop_assert_eq!(rx.is_empty(), model.is_empty());
    }

    /// MPSC driven from a single thread behaves like a bounded FIFO using
    /// all `capacity` slots.
    #[test]
    fn mpsc_matches_bounded_fifo_model(
        ops in proptest::collection::vec(op_strategy(), 1..256)
    ) {
        const CAPACITY: usize = 8;

        let (mut tx, mut rx) = mpsc::channel::<u32>(CAPACITY).unwrap();
        let mut model: VecDeque<u32> = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    let accepted = tx.push(v).is_ok();
                    prop_assert_eq!(accepted, model.len() < CAPACITY);
                    if accepted {
                        model.push_back(v);
                    }
                }
                Op::Pop => {
                    prop_assert_eq!(rx.pop(), model.pop_front());
                }
            }
        }

        prop_assert_eq!(rx.len(), model.len());
    }

    /// A broadcast consumer either replays the produced sequence exactly
    /// (lag under capacity) or reports the lap on its first pop.
    #[test]
    fn spmc_consumer_sees_suffix_or_overlap(pushes in 0u64..64) {
        const CAPACITY: u64 = 8;

        let (mut tx, mut rx) = spmc::channel::<u64>(CAPACITY as usize).unwrap();
        for i in 0..pushes {
            tx.push(i);
        }

        if pushes <= CAPACITY {
            for i in 0..pushes {
                prop_assert_eq!(rx.pop().unwrap(), Some(i));
            }
            prop_assert_eq!(rx.pop().unwrap(), None);
        } else {
            // Slot 0 was overwritten: the idle consumer must see the lap.
            let err = rx.pop().unwrap_err();
            prop_assert_eq!(err.seq, 0);

            // Recovery resumes at the producer's cursor.
            rx.respawn();
            prop_assert_eq!(rx.pop().unwrap(), None);
            tx.push(1_000);
            prop_assert_eq!(rx.pop().unwrap(), Some(1_000));
        }
    }
}

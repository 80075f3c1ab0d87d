//! Ring buffer behaviour against a reference queue

use std::collections::VecDeque;
use std::thread;

use proptest::prelude::*;
use relaybench_pipeline::ring::{channel, SpscRing};
use rstest::rstest;

#[derive(Debug, Clone)]
enum Op {
    Push(u32),
    Pop,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u32>().prop_map(Op::Push), Just(Op::Pop)]
}

proptest! {
    #[test]
    fn ring_matches_bounded_queue(
        capacity_log2 in 1u32..6,
        ops in prop::collection::vec(op(), 0..400),
    ) {
        let capacity = 1usize << capacity_log2;
        let (mut tx, mut rx) = channel::<u32>(capacity);
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    let accepted = tx.try_push(value).is_ok();
                    prop_assert_eq!(accepted, model.len() < capacity - 1);
                    if accepted {
                        model.push_back(value);
                    }
                }
                Op::Pop => prop_assert_eq!(rx.try_pop(), model.pop_front()),
            }
            prop_assert_eq!(tx.ring().occupancy(), model.len());
            prop_assert!(tx.ring().occupancy() <= tx.ring().usable_capacity());
        }
    }

    #[test]
    fn rejected_push_returns_the_item(value in any::<u64>()) {
        let (mut tx, _rx) = channel::<u64>(2);
        prop_assert!(tx.try_push(0).is_ok());
        prop_assert_eq!(tx.try_push(value), Err(value));
    }
}

#[rstest]
#[case(0, 2)]
#[case(1, 2)]
#[case(3, 4)]
#[case(1000, 1024)]
#[case(16384, 16384)]
fn capacity_rounds_to_power_of_two(#[case] requested: usize, #[case] expected: usize) {
    let ring = SpscRing::<u8>::with_capacity(requested);
    assert_eq!(ring.capacity(), expected);
    assert_eq!(ring.usable_capacity(), expected - 1);
}

#[test]
fn fifo_across_threads_with_tiny_ring() {
    const COUNT: u64 = 100_000;
    let (mut tx, mut rx) = channel::<u64>(4);

    let producer = thread::spawn(move || {
        for i in 0..COUNT {
            let mut item = i;
            while let Err(back) = tx.try_push(item) {
                item = back;
                thread::yield_now();
            }
        }
    });

    let mut expected = 0;
    while expected < COUNT {
        match rx.try_pop() {
            Some(value) => {
                assert_eq!(value, expected);
                expected += 1;
            }
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();
    assert!(rx.try_pop().is_none());
}

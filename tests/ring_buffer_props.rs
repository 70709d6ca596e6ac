// tests/ring_buffer_props.rs
//! Model-based ring buffer properties

use std::collections::VecDeque;

use proptest::prelude::*;

use daq_core::acquisition::RingBuffer;

#[derive(Debug, Clone)]
enum Op {
    Push(u64),
    Pop,
    PopMany(usize),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u64>().prop_map(Op::Push),
        2 => Just(Op::Pop),
        1 => (0usize..20).prop_map(Op::PopMany),
        1 => Just(Op::Clear),
    ]
}

fn capacity_strategy() -> impl Strategy<Value = usize> {
    // Power-of-two capacities from 2 to 64
    (1u32..=6).prop_map(|exp| 1usize << exp)
}

proptest! {
    /// The buffer behaves like a bounded deque that drops its oldest entry
    /// when the writable region (capacity minus the vacant slot) is full.
    #[test]
    fn matches_a_bounded_deque_model(
        capacity in capacity_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let buffer = RingBuffer::new(capacity).unwrap();
        let mut model: VecDeque<u64> = VecDeque::new();
        let usable = capacity - 1;

        for op in ops {
            match op {
                Op::Push(value) => {
                    if model.len() == usable {
                        model.pop_front();
                    }
                    model.push_back(value);
                    buffer.push(value);
                }
                Op::Pop => {
                    prop_assert_eq!(buffer.pop().ok(), model.pop_front());
                }
                Op::PopMany(n) => {
                    let mut out = vec![0u64; n];
                    let got = buffer.pop_many(&mut out);
                    let expected: Vec<u64> =
                        (0..n.min(model.len())).filter_map(|_| model.pop_front()).collect();
                    prop_assert_eq!(&out[..got], expected.as_slice());
                }
                Op::Clear => {
                    buffer.clear();
                    model.clear();
                }
            }
            prop_assert_eq!(buffer.len(), model.len());
            prop_assert_eq!(buffer.is_empty(), model.is_empty());
            prop_assert_eq!(buffer.is_full(), model.len() == usable);
        }
    }

    /// Draining through `pop_many` yields the same sequence as repeated
    /// single pops.
    #[test]
    fn pop_many_equals_sequential_pops(
        capacity in capacity_strategy(),
        values in prop::collection::vec(any::<u64>(), 1..100),
    ) {
        let batched = RingBuffer::new(capacity).unwrap();
        let single = RingBuffer::new(capacity).unwrap();
        for &v in &values {
            batched.push(v);
            single.push(v);
        }

        let mut out = vec![0u64; capacity];
        let got = batched.pop_many(&mut out);

        let mut sequential = Vec::new();
        while let Ok(v) = single.pop() {
            sequential.push(v);
        }
        prop_assert_eq!(&out[..got], sequential.as_slice());
    }
}

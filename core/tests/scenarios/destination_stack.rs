//! Property and example coverage for the crossbar return-path bit-stack:
//! arbitrary push sequences must pop back out in exact LIFO order, and a
//! stack can never retain more than the bits it was actually pushed.

use arches_core::common::BitStack27;
use proptest::prelude::*;
use rstest::rstest;

/// Generates a push sequence (value, width) whose cumulative width never
/// exceeds the stack's 27-bit capacity.
fn push_sequence() -> impl Strategy<Value = Vec<(u32, u32)>> {
    proptest::collection::vec((any::<u32>(), 1u32..=6), 1..=6).prop_filter("must fit in 27 bits", |fields| {
        fields.iter().map(|(_, w)| w).sum::<u32>() <= 27
    })
}

proptest! {
    #[test]
    fn push_then_pop_in_reverse_order_recovers_every_value(fields in push_sequence()) {
        let mut stack = BitStack27::new();
        for &(value, width) in &fields {
            let mask = (1u32 << width) - 1;
            stack.push(value & mask, width);
        }
        prop_assert_eq!(stack.depth() as u32, fields.iter().map(|(_, w)| w).sum::<u32>());

        for &(value, width) in fields.iter().rev() {
            let mask = (1u32 << width) - 1;
            prop_assert_eq!(stack.pop(width), Some(value & mask));
        }
        prop_assert!(stack.is_empty());
    }

    #[test]
    fn popping_more_than_was_pushed_always_reports_none(fields in push_sequence(), extra_width in 1u32..=27) {
        let mut stack = BitStack27::new();
        for &(value, width) in &fields {
            let mask = (1u32 << width) - 1;
            stack.push(value & mask, width);
        }
        for &(_, width) in fields.iter().rev() {
            stack.pop(width);
        }
        prop_assert!(stack.is_empty());
        prop_assert_eq!(stack.pop(extra_width), None);
    }
}

#[rstest]
#[case::tm_bank_channel(&[(5, 4), (2, 3), (1, 2)])]
#[case::single_wide_field(&[(0x3ff_ffff, 26)])]
#[case::many_narrow_fields(&[(1, 1), (0, 1), (1, 1), (0, 1), (1, 1)])]
fn named_routing_topologies_round_trip(#[case] fields: &[(u32, u32)]) {
    let mut stack = BitStack27::new();
    for &(value, width) in fields {
        stack.push(value, width);
    }
    for &(value, width) in fields.iter().rev() {
        assert_eq!(stack.pop(width), Some(value));
    }
    assert!(stack.is_empty());
}

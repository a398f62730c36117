//! Tests for the gap buffer.

use crate::gap_buffer::{GapBuffer, MIN_GROWTH};
use proptest::prelude::*;

#[test]
fn test_insert_and_index() {
    let mut buffer = GapBuffer::new();
    buffer.insert(0, [1, 2, 3]);
    buffer.insert_one(1, 10);
    assert_eq!(buffer.to_vec(), vec![1, 10, 2, 3]);
    assert_eq!(buffer[1], 10);
    assert_eq!(buffer.len(), 4);
    assert_eq!(buffer.get(4), None);
}

#[test]
fn test_growth_doubles_with_minimum() {
    let mut buffer = GapBuffer::new();
    buffer.insert_one(0, 'a');
    assert_eq!(buffer.capacity(), MIN_GROWTH);

    buffer.insert(1, std::iter::repeat('b').take(MIN_GROWTH - 1));
    assert_eq!(buffer.gap_len(), 0);

    buffer.insert_one(MIN_GROWTH, 'c');
    assert_eq!(buffer.capacity(), MIN_GROWTH * 2);
    assert_eq!(buffer.len(), MIN_GROWTH + 1);
}

#[test]
fn test_large_insert_grows_past_doubling() {
    let mut buffer = GapBuffer::with_capacity(4);
    buffer.insert(0, 0..100);
    assert!(buffer.capacity() >= 100);
    assert_eq!(buffer.to_vec(), (0..100).collect::<Vec<_>>());
}

#[test]
fn test_move_gap_preserves_order() {
    let mut buffer: GapBuffer<i32> = (0..10).collect();
    buffer.move_gap_to(3);
    assert_eq!(buffer.gap_start(), 3);
    assert_eq!(buffer.to_vec(), (0..10).collect::<Vec<_>>());

    buffer.move_gap_to(8);
    assert_eq!(buffer.to_vec(), (0..10).collect::<Vec<_>>());

    buffer.move_gap_to(0);
    buffer.move_gap_to(10);
    assert_eq!(buffer.to_vec(), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_remove_range_returns_elements() {
    let mut buffer: GapBuffer<String> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(String::from)
        .collect();
    let removed = buffer.remove_range(1, 3);
    assert_eq!(removed, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(buffer.to_vec(), vec!["a", "d", "e"]);
    assert!(buffer.remove_range(2, 2).is_empty());
}

#[test]
fn test_removed_values_not_retained_by_gap() {
    use std::rc::Rc;

    let value = Rc::new(5);
    let mut buffer = GapBuffer::new();
    buffer.insert(0, [Rc::clone(&value), Rc::clone(&value)]);
    assert_eq!(Rc::strong_count(&value), 3);

    let removed = buffer.remove_range(0, 2);
    drop(removed);
    assert_eq!(Rc::strong_count(&value), 1);
    assert!(buffer.is_empty());
}

#[test]
fn test_set_and_get_mut() {
    let mut buffer: GapBuffer<i32> = (0..5).collect();
    buffer.move_gap_to(2);
    assert_eq!(buffer.set(3, 30), 3);
    *buffer.get_mut(0).unwrap() = -1;
    assert_eq!(buffer.to_vec(), vec![-1, 1, 2, 30, 4]);
    assert_eq!(buffer.range(1, 4).copied().collect::<Vec<_>>(), vec![1, 2, 30]);
}

#[test]
fn test_clear() {
    let mut buffer: GapBuffer<i32> = (0..5).collect();
    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.capacity(), 0);
    buffer.insert_one(0, 7);
    assert_eq!(buffer.to_vec(), vec![7]);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_index_past_end_panics() {
    let buffer: GapBuffer<i32> = (0..3).collect();
    let _ = buffer[3];
}

#[test]
#[should_panic(expected = "out of range")]
fn test_insert_past_end_panics() {
    let mut buffer: GapBuffer<i32> = (0..3).collect();
    buffer.insert_one(4, 0);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_inverted_range_panics() {
    let mut buffer: GapBuffer<i32> = (0..3).collect();
    buffer.remove_range(2, 1);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_move_gap_past_end_panics() {
    let mut buffer: GapBuffer<i32> = (0..3).collect();
    buffer.move_gap_to(4);
}

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, Vec<u16>),
    Remove(usize, usize),
    Set(usize, u16),
    MoveGap(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), prop::collection::vec(any::<u16>(), 0..40))
            .prop_map(|(at, values)| Op::Insert(at, values)),
        (any::<usize>(), 0usize..12).prop_map(|(at, len)| Op::Remove(at, len)),
        (any::<usize>(), any::<u16>()).prop_map(|(at, value)| Op::Set(at, value)),
        any::<usize>().prop_map(Op::MoveGap),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_matches_vec(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let mut buffer = GapBuffer::new();
        let mut model: Vec<u16> = Vec::new();
        for op in ops {
            match op {
                Op::Insert(at, values) => {
                    let at = at % (model.len() + 1);
                    buffer.insert(at, values.iter().copied());
                    model.splice(at..at, values);
                }
                Op::Remove(at, len) => {
                    let start = at % (model.len() + 1);
                    let end = (start + len).min(model.len());
                    let removed = buffer.remove_range(start, end);
                    let expected: Vec<u16> = model.drain(start..end).collect();
                    prop_assert_eq!(removed, expected);
                }
                Op::Set(at, value) => {
                    if !model.is_empty() {
                        let at = at % model.len();
                        let previous = buffer.set(at, value);
                        prop_assert_eq!(previous, std::mem::replace(&mut model[at], value));
                    }
                }
                Op::MoveGap(at) => {
                    buffer.move_gap_to(at % (model.len() + 1));
                }
            }
            prop_assert_eq!(buffer.len(), model.len());
            prop_assert!(buffer.gap_start() <= buffer.len());
        }
        prop_assert_eq!(buffer.to_vec(), model);
    }
}

use crate::prelude::*;
use cranpose_slots::{Key, Slot, SlotTable, SlotValue};

fn list(keys: &[u64]) -> Vec<TreeNode> {
    keys.iter()
        .map(|&key| call(key).remember(format!("item {key}")).child(node(key + 1000)))
        .collect()
}

#[test]
fn test_compose_builds_described_tree() {
    init_logging();
    let table = SlotTable::new();
    let value = Slot::value(42);
    let tree = vec![call(1u64)
        .slot(value.clone())
        .child(data(2u64).remember("label"))
        .child(node(3u64).child(node(4u64)))];

    let report = compose(&table, &tree).unwrap();

    assert_eq!(report.inserted, 4);
    assert_table_matches(&table, &tree);
    assert_eq!(table.root_node_count(), tree[0].node_contribution());
    table.verify_well_formed().unwrap();
}

#[test]
fn test_recompose_same_tree_is_noop() {
    init_logging();
    let table = SlotTable::new();
    let tree = list(&[1, 2, 3]);
    compose(&table, &tree).unwrap();
    let before = TableShape::capture(&table).unwrap();

    let report = compose(&table, &tree).unwrap();

    assert!(report.is_noop());
    assert!(report.released_slots.is_empty());
    assert_eq!(TableShape::capture(&table).unwrap(), before);
}

#[test]
fn test_reorder_preserves_state() {
    init_logging();
    let table = SlotTable::new();
    compose(&table, &list(&[1, 2, 3, 4])).unwrap();
    let before = TableShape::capture(&table).unwrap();

    let report = compose(&table, &list(&[4, 3, 2, 1])).unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.removed(), 0);
    assert!(report.moved >= 1);
    let after = TableShape::capture(&table).unwrap();
    assert_eq!(
        after.root_keys(),
        [4u64, 3, 2, 1].map(Key::new).to_vec()
    );
    // every remembered value is the same allocation as before the reorder
    for group in after.groups.iter().filter(|group| group.depth == 0) {
        let old = before.groups.iter().find(|old| old.key == group.key).unwrap();
        assert_eq!(group, old);
    }
    table.verify_well_formed().unwrap();
}

#[test]
fn test_insert_and_remove_in_long_list() {
    init_logging();
    let table = SlotTable::new();
    let keys: Vec<u64> = (0..50).collect();
    compose(&table, &list(&keys)).unwrap();

    let mut grown = keys.clone();
    grown.insert(25, 500);
    let report = compose(&table, &list(&grown)).unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.removed(), 0);
    assert_table_matches(&table, &list(&grown));

    let shrunk: Vec<u64> = grown.iter().copied().filter(|key| key % 10 != 3).collect();
    let report = compose(&table, &list(&shrunk)).unwrap();
    assert_eq!(report.removed(), 10);
    let disposed: Vec<String> = report
        .disposed_values()
        .filter_map(|value| value.downcast_ref::<String>().cloned())
        .collect();
    assert_eq!(disposed.len(), 5);
    assert!(disposed.contains(&"item 13".to_string()));
    assert_table_matches(&table, &list(&shrunk));
    assert_eq!(table.root_node_count(), shrunk.len());
}

#[test]
fn test_changed_value_reported_once() {
    init_logging();
    let table = SlotTable::new();
    let first = SlotValue::new(1);
    compose(&table, &[call(1u64).slot(first.clone())]).unwrap();

    let report = compose(&table, &[call(1u64).slot(Slot::value(2))]).unwrap();

    assert_eq!(report.changed_slots.len(), 1);
    assert!(report.released_slots[0].ptr_eq(&first));
}

#[test]
fn test_keep_slot_retains_value() {
    init_logging();
    let table = SlotTable::new();
    let value = Slot::value("kept");
    compose(&table, &[data(7u64).slot(value.clone())]).unwrap();

    compose(&table, &[data(7u64).keep_slot()]).unwrap();

    let shape = TableShape::capture(&table).unwrap();
    assert!(shape.groups[0].slots[0].same_as(&value));
}

#[test]
fn test_nested_node_counts_match_tree() {
    init_logging();
    let table = SlotTable::new();
    let tree = vec![
        call(1u64).child(node(2u64).child(node(3u64)).child(node(4u64))),
        call(5u64).child(call(6u64).child(node(7u64))),
        node(8u64),
    ];
    compose(&table, &tree).unwrap();

    let expected: usize = tree.iter().map(TreeNode::node_contribution).sum();
    assert_eq!(table.root_node_count(), expected);
    assert_eq!(expected, 3);
    let shape = TableShape::capture(&table).unwrap();
    assert_eq!(shape.len(), tree.iter().map(TreeNode::size).sum::<usize>());
}

fn nested_list(keys: &[u64]) -> Vec<TreeNode> {
    keys.iter()
        .map(|&key| {
            call(key).remember(format!("row {key}")).child(
                data(key + 1000)
                    .remember(format!("label {key}"))
                    .child(node(key + 2000).remember(format!("text {key}"))),
            )
        })
        .collect()
}

#[test]
fn test_reorder_preserves_nested_state() {
    init_logging();
    let table = SlotTable::new();
    compose(&table, &nested_list(&[1, 2, 3, 4])).unwrap();
    let before = TableShape::capture(&table).unwrap();

    let report = compose(&table, &nested_list(&[3, 1, 4, 2])).unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.removed(), 0);
    assert!(report.changed_slots.is_empty());
    let after = TableShape::capture(&table).unwrap();
    assert_eq!(after.len(), before.len());
    for group in &after.groups {
        let old = before
            .groups
            .iter()
            .find(|old| old.key == group.key)
            .unwrap();
        assert_eq!(group, old, "state of {} was not carried along", group.key);
        assert_eq!(group.slots.len(), 1);
    }
    assert_table_matches(&table, &nested_list(&[3, 1, 4, 2]));
    table.verify_well_formed().unwrap();
}

#[test]
fn test_filling_empty_slot_is_a_change() {
    init_logging();
    let table = SlotTable::new();
    compose(&table, &[call(1u64).slot(Slot::Empty)]).unwrap();

    let report = compose(&table, &[call(1u64).slot(SlotValue::new(5))]).unwrap();

    assert_eq!(report.changed_slots.len(), 1);
    assert!(report.released_slots.is_empty());
}

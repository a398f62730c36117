//! Tests for session discipline, rollback, anchors and verification.

use crate::{Slot, SlotTable, SlotTableError, SlotValue};

fn populate(table: &SlotTable, keys: &[u64]) {
    table
        .write(|writer| {
            for &key in keys {
                writer.start_group(key);
                writer.record_slot(SlotValue::new(key));
                writer.end_group();
            }
        })
        .unwrap();
}

#[test]
fn test_readers_block_writer() {
    let table = SlotTable::new();
    let first = table.open_reader().unwrap();
    let second = table.open_reader().unwrap();
    assert_eq!(table.reader_count(), 2);
    assert_eq!(
        table.open_writer().unwrap_err(),
        SlotTableError::ReaderActive { readers: 2 }
    );
    drop(first);
    drop(second);
    assert_eq!(table.reader_count(), 0);
    assert!(table.open_writer().is_ok());
}

#[test]
fn test_writer_blocks_everything() {
    let table = SlotTable::new();
    let writer = table.open_writer().unwrap();
    assert!(table.is_writing());
    assert_eq!(table.open_reader().unwrap_err(), SlotTableError::WriterActive);
    assert_eq!(table.open_writer().unwrap_err(), SlotTableError::WriterActive);
    assert_eq!(
        table.verify_well_formed().unwrap_err(),
        SlotTableError::WriterActive
    );
    assert_eq!(table.dump(), "<writer active>\n");
    drop(writer);
    assert!(!table.is_writing());
    assert!(table.open_reader().is_ok());
}

#[test]
fn test_error_display() {
    assert_eq!(
        SlotTableError::ReaderActive { readers: 3 }.to_string(),
        "cannot start a writer while 3 reader(s) are open"
    );
    assert_eq!(
        SlotTableError::WriterActive.to_string(),
        "a writer session is open"
    );
}

#[test]
fn test_abandon_restores_table() {
    let table = SlotTable::new();
    populate(&table, &[1, 2, 3]);
    let before = table.dump();
    let anchor = table.read(|reader| reader.anchor(2)).unwrap();

    let mut writer = table.open_writer().unwrap();
    writer.start_group(3u64);
    writer.record_slot(Slot::value("changed"));
    writer.end_group();
    writer.start_group(9u64);
    writer.end_group();
    writer.abandon();

    assert_eq!(table.dump(), before);
    assert_eq!(table.group_count(), 3);
    assert_eq!(table.read(|reader| reader.anchor_index(anchor)).unwrap(), Some(2));
    table.verify_well_formed().unwrap();
}

#[test]
fn test_panicking_write_rolls_back() {
    let table = SlotTable::new();
    populate(&table, &[1, 2]);
    let before = table.dump();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        table
            .write(|writer| {
                writer.remove_group();
                panic!("composition failed");
            })
            .unwrap();
    }));

    assert!(result.is_err());
    assert!(!table.is_writing());
    assert_eq!(table.dump(), before);
}

#[test]
fn test_anchor_follows_moves_and_goes_stale() {
    let table = SlotTable::new();
    populate(&table, &[1, 2, 3]);
    let anchor = table.read(|reader| reader.anchor(2)).unwrap();

    populate(&table, &[3, 1, 2]);
    assert_eq!(table.read(|reader| reader.anchor_index(anchor)).unwrap(), Some(0));

    populate(&table, &[4, 1, 2, 3]);
    assert_eq!(table.read(|reader| reader.anchor_index(anchor)).unwrap(), Some(3));

    populate(&table, &[1, 2]);
    assert_eq!(table.read(|reader| reader.anchor_index(anchor)).unwrap(), None);

    // the released index is recycled without reviving the stale anchor
    populate(&table, &[1, 2, 5]);
    table
        .read(|reader| {
            assert_eq!(reader.anchor_index(anchor), None);
            assert_ne!(reader.anchor(2), anchor);
        })
        .unwrap();
    table.verify_well_formed().unwrap();
}

#[test]
fn test_dump_renders_tree() {
    let table = SlotTable::new();
    assert_eq!(table.dump(), "<EMPTY>\n");

    table
        .write(|writer| {
            writer.start_group(0x10u64);
            writer.record_slot(Slot::value(7));
            writer.start_node(0x20u64);
            writer.end_group();
            writer.end_group();
        })
        .unwrap();

    assert_eq!(
        table.dump(),
        "Group(0) key=0x10 kind=Call nodes=1 size=2, slots=[7]\n Group(1) key=0x20 kind=Node nodes=0 size=1\n"
    );
}

#[test]
fn test_with_capacity_avoids_growth() {
    let table = SlotTable::with_capacity(64, 64);
    populate(&table, &(0..20).collect::<Vec<u64>>());
    assert_eq!(table.group_count(), 20);
    assert_eq!(table.slot_count(), 20);
    assert!(!table.is_empty());
}

#[test]
fn test_large_shuffle_stays_well_formed() {
    let table = SlotTable::new();
    let mut keys: Vec<u64> = (0..64).collect();
    populate(&table, &keys);
    for round in 0..8u64 {
        keys.rotate_left(((round * 7) % 64) as usize);
        keys.retain(|key| (key + round) % 11 != 0);
        keys.push(1000 + round);
        populate(&table, &keys);
        table.verify_well_formed().unwrap();
        let stored: Vec<u64> = table
            .read(|reader| {
                reader
                    .root_groups()
                    .map(|group| reader.group_key(group).source())
                    .collect()
            })
            .unwrap();
        assert_eq!(stored, keys);
    }
}

#[test]
fn test_dump_shows_payload() {
    let table = SlotTable::new();
    table
        .write(|writer| {
            writer.start_node_with(0x30u64, Slot::value(3));
            writer.end_group();
        })
        .unwrap();

    assert_eq!(
        table.dump(),
        "Group(0) key=0x30 kind=Node nodes=0 size=1, payload=3\n"
    );
}

use cranpose_slots::{location_key, SlotTable};
use cranpose_slots_testing::{call, compose, node, TreeNode};
use criterion::{criterion_group, criterion_main, Criterion};

fn item_list(keys: &[u64]) -> Vec<TreeNode> {
    let base = location_key(file!(), line!(), column!()).source();
    keys.iter()
        .map(|&key| {
            call(base ^ key)
                .remember(format!("row {key}"))
                .child(node(key).remember("text"))
        })
        .collect()
}

fn retain_only_recomposition(c: &mut Criterion) {
    let table = SlotTable::new();
    let keys: Vec<u64> = (0..1_000).collect();
    let tree = item_list(&keys);
    compose(&table, &tree).expect("initial compose");

    c.bench_function("retain_only_1000", |b| {
        b.iter(|| compose(&table, &tree).expect("compose"));
    });
}

fn reorder_siblings(c: &mut Criterion) {
    let table = SlotTable::new();
    let keys: Vec<u64> = (0..200).collect();
    let forward = item_list(&keys);
    let mut rotated_keys = keys.clone();
    rotated_keys.rotate_left(50);
    let rotated = item_list(&rotated_keys);
    compose(&table, &forward).expect("initial compose");

    let mut flip = false;
    c.bench_function("reorder_rotate_200", |b| {
        b.iter(|| {
            flip = !flip;
            let tree = if flip { &rotated } else { &forward };
            compose(&table, tree).expect("compose")
        });
    });
}

fn insert_in_long_list(c: &mut Criterion) {
    let table = SlotTable::new();
    let keys: Vec<u64> = (0..1_000).collect();
    let plain = item_list(&keys);
    let mut with_middle = keys.clone();
    with_middle.insert(500, 10_000);
    let grown = item_list(&with_middle);
    compose(&table, &plain).expect("initial compose");

    let mut grow = false;
    c.bench_function("insert_remove_middle_1000", |b| {
        b.iter(|| {
            grow = !grow;
            let tree = if grow { &grown } else { &plain };
            compose(&table, tree).expect("compose")
        });
    });
}

criterion_group!(
    benches,
    retain_only_recomposition,
    reorder_siblings,
    insert_in_long_list
);
criterion_main!(benches);

use bson::doc;
use nexusmatch::collection::{Collection, RecordId};
use nexusmatch::config::QueryConfig;
use nexusmatch::query::{CompiledQuery, FindOptions, IndexDirection, compile};

const NUM_OBJS: i32 = 10;

fn foo() -> Collection {
    let col = Collection::new("foo", QueryConfig::default());
    for i in 0..NUM_OBJS {
        col.insert(doc! {"_id": i});
    }
    col
}

fn all() -> CompiledQuery {
    compile(&doc! {}, &QueryConfig::default()).unwrap()
}

fn batched(n: usize) -> FindOptions {
    FindOptions { limit: None, batch_size: Some(n) }
}

#[test]
fn cursors_survive_relocating_the_upper_half() {
    let col = foo();
    let q = all();
    let cursor1 = col.find(&q, &batched(3));
    assert_eq!(cursor1.objs_left_in_batch(), 3);
    let cursor2 = col.find(&q, &batched(5));
    assert_eq!(cursor2.objs_left_in_batch(), 5);
    let cursor3 = col.find(&q, &batched(7));
    assert_eq!(cursor3.objs_left_in_batch(), 7);

    // Move every record with _id >= 5 elsewhere: drop and re-insert under new ids.
    let moved: Vec<RecordId> = (5..NUM_OBJS as u64).map(RecordId).collect();
    for id in moved {
        let data = col.remove(id).expect("record present");
        col.insert(data);
    }
    assert_eq!(col.len(), NUM_OBJS as usize);

    assert_eq!(cursor1.itcount(), NUM_OBJS as usize, "c1");
    assert_eq!(cursor2.itcount(), NUM_OBJS as usize, "c2");
    assert_eq!(cursor3.itcount(), NUM_OBJS as usize, "c3");
}

#[test]
fn batches_refill_until_exhausted() {
    let col = foo();
    let mut cur = col.find(&all(), &batched(4));
    let mut sizes = Vec::new();
    while cur.has_next() {
        let left = cur.objs_left_in_batch();
        if left == 0 {
            cur.advance();
            sizes.push(cur.objs_left_in_batch() + 1);
            continue;
        }
        for _ in 0..left {
            assert!(cur.advance().is_some());
        }
    }
    assert_eq!(sizes, vec![4, 2]);
    assert!(cur.advance().is_none());
}

#[test]
fn cursor_keeps_removed_records_in_yield_order() {
    let col = foo();
    col.create_index("_id", IndexDirection::Asc);
    let q = compile(&doc! {"_id": {"$gte": 3}}, col.config()).unwrap();
    let cur = col.find(&q, &batched(2));
    for i in 0..NUM_OBJS as u64 {
        col.remove(RecordId(i));
    }
    assert!(col.is_empty());
    let ids: Vec<i32> = cur.map(|r| r.data.get_i32("_id").unwrap()).collect();
    assert_eq!(ids, (3..NUM_OBJS).collect::<Vec<_>>());
}

#[test]
fn zero_batch_size_is_treated_as_one() {
    let col = foo();
    let cur = col.find(&all(), &batched(0));
    assert_eq!(cur.objs_left_in_batch(), 1);
    assert_eq!(cur.to_vec().len(), NUM_OBJS as usize);
}

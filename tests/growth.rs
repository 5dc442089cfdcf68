//! Resizable arrays: length, capacity, push/pop.
//!
//! Covers:
//! - push across many reallocation tiers keeps earlier content intact
//! - grown regions read as zero; shrink-then-grow re-exposes zeros
//! - trim returns excess capacity without losing content
//! - pop returns elements in reverse push order
//! - a pending copy-on-next-write resolves before a length change lands

use bigarray::{PoolMemoryModel, NoContext};

#[test]
fn push_hundred_thousand_elements() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i32>(0).unwrap();
    assert!(a.is_new());
    // crosses the x3, x2, and x1.5 growth tiers
    for i in 0..100_000 {
        a.push(i).unwrap();
    }
    assert_eq!(a.length(), 100_000);
    assert!(a.capacity() >= 100_000);
    // still an original allocation, not a view
    assert!(a.is_new());
    for i in (0..100_000).step_by(997) {
        assert_eq!(a.get(i as u64).unwrap(), i);
    }
    assert_eq!(a.get(99_999).unwrap(), 99_999);
}

#[test]
fn grown_region_reads_zero() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i64>(3).unwrap();
    a.fill_all(7).unwrap();
    a.set_length(10).unwrap();
    assert_eq!(a.get(2).unwrap(), 7);
    for i in 3..10 {
        assert_eq!(a.get(i).unwrap(), 0);
    }
}

#[test]
fn shrink_then_grow_re_exposes_zeros() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<u8>(10).unwrap();
    a.fill_all(0xFF).unwrap();
    a.set_length(4).unwrap();
    a.set_length(10).unwrap();
    for i in 0..4 {
        assert_eq!(a.get(i).unwrap(), 0xFF);
    }
    for i in 4..10 {
        assert_eq!(a.get(i).unwrap(), 0);
    }
}

#[test]
fn trim_keeps_content() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i32>(0).unwrap();
    for i in 0..1000 {
        a.push(i).unwrap();
    }
    assert!(a.capacity() > 1000);
    a.trim().unwrap();
    assert_eq!(a.capacity(), 1000);
    for i in 0..1000 {
        assert_eq!(a.get(i as u64).unwrap(), i as i32);
    }
}

#[test]
fn pop_reverses_push_order() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i16>(0).unwrap();
    for i in 0..100 {
        a.push(i).unwrap();
    }
    for i in (0..100).rev() {
        assert_eq!(a.pop().unwrap(), i);
    }
    assert!(a.is_empty());
    assert!(a.pop().is_err());
}

#[test]
fn length_change_resolves_pending_copy_on_write_first() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i32>(10).unwrap();
    for i in 0..10 {
        a.set(i, i as i32).unwrap();
    }

    let mut cow = a.as_copy_on_next_write();
    cow.set_length(5).unwrap();
    assert_eq!(cow.length(), 5);
    assert!(!cow.is_copy_on_next_write());
    for i in 0..5 {
        assert_eq!(cow.get(i).unwrap(), i as i32);
    }
    // the original keeps its full content; the shrink happened privately
    assert_eq!(a.length(), 10);
    for i in 0..10 {
        assert_eq!(a.get(i).unwrap(), i as i32);
    }
}

#[test]
fn copy_from_between_independent_arrays() {
    let model = PoolMemoryModel::native();
    let mut src = model.new_array::<f32>(1000).unwrap();
    for i in 0..1000 {
        src.set(i, i as f32 / 2.0).unwrap();
    }
    let mut dst = model.new_array::<f32>(600).unwrap();
    dst.copy_from(&NoContext, &src).unwrap();
    // only the common prefix is copied
    assert_eq!(dst.length(), 600);
    assert_eq!(dst.get(0).unwrap(), 0.0);
    assert_eq!(dst.get(599).unwrap(), 299.5);
}

#[test]
fn overlapping_copy_between_views_of_one_storage() {
    let model = PoolMemoryModel::native();
    let mut root = model.new_array::<i32>(150_000).unwrap();
    let values: Vec<i32> = (0..150_000).collect();
    root.set_range(0, &values).unwrap();

    // forward-overlapping windows: more than one chunk, destination above
    // the source, so unread source elements must survive chunking
    let src = root.sub_array(0, 100_000).unwrap();
    let mut dst = root.sub_array(30_000, 130_000).unwrap();
    dst.copy_from(&NoContext, &src).unwrap();
    for i in [0u64, 29_999, 30_000, 65_535, 65_536, 99_999] {
        assert_eq!(root.get(30_000 + i).unwrap(), i as i32);
    }
    // elements below the destination window are untouched
    assert_eq!(root.get(29_999).unwrap(), 29_999);
}

#[test]
fn swap_with_exchanges_prefixes() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<u8>(4).unwrap();
    let mut b = model.new_array::<u8>(4).unwrap();
    a.fill_all(1).unwrap();
    b.fill_all(2).unwrap();
    a.swap_with(&NoContext, &mut b).unwrap();
    assert_eq!(a.get(3).unwrap(), 2);
    assert_eq!(b.get(3).unwrap(), 1);
}

#[test]
fn bulk_range_round_trip() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<f64>(10_000).unwrap();
    let values: Vec<f64> = (0..5_000).map(|i| i as f64 * 0.25 - 100.0).collect();
    a.set_range(2_500, &values).unwrap();
    let mut back = vec![0.0f64; 5_000];
    a.get_range(2_500, &mut back).unwrap();
    assert_eq!(back, values);
    // neighbors keep their zero filling
    assert_eq!(a.get(2_499).unwrap(), 0.0);
    assert_eq!(a.get(7_500).unwrap(), 0.0);
    // a range past the end is rejected before any write
    assert!(a.set_range(9_999, &values[..2]).is_err());
}

#[test]
fn search_respects_range_clamping() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_array::<i32>(100).unwrap();
    a.set(10, 5).unwrap();
    a.set(90, 5).unwrap();
    assert_eq!(a.index_of(0, 100, 5).unwrap(), Some(10));
    assert_eq!(a.index_of(11, 100, 5).unwrap(), Some(90));
    assert_eq!(a.last_index_of(0, 100, 5).unwrap(), Some(90));
    assert_eq!(a.last_index_of(0, 90, 5).unwrap(), Some(10));
    // the high bound is clamped to the length, not an error
    assert_eq!(a.index_of(0, 1_000_000, 5).unwrap(), Some(10));
    assert_eq!(a.index_of(95, 20, 5).unwrap(), None);
}

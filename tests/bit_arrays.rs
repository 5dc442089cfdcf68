//! Packed-bit arrays.
//!
//! Covers:
//! - single-bit and up-to-64-bit access at word-unaligned positions
//! - packed bulk transfer to and from u64 buffers
//! - word-alignment probing for views at arbitrary bit offsets
//! - bit views alias their parent like any other view

use bigarray::PoolMemoryModel;

#[test]
fn single_bits_round_trip() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(200).unwrap();
    for i in (0..200).step_by(3) {
        a.set(i, true).unwrap();
    }
    for i in 0..200 {
        assert_eq!(a.get(i).unwrap(), i % 3 == 0);
    }
}

#[test]
fn bit_runs_cross_word_boundaries() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(256).unwrap();
    a.set_bits64(60, 0x3FF, 10).unwrap();
    assert_eq!(a.get_bits64(60, 10).unwrap(), 0x3FF);
    assert!(!a.get(59).unwrap());
    assert!(a.get(63).unwrap());
    assert!(a.get(64).unwrap());
    assert!(!a.get(70).unwrap());
    // reading an empty run and a full word
    assert_eq!(a.get_bits64(0, 0).unwrap(), 0);
    assert_eq!(a.get_bits64(60, 64).unwrap() & 0x3FF, 0x3FF);
    assert!(a.get_bits64(200, 60).is_err());
    assert!(a.set_bits64(0, 0, 65).is_err());
}

#[test]
fn packed_bulk_transfer() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(300).unwrap();
    let src = [0xDEAD_BEEF_CAFE_F00Du64, 0x0123_4567_89AB_CDEF, 0x5555];
    a.set_bits(17, &src, 150).unwrap();
    let mut back = [0u64; 3];
    a.get_bits(17, &mut back, 150).unwrap();
    assert_eq!(back[0], src[0]);
    assert_eq!(back[1], src[1]);
    assert_eq!(back[2], src[2] & ((1 << 22) - 1));
    // neighbors untouched
    assert!(!a.get(16).unwrap());
    assert!(!a.get(167).unwrap());
}

#[test]
fn next_quick_position_finds_word_alignment() {
    let model = PoolMemoryModel::native();
    let a = model.new_bit_array(1000).unwrap();
    // the root is word aligned at multiples of 64
    assert_eq!(a.next_quick_position(0), Some(0));
    assert_eq!(a.next_quick_position(1), Some(64));
    assert_eq!(a.next_quick_position(64), Some(64));
    assert_eq!(a.next_quick_position(999), None);
    assert_eq!(a.next_quick_position(1000), None);

    // a view at bit offset 10 aligns where offset + pos is a word multiple
    let view = a.sub_array(10, 500).unwrap();
    assert_eq!(view.next_quick_position(0), Some(54));
    assert_eq!(view.next_quick_position(54), Some(54));
    assert_eq!(view.next_quick_position(55), Some(118));
}

#[test]
fn bit_views_alias_parent() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(128).unwrap();
    let view = a.sub_array(65, 128).unwrap();
    a.set(70, true).unwrap();
    assert!(view.get(5).unwrap());

    let mut cow = a.as_copy_on_next_write();
    cow.set(70, false).unwrap();
    assert!(a.get(70).unwrap());
    assert!(!cow.get(70).unwrap());
}

#[test]
fn bit_fill_and_search() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(1024).unwrap();
    a.fill(100, 700, true).unwrap();
    assert_eq!(a.index_of(0, 1024, true).unwrap(), Some(100));
    assert_eq!(a.last_index_of(0, 1024, true).unwrap(), Some(799));
    assert_eq!(a.index_of(100, 1024, false).unwrap(), Some(800));
    a.fill_all(false).unwrap();
    assert_eq!(a.index_of(0, 1024, true).unwrap(), None);
}

#[test]
fn bit_push_and_pop() {
    let model = PoolMemoryModel::native();
    let mut a = model.new_bit_array(0).unwrap();
    for i in 0..100 {
        a.push(i % 7 == 0).unwrap();
    }
    assert_eq!(a.length(), 100);
    for i in (0..100).rev() {
        assert_eq!(a.pop().unwrap(), i % 7 == 0);
    }
}

//! Mapped arrays over caller-supplied files.
//!
//! Covers:
//! - content written through a mapped window survives flush and reopen
//! - windows at a non-zero byte offset address the right file region
//! - read-only mappings reject mutation at the handle and storage level
//! - foreign byte order persists portably
//! - a mapped scratch array grows across many pushes

use bigarray::{ByteOrder, MappedMemoryModel};
use tempfile::tempdir;

fn prepared_file(dir: &std::path::Path, bytes: u64) -> std::path::PathBuf {
    let path = dir.join("data.bam");
    let file = std::fs::File::create(&path).unwrap();
    file.set_len(bytes).unwrap();
    path
}

#[test]
fn write_flush_reopen() {
    let dir = tempdir().unwrap();
    let model = MappedMemoryModel::new(dir.path(), ByteOrder::NATIVE).unwrap();
    let path = prepared_file(dir.path(), 10_000 * 8);

    {
        let mut a = model.map_existing::<i64>(&path, 0, 10_000, false).unwrap();
        for i in 0..10_000 {
            a.set(i, i as i64 * 3).unwrap();
        }
        a.flush_resources(true).unwrap();
    }

    let a = model.map_existing::<i64>(&path, 0, 10_000, true).unwrap();
    assert!(a.is_immutable());
    assert!(a.is_new_read_only_view());
    assert_eq!(a.get(0).unwrap(), 0);
    assert_eq!(a.get(9_999).unwrap(), 9_999 * 3);
}

#[test]
fn window_at_byte_offset() {
    let dir = tempdir().unwrap();
    let model = MappedMemoryModel::new(dir.path(), ByteOrder::NATIVE).unwrap();
    let path = prepared_file(dir.path(), 4096);

    {
        let mut whole = model.map_existing::<i32>(&path, 0, 1024, false).unwrap();
        for i in 0..1024 {
            whole.set(i, i as i32).unwrap();
        }
        whole.flush_resources(true).unwrap();
    }

    // elements 100.. of the whole file, seen from byte offset 400
    let window = model.map_existing::<i32>(&path, 400, 100, true).unwrap();
    assert_eq!(window.get(0).unwrap(), 100);
    assert_eq!(window.get(99).unwrap(), 199);

    // a window past the end of the file is rejected up front
    assert!(model.map_existing::<i32>(&path, 4000, 100, true).is_err());
}

#[test]
fn read_only_mapping_rejects_mutation() {
    let dir = tempdir().unwrap();
    let model = MappedMemoryModel::new(dir.path(), ByteOrder::NATIVE).unwrap();
    let path = prepared_file(dir.path(), 256);

    let mut a = model.map_existing::<u8>(&path, 0, 256, false).unwrap();
    a.fill_all(9).unwrap();
    a.flush_resources(true).unwrap();

    let mut ro = model.map_existing::<u8>(&path, 0, 256, true).unwrap();
    assert!(ro.set(0, 1).is_err());
    assert!(ro.fill_all(0).is_err());
    assert_eq!(ro.get(255).unwrap(), 9);
}

#[test]
fn foreign_byte_order_round_trips() {
    let dir = tempdir().unwrap();
    let model = MappedMemoryModel::new(dir.path(), ByteOrder::Big).unwrap();
    let path = prepared_file(dir.path(), 100 * 4);

    {
        let mut a = model.map_existing::<i32>(&path, 0, 100, false).unwrap();
        a.set(0, 0x0102_0304).unwrap();
        a.flush_resources(true).unwrap();
    }

    // the first element's bytes are big-endian on disk regardless of host
    let raw = std::fs::read(&path).unwrap();
    assert_eq!(&raw[..4], &[0x01, 0x02, 0x03, 0x04]);

    let a = model.map_existing::<i32>(&path, 0, 100, true).unwrap();
    assert_eq!(a.get(0).unwrap(), 0x0102_0304);
}

#[test]
fn mapped_scratch_array_grows() {
    let dir = tempdir().unwrap();
    let model = MappedMemoryModel::new(dir.path(), ByteOrder::NATIVE).unwrap();
    let mut a = model.new_array::<i64>(0).unwrap();
    for i in 0..200_000 {
        a.push(i).unwrap();
    }
    assert_eq!(a.length(), 200_000);
    for i in (0..200_000).step_by(1777) {
        assert_eq!(a.get(i as u64).unwrap(), i);
    }
    assert_eq!(model.created_files().len(), 1);
    assert!(a.backing_file_path().unwrap().exists());
}

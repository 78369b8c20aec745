use std::io::Write;

use crate::file_io::create_parent_dir_if_not_exist;
use crate::file_io::open_file_for_append;
use crate::file_io::write_into_file;

/// Passed: "/tmp/files/data.txt"
/// Expected: "/tmp/files" created
#[test]
fn test_create_parent_dir_for_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("files").join("data.txt");

    create_parent_dir_if_not_exist(&file_path).unwrap();

    assert!(file_path.parent().unwrap().is_dir());
    // File itself should NOT be created
    assert!(!file_path.exists());
}

#[test]
fn test_create_parent_dir_accepts_bare_file_name() {
    assert!(create_parent_dir_if_not_exist(std::path::Path::new("plain.cfg")).is_ok());
}

#[test]
fn test_open_file_for_append_keeps_existing_content() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("logs").join("d.log");

    open_file_for_append(&path).unwrap().write_all(b"first\n").unwrap();
    open_file_for_append(&path).unwrap().write_all(b"second\n").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
}

#[test]
fn test_write_into_file_overwrites() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("etc").join("Production.cfg");

    write_into_file(&path, b"a = 1\nb = 2\n").unwrap();
    write_into_file(&path, b"a = 3\n").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "a = 3\n");
}

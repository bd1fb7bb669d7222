use std::fs;

use portal_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("runs").join("2024");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("table.csv", "a,b\n").unwrap();
    assert_eq!(first.file_name().unwrap(), "table.csv");
    assert_eq!(fs::read_to_string(&first).unwrap(), "a,b\n");

    let second = writer.write("table.csv", b"c,d\n".to_vec()).unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "c,d\n");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn refuses_a_file_as_output_dir() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("table.csv", "data");
    assert!(matches!(result, Err(PersistError::OutputDir { .. })));
    assert!(!file_path.with_file_name("table.csv").exists());
}

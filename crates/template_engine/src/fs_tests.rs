use super::*;
use std::io::ErrorKind;

#[test]
fn test_os_fs_roundtrip_write_read() {
    let fs = OsFs;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");

    fs.write_file(&file, b"hello", WriteMode::Truncate).unwrap();
    assert_eq!(fs.read_file(&file).unwrap(), b"hello");

    let meta = fs.stat(&file).unwrap();
    assert!(meta.is_file);
    assert!(!meta.is_dir);
}

#[test]
fn test_create_new_fails_if_exists() {
    let fs = OsFs;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.txt");
    fs.write_file(&file, b"1", WriteMode::Truncate).unwrap();

    let err = fs
        .write_file(&file, b"2", WriteMode::CreateNew)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_remove_all_missing_path_is_ok() {
    let fs = OsFs;
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    fs.remove_all(&missing).unwrap();
}

#[test]
fn test_walk_dir_lists_files_and_dirs() {
    let fs = OsFs;
    let dir = tempfile::tempdir().unwrap();
    fs.mkdir_all(&dir.path().join("sub")).unwrap();
    fs.write_file(
        &dir.path().join("sub/f.txt"),
        b"x",
        WriteMode::Truncate,
    )
    .unwrap();

    let entries = fs.walk_dir(dir.path()).unwrap();
    assert!(entries.iter().any(|e| e.is_dir && e.path.ends_with("sub")));
    assert!(entries
        .iter()
        .any(|e| !e.is_dir && e.path.ends_with("f.txt")));
}

#[test]
fn test_injecting_fs_fails_configured_path_only() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target.txt");
    let other = dir.path().join("other.txt");
    OsFs.write_file(&target, b"a", WriteMode::Truncate).unwrap();
    OsFs.write_file(&other, b"b", WriteMode::Truncate).unwrap();

    let mut fs = InjectingFs::new(OsFs);
    fs.fail_on(InjectedFailure::ReadFile, &target);

    assert!(fs.read_file(&target).is_err());
    assert_eq!(fs.read_file(&other).unwrap(), b"b");
}

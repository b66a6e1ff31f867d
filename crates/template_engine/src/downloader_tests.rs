use super::*;
use std::fs;

#[test]
fn test_local_dir_downloader_copies_contents() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    fs::write(src.path().join("spec.yaml"), "api_version: v1beta3\n").unwrap();
    fs::create_dir_all(src.path().join("nested")).unwrap();
    fs::write(src.path().join("nested/a.txt"), "hello").unwrap();

    let downloader = LocalDirDownloader::new(src.path());
    let meta = downloader
        .download(Path::new("."), out.path(), dest.path())
        .unwrap();

    assert_eq!(meta.location_type, "local_dir");
    assert!(!meta.is_canonical);
    assert_eq!(meta.canonical_source, "");
    assert!(out.path().join("spec.yaml").exists());
    assert_eq!(
        fs::read_to_string(out.path().join("nested/a.txt")).unwrap(),
        "hello"
    );
}

#[test]
fn test_local_dir_downloader_does_not_mutate_source() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    fs::write(src.path().join("a.txt"), "original").unwrap();

    let downloader = LocalDirDownloader::new(src.path());
    downloader
        .download(Path::new("."), out.path(), dest.path())
        .unwrap();

    assert_eq!(
        fs::read_to_string(src.path().join("a.txt")).unwrap(),
        "original"
    );
}

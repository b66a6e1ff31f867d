use super::*;
use crate::fs::OsFs;

#[test]
fn test_tracked_dirs_removed_on_drop() {
    let base = tempfile::tempdir().unwrap();
    let created;
    {
        let mut tracker = TempDirTracker::new(Arc::new(OsFs), false);
        created = tracker.mkdtemp(base.path(), "scratch").unwrap();
        assert!(created.exists());
    }
    assert!(!created.exists());
}

#[test]
fn test_keep_flag_preserves_dirs() {
    let base = tempfile::tempdir().unwrap();
    let created;
    {
        let mut tracker = TempDirTracker::new(Arc::new(OsFs), true);
        created = tracker.mkdtemp(base.path(), "scratch").unwrap();
    }
    assert!(created.exists());
    std::fs::remove_dir_all(&created).unwrap();
}

#[test]
fn test_cleanup_now_removes_immediately() {
    let base = tempfile::tempdir().unwrap();
    let mut tracker = TempDirTracker::new(Arc::new(OsFs), true);
    let created = tracker.mkdtemp(base.path(), "scratch").unwrap();
    tracker.cleanup_now();
    assert!(!created.exists());
    assert!(tracker.tracked_dirs().is_empty());
}

use dupe_detective::duplicates::{DuplicateFinder, FinderConfig};
use dupe_detective::scanner::{EntryError, WalkerConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

fn finder() -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_workers(4))
}

#[test]
fn test_hello_world_tree() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/x.txt", b"hello");
    write(dir.path(), "b/y.txt", b"hello");
    write(dir.path(), "c/z.txt", b"world");

    let result = finder().scan(dir.path()).unwrap();

    assert_eq!(result.files_scanned, 3);
    assert_eq!(result.sets.len(), 1);
    let names: Vec<_> = result.sets[0]
        .members
        .iter()
        .map(|m| m.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["x.txt", "y.txt"]);
    assert!(result.sets[0].members.iter().all(|m| m.path.is_absolute()));
    assert!(result.errors.is_empty());
}

#[test]
fn test_removed_copy_disappears_on_rescan() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/x.txt", b"hello");
    let y = write(dir.path(), "b/y.txt", b"hello");
    write(dir.path(), "c/z.txt", b"world");

    assert_eq!(finder().scan(dir.path()).unwrap().sets.len(), 1);
    fs::remove_file(y).unwrap();
    let result = finder().scan(dir.path()).unwrap();
    assert!(result.sets.is_empty());
    assert_eq!(result.files_scanned, 2);
}

#[test]
fn test_same_size_different_content_never_grouped() {
    let dir = tempdir().unwrap();
    for (i, byte) in (b'a'..=b'j').enumerate() {
        write(dir.path(), &format!("f{i}"), &[byte; 512]);
    }

    let result = finder().scan(dir.path()).unwrap();
    assert!(result.sets.is_empty());
    assert_eq!(result.files_hashed, 10);
}

#[test]
fn test_members_follow_discovery_order_across_directories() {
    let dir = tempdir().unwrap();
    write(dir.path(), "z/deep/last.bin", b"payload");
    write(dir.path(), "a/first.bin", b"payload");
    write(dir.path(), "m/middle.bin", b"payload");

    let result = finder().scan(dir.path()).unwrap();
    let paths = result.sets[0].paths();
    assert!(paths[0].ends_with("a/first.bin"));
    assert!(paths[1].ends_with("m/middle.bin"));
    assert!(paths[2].ends_with("z/deep/last.bin"));
}

#[test]
fn test_result_independent_of_worker_count() {
    let dir = tempdir().unwrap();
    for i in 0..60 {
        let content = format!("content-{}", i % 7);
        write(dir.path(), &format!("d{}/f{:02}", i % 4, i), content.as_bytes());
    }

    let single = DuplicateFinder::new(FinderConfig::default().with_workers(1))
        .scan(dir.path())
        .unwrap();
    let many = DuplicateFinder::new(
        FinderConfig::default()
            .with_workers(8)
            .with_queue_capacity(2),
    )
    .scan(dir.path())
    .unwrap();

    assert_eq!(single.sets, many.sets);
    assert_eq!(single.sets.len(), 7);
}

#[test]
fn test_empty_files_form_a_set() {
    let dir = tempdir().unwrap();
    write(dir.path(), "empty1", b"");
    write(dir.path(), "empty2", b"");

    let result = finder().scan(dir.path()).unwrap();
    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].size, 0);
    assert_eq!(result.reclaimable_space(), 0);
}

#[test]
fn test_skip_empty_filter() {
    let dir = tempdir().unwrap();
    write(dir.path(), "empty1", b"");
    write(dir.path(), "empty2", b"");

    let walker_config = WalkerConfig::default().with_skip_empty(true);
    let result = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker_config))
        .scan(dir.path())
        .unwrap();
    assert!(result.sets.is_empty());
    assert_eq!(result.files_scanned, 0);
}

#[test]
fn test_size_filtering() {
    let dir = tempdir().unwrap();
    write(dir.path(), "10a.txt", b"0123456789");
    write(dir.path(), "10b.txt", b"0123456789");
    write(dir.path(), "20a.txt", b"01234567890123456789");
    write(dir.path(), "20b.txt", b"01234567890123456789");

    let walker_config = WalkerConfig {
        min_size: Some(15),
        ..WalkerConfig::default()
    };
    let result = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker_config))
        .scan(dir.path())
        .unwrap();

    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].size, 20);
    assert_eq!(result.files_scanned, 2);
}

#[test]
fn test_ignore_patterns() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep/a.txt", b"same");
    write(dir.path(), "keep/b.txt", b"same");
    write(dir.path(), "node_modules/c.txt", b"same");
    write(dir.path(), "keep/d.tmp", b"same");

    let walker_config = WalkerConfig {
        ignore_patterns: vec!["node_modules/".to_string(), "*.tmp".to_string()],
        ..WalkerConfig::default()
    };
    let result = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker_config))
        .scan(dir.path())
        .unwrap();

    assert_eq!(result.files_scanned, 2);
    assert_eq!(result.sets[0].len(), 2);
}

#[test]
fn test_verification_pass_keeps_true_duplicates() {
    let dir = tempdir().unwrap();
    let content = vec![42u8; 200_000];
    write(dir.path(), "a.bin", &content);
    write(dir.path(), "b.bin", &content);
    write(dir.path(), "c.bin", &[43u8; 200_000]);

    let result = DuplicateFinder::new(FinderConfig::default().with_verify_content(true))
        .scan(dir.path())
        .unwrap();
    assert!(result.verified);
    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].len(), 2);
    assert_eq!(result.reclaimable_space(), 200_000);
}

#[test]
fn test_large_files_with_small_chunks() {
    let dir = tempdir().unwrap();
    let mut content = vec![7u8; 3 * 1024 * 1024];
    write(dir.path(), "a.bin", &content);
    write(dir.path(), "b.bin", &content);
    content[2 * 1024 * 1024] = 8;
    write(dir.path(), "c.bin", &content);

    let result = DuplicateFinder::new(FinderConfig::default().with_chunk_size(4096))
        .scan(dir.path())
        .unwrap();
    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].len(), 2);
    assert_eq!(result.bytes_hashed, 9 * 1024 * 1024);
}

#[cfg(unix)]
fn running_as_root(dir: &Path) -> bool {
    fs::read_dir(dir).is_ok()
}

#[test]
#[cfg(unix)]
fn test_unreadable_directory_is_recorded_and_scan_continues() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "open/a.txt", b"dup");
    write(dir.path(), "open/b.txt", b"dup");
    write(dir.path(), "locked/c.txt", b"dup");
    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if running_as_root(&locked) {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let result = finder().scan(dir.path()).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].len(), 2);
    assert!(result
        .errors
        .iter()
        .any(|e| matches!(e, EntryError::Unreadable { .. }) && e.path().ends_with("locked")));
}

#[test]
#[cfg(unix)]
fn test_unreadable_file_is_excluded_from_grouping() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"dup");
    write(dir.path(), "b.txt", b"dup");
    let locked = write(dir.path(), "c.txt", b"dup");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::File::open(&locked).is_ok() {
        return;
    }

    let result = finder().scan(dir.path()).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].len(), 2);
    assert!(!result.sets[0].contains(&locked));
    assert_eq!(result.errors.len(), 1);
    assert!(matches!(result.errors[0], EntryError::HashFailed { .. }));
}

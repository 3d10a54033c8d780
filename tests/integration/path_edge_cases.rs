use dupe_detective::duplicates::{DuplicateFinder, FinderConfig};
use dupe_detective::scanner::WalkerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[cfg(unix)]
fn test_symlink_to_empty_file_is_not_a_second_copy() {
    let dir = tempdir().unwrap();
    let target = write(dir.path(), "zero.bin", b"");
    std::os::unix::fs::symlink(&target, dir.path().join("zero-link.bin")).unwrap();

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(result.files_scanned, 1);
    assert!(result.sets.is_empty());
    assert!(result.errors.is_empty());
}

#[test]
#[cfg(unix)]
fn test_symlinks_never_appear_in_results() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "real/a.txt", b"content");
    write(dir.path(), "real/b.txt", b"content");
    std::os::unix::fs::symlink(&a, dir.path().join("link-to-a.txt")).unwrap();
    std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link-dir")).unwrap();
    std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("dangling")).unwrap();

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();

    assert_eq!(result.files_scanned, 2);
    assert_eq!(result.sets.len(), 1);
    let members = result.sets[0].paths();
    assert!(members.iter().all(|p| p.parent().unwrap().ends_with("real")));
    assert!(result.errors.is_empty());
}

#[test]
#[cfg(unix)]
fn test_symlink_cycle_terminates() {
    let dir = tempdir().unwrap();
    write(dir.path(), "loop/a.txt", b"x");
    write(dir.path(), "loop/b.txt", b"x");
    std::os::unix::fs::symlink(dir.path(), dir.path().join("loop/back")).unwrap();

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(result.files_scanned, 2);
    assert_eq!(result.sets.len(), 1);
}

#[test]
#[cfg(unix)]
fn test_symlinked_root_is_resolved() {
    let dir = tempdir().unwrap();
    write(dir.path(), "data/a.txt", b"same");
    write(dir.path(), "data/b.txt", b"same");
    let link = dir.path().join("data-link");
    std::os::unix::fs::symlink(dir.path().join("data"), &link).unwrap();

    let result = DuplicateFinder::with_defaults().scan(&link).unwrap();
    assert_eq!(result.root, fs::canonicalize(dir.path().join("data")).unwrap());
    assert_eq!(result.sets.len(), 1);
    assert!(result.sets[0]
        .paths()
        .iter()
        .all(|p| p.starts_with(&result.root)));
}

#[test]
fn test_unicode_and_space_names() {
    let dir = tempdir().unwrap();
    write(dir.path(), "café/résumé.txt", b"unicode");
    write(dir.path(), "日本語/ファイル.txt", b"unicode");
    write(dir.path(), "with space/file name.txt", b"unicode");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(result.sets.len(), 1);
    assert_eq!(result.sets[0].len(), 3);
}

#[test]
#[cfg(not(windows))]
fn test_paths_with_quotes_and_newlines() {
    let dir = tempdir().unwrap();
    write(dir.path(), "file_with_\"quote\".txt", b"odd");
    write(dir.path(), "line\nbreak.txt", b"odd");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(result.sets.len(), 1);
    assert!(result.sets[0]
        .paths()
        .iter()
        .any(|p| p.to_string_lossy().contains('\n')));
}

#[test]
fn test_deeply_nested_tree() {
    let dir = tempdir().unwrap();
    let deep: String = (0..40).map(|i| format!("d{i}/")).collect();
    write(dir.path(), &format!("{deep}bottom.txt"), b"deep");
    write(dir.path(), "top.txt", b"deep");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(result.sets.len(), 1);
    assert!(result.sets[0].members[0].path.ends_with("bottom.txt"));
}

#[test]
fn test_hidden_files_included_unless_skipped() {
    let dir = tempdir().unwrap();
    write(dir.path(), ".hidden/a.txt", b"h");
    write(dir.path(), "visible/b.txt", b"h");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    assert_eq!(result.sets.len(), 1);

    let walker_config = WalkerConfig {
        skip_hidden: true,
        ..WalkerConfig::default()
    };
    let result = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker_config))
        .scan(dir.path())
        .unwrap();
    assert!(result.sets.is_empty());
    assert_eq!(result.files_scanned, 1);
}

#[test]
fn test_relative_root_yields_absolute_paths() {
    let dir = tempdir().unwrap();
    write(dir.path(), "sub/a.txt", b"rel");
    write(dir.path(), "sub/b.txt", b"rel");

    let dotted = dir.path().join("sub").join("..").join("sub");
    let result = DuplicateFinder::with_defaults().scan(&dotted).unwrap();
    assert!(result.root.is_absolute());
    assert!(result.sets[0]
        .paths()
        .iter()
        .all(|p| !p.components().any(|c| c == std::path::Component::ParentDir)));
}

use dupe_detective::actions::{execute_plan, DeleteConfig, DeleteError, DeletionPlanner};
use dupe_detective::duplicates::DuplicateFinder;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    fs::canonicalize(path).unwrap()
}

#[test]
fn test_delete_all_but_first_then_rescan() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "a/x.txt", b"hello");
    let y = write(dir.path(), "b/y.txt", b"hello");
    write(dir.path(), "c/z.txt", b"world");

    let finder = DuplicateFinder::with_defaults();
    let result = finder.scan(dir.path()).unwrap();
    let selection = result.select_all_but_first();
    assert_eq!(selection, vec![y.clone()]);

    let plan = DeletionPlanner::from_result(&result).plan(&selection);
    assert_eq!(plan.approved.len(), 1);
    let report = execute_plan(plan, &DeleteConfig::permanent(), None);

    assert!(report.all_succeeded());
    assert_eq!(report.bytes_freed, 5);
    assert!(x.exists());
    assert!(!y.exists());
    assert!(finder.scan(dir.path()).unwrap().sets.is_empty());
}

#[test]
fn test_selecting_every_copy_keeps_one() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"dup");
    let b = write(dir.path(), "b", b"dup");
    let c = write(dir.path(), "c", b"dup");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[a.clone(), b.clone(), c.clone()]);

    assert_eq!(plan.approved.len(), 2);
    assert_eq!(plan.rejections.len(), 1);
    assert!(matches!(plan.rejections[0].cause, DeleteError::LastCopy(_)));
    assert_eq!(plan.rejections[0].path, c);

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.rejected_count(), 1);
    assert!(!a.exists() && !b.exists() && c.exists());
}

#[test]
fn test_allow_last_copy_override() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"dup");
    let b = write(dir.path(), "b", b"dup");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result)
        .with_allow_last_copy(true)
        .plan(&[a, b]);
    assert_eq!(plan.approved.len(), 2);
    assert!(plan.rejections.is_empty());
}

#[test]
fn test_last_copy_accounts_for_externally_removed_members() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"dup");
    let y = write(dir.path(), "y", b"dup");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    fs::remove_file(&x).unwrap();

    let plan = DeletionPlanner::from_result(&result).plan(&[y.clone()]);
    assert!(plan.approved.is_empty());
    assert!(matches!(plan.rejections[0].cause, DeleteError::LastCopy(_)));
    assert!(y.exists());
}

#[test]
fn test_file_modified_between_plan_and_execute_is_kept() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"dup");
    let b = write(dir.path(), "b", b"dup");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&result.select_all_but_first());
    filetime::set_file_mtime(&b, FileTime::from_unix_time(946_684_800, 0)).unwrap();

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert!(!report.all_succeeded());
    assert!(matches!(
        report.outcomes[0].cause,
        Some(DeleteError::Modified(_))
    ));
    assert!(b.exists());
}

#[test]
fn test_file_replaced_by_directory_is_not_removed() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"dup");
    let b = write(dir.path(), "b", b"dup");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[b.clone()]);
    fs::remove_file(&b).unwrap();
    fs::create_dir(&b).unwrap();

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert!(matches!(
        report.outcomes[0].cause,
        Some(DeleteError::NotRegularFile(_))
    ));
    assert!(b.is_dir());
}

#[test]
fn test_one_failure_does_not_stop_the_rest() {
    let dir = tempdir().unwrap();
    let mut copies = Vec::new();
    for name in ["keep", "c1", "c2", "c3", "c4"] {
        copies.push(write(dir.path(), name, b"same bytes"));
    }

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let selection = result.select_all_but_first();
    assert_eq!(selection.len(), 4);

    let plan = DeletionPlanner::from_result(&result).plan(&selection);
    fs::remove_file(&selection[1]).unwrap();

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert_eq!(report.total_count(), 4);
    assert_eq!(report.success_count(), 3);
    assert!(matches!(
        report.outcomes[1].cause,
        Some(DeleteError::NotFound(_))
    ));
    assert!(copies[0].exists());
    assert!(copies[1..].iter().all(|p| !p.exists()));
}

#[test]
fn test_paths_outside_scan_are_rejected() {
    let scanned = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    write(scanned.path(), "a", b"dup");
    write(scanned.path(), "b", b"dup");
    let outside = write(elsewhere.path(), "a", b"dup");

    let result = DuplicateFinder::with_defaults().scan(scanned.path()).unwrap();
    let root_itself = result.root.clone();
    let plan = DeletionPlanner::from_result(&result).plan(&[outside.clone(), root_itself]);

    assert!(plan.approved.is_empty());
    assert!(plan
        .rejections
        .iter()
        .all(|r| matches!(r.cause, DeleteError::OutsideScannedTree(_))));
    assert!(outside.exists());
}

#[test]
#[cfg(unix)]
fn test_symlink_inside_root_is_rejected() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"dup");
    write(dir.path(), "b", b"dup");
    let root = fs::canonicalize(dir.path()).unwrap();
    let link = root.join("link");
    std::os::unix::fs::symlink(&a, &link).unwrap();

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[link.clone()]);
    assert!(matches!(plan.rejections[0].cause, DeleteError::Symlink(_)));
    assert!(link.symlink_metadata().is_ok());
    assert!(a.exists());
}

#[test]
fn test_planner_without_scan_only_checks_paths() {
    let dir = tempdir().unwrap();
    let only = write(dir.path(), "only", b"unique");

    let plan = DeletionPlanner::new(vec![dir.path().to_path_buf()]).plan(&[only.clone()]);
    assert_eq!(plan.approved.len(), 1);
    assert!(plan.approved[0].survivors.is_empty());

    let report = execute_plan(plan, &DeleteConfig::default(), None);
    assert!(report.all_succeeded());
    assert!(report.permanent);
    assert!(!only.exists());
}

#[test]
fn test_unique_scanned_file_is_the_last_copy() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"dup");
    write(dir.path(), "b", b"dup");
    let unique = write(dir.path(), "c", b"one of a kind");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[unique.clone()]);
    assert!(plan.approved.is_empty());
    assert!(matches!(plan.rejections[0].cause, DeleteError::LastCopy(_)));
    assert!(unique.exists());
}

fn bump_mtime(path: &Path) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(4_102_444_800, 0)).unwrap();
}

#[test]
fn test_file_rewritten_after_scan_is_rejected() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "a/x.txt", b"hello");
    let y = write(dir.path(), "b/y.txt", b"hello");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    fs::write(&y, b"UNIQUE").unwrap();
    bump_mtime(&y);

    let plan = DeletionPlanner::from_result(&result).plan(&result.select_all_but_first());
    assert!(plan.approved.is_empty());
    assert!(matches!(plan.rejections[0].cause, DeleteError::Modified(_)));

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert!(!report.outcomes[0].succeeded);
    assert_eq!(fs::read(&y).unwrap(), b"UNIQUE");
    assert!(x.exists());
}

#[test]
fn test_same_size_rewrite_after_scan_is_rejected() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    fs::write(&y, b"HELLO").unwrap();
    bump_mtime(&y);

    let plan = DeletionPlanner::from_result(&result).plan(&[y.clone()]);
    assert!(matches!(plan.rejections[0].cause, DeleteError::Modified(_)));
    assert!(y.exists());
}

#[test]
fn test_overwritten_original_does_not_count_as_a_copy() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    fs::write(&x, b"world").unwrap();
    bump_mtime(&x);

    let plan = DeletionPlanner::from_result(&result).plan(&[y.clone()]);
    assert!(plan.approved.is_empty());
    assert!(matches!(plan.rejections[0].cause, DeleteError::LastCopy(_)));

    execute_plan(plan, &DeleteConfig::permanent(), None);
    assert_eq!(fs::read(&y).unwrap(), b"hello");
}

#[test]
fn test_survivor_changed_between_plan_and_execute() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[y.clone()]);
    assert_eq!(plan.approved.len(), 1);
    assert_eq!(plan.approved[0].survivors.len(), 1);

    fs::write(&x, b"world").unwrap();
    bump_mtime(&x);

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert!(matches!(
        report.outcomes[0].cause,
        Some(DeleteError::LastCopy(_))
    ));
    assert_eq!(fs::read(&y).unwrap(), b"hello");
}

#[test]
fn test_survivor_removed_between_plan_and_execute() {
    let dir = tempdir().unwrap();
    let x = write(dir.path(), "x", b"hello");
    let y = write(dir.path(), "y", b"hello");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[y.clone()]);
    fs::remove_file(&x).unwrap();

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert!(!report.all_succeeded());
    assert!(y.exists());
}

#[test]
#[cfg(unix)]
fn test_directory_swapped_for_link_after_planning() {
    let dir = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    write(dir.path(), "keep/a.txt", b"dup");
    let b = write(dir.path(), "sub/b.txt", b"dup");
    let decoy = write(elsewhere.path(), "b.txt", b"dup");

    let result = DuplicateFinder::with_defaults().scan(dir.path()).unwrap();
    let plan = DeletionPlanner::from_result(&result).plan(&[b.clone()]);
    assert_eq!(plan.approved.len(), 1);

    let sub = b.parent().unwrap().to_path_buf();
    fs::rename(&sub, sub.with_file_name("moved")).unwrap();
    std::os::unix::fs::symlink(elsewhere.path(), &sub).unwrap();

    let report = execute_plan(plan, &DeleteConfig::permanent(), None);
    assert!(matches!(
        report.outcomes[0].cause,
        Some(DeleteError::OutsideScannedTree(_))
    ));
    assert!(decoy.exists());
    assert!(sub.with_file_name("moved").join("b.txt").exists());
}

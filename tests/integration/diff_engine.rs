use super::support::{memory_group, path, tree, version};
use foldsync::diff::{diff_trees, ChangeKind, HistoryChangeKind};
use foldsync::tree::DirectoryBuilder;
use foldsync::{PathFilter, SyncError};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[test]
fn test_identical_content_yields_no_changes() {
    let group = memory_group();
    let history = group.create_history("laptop").unwrap();
    let s1 = history.create_snapshot(&tree(&[("/a/x", 1, 1), ("/b/y", 1, 1)])).unwrap();
    history.create_snapshot(&tree(&[("/a/x", 2, 1)])).unwrap();
    let s3 = history.create_snapshot(&tree(&[("/a/x", 1, 1), ("/b/y", 1, 1)])).unwrap();

    assert!(history.diff(Some(&s1.id), &s3.id, None).unwrap().is_empty());
    assert!(history.diff(Some(&s3.id), &s3.id, None).unwrap().is_empty());
}

#[test]
fn test_filter_excludes_changes_outside_prefix() {
    let group = memory_group();
    let history = group.create_history("laptop").unwrap();
    let s1 = history.create_snapshot(&tree(&[("/a/x", 1, 1), ("/b/y", 1, 1)])).unwrap();
    let s2 = history.create_snapshot(&tree(&[("/a/x", 1, 1), ("/b/y", 2, 1)])).unwrap();

    let filter = PathFilter::parse(["/a"]).unwrap();
    assert!(history.diff(Some(&s1.id), &s2.id, Some(&filter)).unwrap().is_empty());

    let diff = history.diff(Some(&s1.id), &s2.id, None).unwrap();
    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].path, path("/b/y"));
    assert_eq!(diff.changes[0].kind(), ChangeKind::Modified);
    assert_eq!(diff.history, "laptop");
}

#[test]
fn test_diff_from_nothing_adds_everything() {
    let group = memory_group();
    let history = group.create_history("laptop").unwrap();
    let s1 = history.create_snapshot(&tree(&[("/a/x", 1, 1), ("/c", 3, 3)])).unwrap();

    let diff = history.diff(None, &s1.id, None).unwrap();
    assert_eq!(diff.changes.len(), 2);
    assert!(diff.changes.iter().all(|c| c.kind() == ChangeKind::Added));
}

#[test]
fn test_multi_diff_merges_histories_by_path() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    let desktop = group.create_history("desktop").unwrap();
    laptop.create_snapshot(&tree(&[("/shared", 1, 1), ("/mine", 1, 1)])).unwrap();
    desktop.create_snapshot(&tree(&[("/shared", 1, 1)])).unwrap();
    let m1 = group.multi_snapshots().create_snapshot().unwrap();

    laptop.create_snapshot(&tree(&[("/SHARED", 2, 1), ("/mine", 1, 1)])).unwrap();
    desktop.create_snapshot(&tree(&[("/shared", 3, 1)])).unwrap();
    let m2 = group.multi_snapshots().create_snapshot().unwrap();

    let diff = group.multi_diff(Some(&m1.id), &m2.id, None).unwrap();
    assert_eq!(diff.change_lists.len(), 1);
    let list = diff.change_list(&path("/shared")).unwrap();
    let touched: Vec<&str> = list.touched_histories().collect();
    assert_eq!(touched, vec!["desktop", "laptop"]);
    assert_eq!(list.distinct_targets().len(), 2);
    assert!(diff.history_changes.is_empty());
}

#[test]
fn test_multi_diff_reports_added_history() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    laptop.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();
    let m1 = group.multi_snapshots().create_snapshot().unwrap();

    let phone = group.create_history("phone").unwrap();
    phone.create_snapshot(&tree(&[("/a", 1, 1), ("/b", 2, 2)])).unwrap();
    let m2 = group.multi_snapshots().create_snapshot().unwrap();

    let diff = group.multi_diff(Some(&m1.id), &m2.id, None).unwrap();
    assert_eq!(diff.history_changes.len(), 1);
    assert_eq!(diff.history_changes[0].history, "phone");
    assert_eq!(diff.history_changes[0].kind, HistoryChangeKind::Added);
    // the new history is diffed from nothing
    assert_eq!(diff.change_lists.len(), 2);
    assert_eq!(
        diff.change_list(&path("/b")).unwrap().distinct_targets(),
        vec![Some(version("/b", 2, 2))]
    );
}

#[test]
fn test_multi_diff_ids_rejects_mismatched_sets() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    let desktop = group.create_history("desktop").unwrap();
    let l1 = laptop.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();
    let d1 = desktop.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();

    let from: BTreeMap<String, _> = [("laptop".to_string(), Some(l1.id))].into_iter().collect();
    let to: BTreeMap<String, _> = [("laptop".to_string(), l1.id), ("desktop".to_string(), d1.id)]
        .into_iter()
        .collect();
    assert!(matches!(
        group.multi_diff_ids(&from, &to, None),
        Err(SyncError::Validation(_))
    ));
    assert!(matches!(
        group.multi_diff_ids(&BTreeMap::new(), &BTreeMap::new(), None),
        Err(SyncError::Validation(_))
    ));
}

fn arb_files() -> impl Strategy<Value = Vec<(Vec<String>, i64, u64)>> {
    prop::collection::vec(
        (
            prop::collection::vec("[a-d]{1,2}", 1..4),
            0i64..1_000,
            0u64..100,
        ),
        0..10,
    )
}

fn build(files: &[(Vec<String>, i64, u64)]) -> foldsync::DirectoryTree {
    let mut builder = DirectoryBuilder::new("root").unwrap();
    for (segments, secs, length) in files {
        let p = path(&format!("/{}", segments.join("/")));
        // file/directory name clashes are skipped
        let _ = builder.add_file(&p, super::support::at(*secs), *length);
    }
    builder.build()
}

proptest! {
    #[test]
    fn diff_of_tree_with_itself_is_empty(files in arb_files()) {
        let t = build(&files);
        prop_assert!(diff_trees(Some(&t), &t, None).unwrap().is_empty());
    }

    #[test]
    fn diff_from_nothing_lists_every_file(files in arb_files()) {
        let t = build(&files);
        let changes = diff_trees(None, &t, None).unwrap();
        prop_assert_eq!(changes.len(), t.files().unwrap().len());
        prop_assert!(changes.iter().all(|c| c.kind() == ChangeKind::Added));
    }
}

use super::support::{memory_group, path, tree, version};
use foldsync::SyncError;

#[test]
fn test_create_snapshot_is_idempotent() {
    let group = memory_group();
    let history = group.create_history("laptop").unwrap();
    let files = tree(&[("/docs/a.txt", 10, 3), ("/b.txt", 20, 4)]);

    let first = history.create_snapshot(&files).unwrap();
    let second = history.create_snapshot(&files).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(history.snapshots().unwrap().len(), 1);
}

#[test]
fn test_snapshot_round_trips_tree() {
    let group = memory_group();
    let history = group.create_history("laptop").unwrap();
    let files = tree(&[("/Docs/Report.PDF", 1_700_000_000, 12_345), ("/notes.txt", 5, 0)]);

    let created = history.create_snapshot(&files).unwrap();
    let loaded = history.get_snapshot(&created.id).unwrap();

    assert_eq!(
        loaded.root.file_reference(&path("/docs/report.pdf")),
        Some(version("/Docs/Report.PDF", 1_700_000_000, 12_345))
    );
    let mut names: Vec<String> = loaded
        .root
        .files()
        .unwrap()
        .into_iter()
        .map(|(p, _)| p.as_str().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["/Docs/Report.PDF", "/notes.txt"]);
}

#[test]
fn test_snapshots_are_listed_oldest_first() {
    let group = memory_group();
    let history = group.create_history("laptop").unwrap();

    let s1 = history.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();
    let s2 = history.create_snapshot(&tree(&[("/a", 2, 1)])).unwrap();
    let s3 = history.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();

    let ids: Vec<_> = history.snapshots().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![s1.id, s2.id, s3.id]);
    assert_eq!(history.latest_snapshot().unwrap().unwrap().id, s3.id);
    // same content as s1, but a new snapshot because the tip moved on
    assert_ne!(s1.id, s3.id);
}

#[test]
fn test_get_snapshot_from_other_history_is_not_found() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    let desktop = group.create_history("desktop").unwrap();
    let snapshot = laptop.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();

    let err = desktop.get_snapshot(&snapshot.id).unwrap_err();
    assert!(matches!(err, SyncError::NotFound { kind: "Snapshot", .. }));
}

#[test]
fn test_history_names_are_case_insensitive() {
    let group = memory_group();
    group.create_history("Laptop").unwrap();

    assert!(matches!(
        group.create_history("LAPTOP"),
        Err(SyncError::Duplicate { .. })
    ));
    assert_eq!(group.history("laptop").unwrap().name(), "Laptop");
    assert!(matches!(
        group.history("phone"),
        Err(SyncError::NotFound { .. })
    ));
}

#[test]
fn test_multi_snapshot_pins_latest_snapshots() {
    let group = memory_group();
    let laptop = group.create_history("laptop").unwrap();
    let desktop = group.create_history("desktop").unwrap();
    // desktop has no snapshot yet and is left out
    let l1 = laptop.create_snapshot(&tree(&[("/a", 1, 1)])).unwrap();

    let multi = group.multi_snapshots().create_snapshot().unwrap();
    assert_eq!(multi.histories.len(), 1);
    assert_eq!(multi.snapshot_of("LAPTOP"), Some(&l1.id));

    // nothing moved: the same multi-snapshot comes back
    let again = group.multi_snapshots().create_snapshot().unwrap();
    assert_eq!(again.id, multi.id);

    let d1 = desktop.create_snapshot(&tree(&[("/b", 2, 2)])).unwrap();
    let next = group.multi_snapshots().create_snapshot().unwrap();
    assert_ne!(next.id, multi.id);
    assert_eq!(next.snapshot_of("desktop"), Some(&d1.id));

    let all: Vec<_> = group.multi_snapshots().all().unwrap().into_iter().map(|m| m.id).collect();
    assert_eq!(all, vec![multi.id, next.id]);
    assert_eq!(group.multi_snapshots().latest().unwrap().unwrap().id, next.id);
}

#[test]
fn test_multi_snapshot_needs_a_snapshot() {
    let group = memory_group();
    group.create_history("laptop").unwrap();

    assert!(matches!(
        group.multi_snapshots().create_snapshot(),
        Err(SyncError::Validation(_))
    ));
    assert!(group.multi_snapshots().latest().unwrap().is_none());
}

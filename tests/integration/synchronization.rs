use super::support::{memory_group, path, tree, version, InterferingStore};
use foldsync::history::SYNC_STATE_BRANCH;
use foldsync::store::StoredDirectory;
use foldsync::sync::state::CONFLICTS_DIRECTORY;
use foldsync::sync::SyncActionKind;
use foldsync::{EngineConfig, HistoryGroup, StorageError, SyncActionState, SyncError};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Two histories that agree on `/shared.txt`, already synchronized once
fn synced_pair(group: &HistoryGroup) {
    let files = tree(&[("/shared.txt", 1, 10)]);
    group.create_history("h1").unwrap().create_snapshot(&files).unwrap();
    group.create_history("h2").unwrap().create_snapshot(&files).unwrap();
    group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();
}

/// Like [`synced_pair`] with a third history `h3` holding the same file
fn synced_triple(group: &HistoryGroup) {
    let files = tree(&[("/shared.txt", 1, 10)]);
    for name in ["h1", "h2", "h3"] {
        group.create_history(name).unwrap().create_snapshot(&files).unwrap();
    }
    group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();
}

fn snapshot(group: &HistoryGroup, history: &str, files: &[(&str, i64, u64)]) {
    group.history(history).unwrap().create_snapshot(&tree(files)).unwrap();
}

#[test]
fn test_first_run_queues_additions() {
    let group = memory_group();
    let files = tree(&[("/shared.txt", 1, 10), ("/only-h1.txt", 2, 3)]);
    group.create_history("h1").unwrap().create_snapshot(&files).unwrap();
    group
        .create_history("h2")
        .unwrap()
        .create_snapshot(&tree(&[("/shared.txt", 1, 10)]))
        .unwrap();
    let multi = group.multi_snapshots().create_snapshot().unwrap();

    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert!(!report.up_to_date);
    assert_eq!(report.actions_added, 2);
    assert_eq!(report.conflicts_added, 0);
    let point = report.sync_point.unwrap();
    assert_eq!(point.id, 1);
    assert_eq!(point.multi_file_system_snapshot_id, multi.id);

    let actions = group.sync_state().actions().unwrap();
    assert!(actions.iter().all(|a| a.kind() == SyncActionKind::Add));
    assert!(actions.iter().all(|a| a.state == SyncActionState::Queued));
}

#[test]
fn test_single_sided_change_queues_one_action() {
    let group = memory_group();
    synced_pair(&group);

    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    let multi = group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.actions_added, 1);
    // the queued addition from the first run is superseded
    assert_eq!(report.actions_superseded, 1);
    assert_eq!(report.conflicts_added, 0);

    let state = group.sync_state().state().unwrap();
    let actions = state.actions.for_path(&path("/shared.txt"));
    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.state, SyncActionState::Queued);
    assert_eq!(action.snapshot_id, multi.id);
    assert_eq!(action.from_version, Some(version("/shared.txt", 1, 10)));
    assert_eq!(action.to_version, Some(version("/shared.txt", 2, 10)));
    assert_eq!(action.kind(), SyncActionKind::Modify);
    assert!(state.conflicts.is_empty());
}

#[test]
fn test_single_sided_deletion_queues_delete() {
    let group = memory_group();
    synced_pair(&group);

    snapshot(&group, "h2", &[("/unrelated.txt", 1, 1)]);
    group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();

    let state = group.sync_state().state().unwrap();
    let actions = state.actions.for_path(&path("/shared.txt"));
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind(), SyncActionKind::Delete);
    assert_eq!(actions[0].to_version, None);
}

#[test]
fn test_inconsistent_changes_record_conflict() {
    let group = memory_group();
    synced_pair(&group);

    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    snapshot(&group, "h2", &[("/shared.txt", 3, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.conflicts_added, 1);
    assert_eq!(report.actions_added, 0);
    assert_eq!(report.conflicts_resolved, 0);

    let service = group.sync_state();
    let conflict = service.conflict(&path("/shared.txt")).unwrap();
    assert_eq!(conflict.conflicting_versions.len(), 2);
    assert!(conflict
        .conflicting_versions
        .contains(&Some(version("/shared.txt", 2, 10))));
    assert!(conflict
        .conflicting_versions
        .contains(&Some(version("/shared.txt", 3, 10))));
    // no action survives for a path in conflict
    assert!(service
        .state()
        .unwrap()
        .actions
        .for_path(&path("/shared.txt"))
        .is_empty());
}

#[test]
fn test_conflict_resolves_when_histories_converge() {
    let group = memory_group();
    synced_pair(&group);
    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    snapshot(&group, "h2", &[("/shared.txt", 3, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();

    // h2 is overwritten with the version h1 has
    snapshot(&group, "h2", &[("/shared.txt", 2, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.conflicts_updated, 1);
    assert_eq!(report.conflicts_resolved, 1);
    assert_eq!(report.actions_added, 1);

    let state = group.sync_state().state().unwrap();
    assert!(state.conflicts.is_empty());
    let actions = state.actions.for_path(&path("/shared.txt"));
    assert_eq!(actions.len(), 1);
    let from = actions[0].from_version.as_ref().unwrap();
    assert!(from.is_wildcard());
    assert_eq!(actions[0].to_version, Some(version("/shared.txt", 2, 10)));
}

#[test]
fn test_rerun_without_new_multi_snapshot_is_up_to_date() {
    let group = memory_group();
    synced_pair(&group);
    let tip = group.store().branch_tip(SYNC_STATE_BRANCH).unwrap();
    let before = group.sync_state().latest_sync_point().unwrap().unwrap();

    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert!(report.up_to_date);
    assert_eq!(report.sync_point, Some(before));
    assert_eq!(group.store().branch_tip(SYNC_STATE_BRANCH).unwrap(), tip);
    assert_eq!(group.sync_state().sync_points().unwrap().len(), 1);
}

#[test]
fn test_nothing_to_synchronize_without_multi_snapshot() {
    let group = memory_group();
    group.create_history("h1").unwrap();

    let report = group.synchronizer().unwrap().synchronize().unwrap();
    assert!(report.up_to_date);
    assert!(report.sync_point.is_none());
    assert!(group.sync_state().latest_sync_point().unwrap().is_none());
}

#[test]
fn test_sync_points_advance_monotonically() {
    let group = memory_group();
    synced_pair(&group);
    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    let multi = group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();

    let points = group.sync_state().sync_points().unwrap();
    let ids: Vec<u64> = points.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(points[1].multi_file_system_snapshot_id, multi.id);
}

#[test]
fn test_lost_push_race_is_retried() {
    let store = Arc::new(InterferingStore::new(SYNC_STATE_BRANCH));
    let group = HistoryGroup::new(store.clone(), EngineConfig::default());
    let files = tree(&[("/a.txt", 1, 1)]);
    group.create_history("h1").unwrap().create_snapshot(&files).unwrap();
    group.multi_snapshots().create_snapshot().unwrap();

    store.interfere(1);
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(report.actions_added, 1);
    assert_eq!(store.pushes.load(Ordering::SeqCst), 2);
    assert_eq!(group.sync_state().actions().unwrap().len(), 1);
    assert_eq!(group.sync_state().sync_points().unwrap().len(), 1);
}

#[test]
fn test_gives_up_after_configured_attempts() {
    let store = Arc::new(InterferingStore::new(SYNC_STATE_BRANCH));
    let config = EngineConfig {
        max_commit_attempts: 2,
        ..EngineConfig::default()
    };
    let group = HistoryGroup::new(store.clone(), config);
    group
        .create_history("h1")
        .unwrap()
        .create_snapshot(&tree(&[("/a.txt", 1, 1)]))
        .unwrap();
    group.multi_snapshots().create_snapshot().unwrap();

    store.interfere(2);
    let err = group.synchronizer().unwrap().synchronize().unwrap_err();

    assert!(matches!(
        err,
        SyncError::ConcurrentModification { attempts: 2, .. }
    ));
    assert!(group.sync_state().latest_sync_point().unwrap().is_none());
}

#[test]
fn test_transition_action_is_persisted() {
    let group = memory_group();
    synced_pair(&group);
    let service = group.sync_state();
    let id = service.actions().unwrap()[0].id.clone();

    let active = service.transition_action(&id, SyncActionState::Active).unwrap();
    assert_eq!(active.state, SyncActionState::Active);
    service.transition_action(&id, SyncActionState::Completed).unwrap();

    assert_eq!(service.action(&id).unwrap().state, SyncActionState::Completed);
    assert_eq!(
        service.actions_in_state(SyncActionState::Completed).unwrap().len(),
        1
    );
    assert!(matches!(
        service.transition_action(&id, SyncActionState::Active),
        Err(SyncError::InvalidTransition { .. })
    ));
    assert!(matches!(
        service.transition_action("no-such-action", SyncActionState::Active),
        Err(SyncError::NotFound { .. })
    ));
}

#[test]
fn test_completed_actions_are_kept_when_path_changes_again() {
    let group = memory_group();
    synced_pair(&group);
    let service = group.sync_state();
    let id = service.actions().unwrap()[0].id.clone();
    service.transition_action(&id, SyncActionState::Active).unwrap();
    service.transition_action(&id, SyncActionState::Completed).unwrap();

    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.actions_superseded, 0);
    let state = service.state().unwrap();
    let history: Vec<SyncActionState> = state
        .actions
        .for_path(&path("/shared.txt"))
        .iter()
        .map(|a| a.state)
        .collect();
    assert_eq!(history, vec![SyncActionState::Completed, SyncActionState::Queued]);
}

#[test]
fn test_unknown_resolver_is_a_config_error() {
    let group = HistoryGroup::new(
        Arc::new(foldsync::store::MemoryVersionStore::in_memory()),
        EngineConfig {
            conflict_resolver: "coin-flip".to_string(),
            ..EngineConfig::default()
        },
    );
    assert!(matches!(group.synchronizer(), Err(SyncError::Config(_))));
}

#[test]
fn test_modify_against_delete_records_conflict() {
    let group = memory_group();
    synced_pair(&group);

    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    snapshot(&group, "h2", &[("/unrelated.txt", 1, 1)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.conflicts_added, 1);
    assert_eq!(report.conflicts_resolved, 0);
    let state = group.sync_state().state().unwrap();
    let conflict = state.conflicts.get(&path("/shared.txt")).unwrap();
    assert_eq!(conflict.conflicting_versions.len(), 2);
    assert!(conflict
        .conflicting_versions
        .contains(&Some(version("/shared.txt", 2, 10))));
    assert!(conflict.conflicting_versions.contains(&None));
    assert!(state.actions.for_path(&path("/shared.txt")).is_empty());
}

#[test]
fn test_conflict_deleted_everywhere_resolves_without_action() {
    let group = memory_group();
    synced_pair(&group);
    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    snapshot(&group, "h2", &[("/unrelated.txt", 1, 1)]);
    group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();

    snapshot(&group, "h1", &[("/unrelated.txt", 1, 1)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.conflicts_resolved, 1);
    let state = group.sync_state().state().unwrap();
    assert!(state.conflicts.is_empty());
    assert!(state.actions.for_path(&path("/shared.txt")).is_empty());
}

#[test]
fn test_untouched_third_history_keeps_single_sided_change() {
    let group = memory_group();
    synced_triple(&group);

    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.actions_added, 1);
    assert_eq!(report.conflicts_added, 0);
    let state = group.sync_state().state().unwrap();
    let actions = state.actions.for_path(&path("/shared.txt"));
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].to_version, Some(version("/shared.txt", 2, 10)));
}

#[test]
fn test_conflict_with_untouched_third_history() {
    let group = memory_group();
    synced_triple(&group);

    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    snapshot(&group, "h2", &[("/shared.txt", 3, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();

    assert_eq!(report.conflicts_added, 1);
    assert_eq!(report.actions_added, 0);
    let conflict = group.sync_state().conflict(&path("/shared.txt")).unwrap();
    // only the histories that changed the file are recorded
    assert_eq!(conflict.conflicting_versions.len(), 2);

    // h3 still holds the old version
    snapshot(&group, "h2", &[("/shared.txt", 2, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();
    assert_eq!(report.conflicts_resolved, 0);
    assert!(group.sync_state().conflict(&path("/shared.txt")).is_ok());

    snapshot(&group, "h3", &[("/shared.txt", 2, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let report = group.synchronizer().unwrap().synchronize().unwrap();
    assert_eq!(report.conflicts_resolved, 1);
    let state = group.sync_state().state().unwrap();
    assert!(state.conflicts.is_empty());
    let actions = state.actions.for_path(&path("/shared.txt"));
    assert_eq!(actions.len(), 1);
    assert!(actions[0].from_version.as_ref().unwrap().is_wildcard());
}

#[test]
fn test_unreadable_state_record_fails_run_and_is_kept() {
    let group = memory_group();
    synced_pair(&group);
    snapshot(&group, "h1", &[("/shared.txt", 2, 10)]);
    snapshot(&group, "h2", &[("/shared.txt", 3, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    group.synchronizer().unwrap().synchronize().unwrap();

    // truncate the conflict record behind the engine's back
    let store = group.store();
    let tip = store.branch_tip(SYNC_STATE_BRANCH).unwrap();
    let mut root = store.read_tree(&tip).unwrap();
    let name = root
        .directory(CONFLICTS_DIRECTORY)
        .unwrap()
        .entries
        .keys()
        .next()
        .unwrap()
        .clone();
    let mut conflicts = StoredDirectory::new();
    conflicts.insert_file(name.clone(), br#"{"snapshotId":"#.to_vec());
    root.insert_directory(CONFLICTS_DIRECTORY, conflicts);
    let tree_id = store.write_tree(&root).unwrap();
    let corrupted = store.commit(Some(&tip), &tree_id, "corrupt").unwrap();
    store.push(SYNC_STATE_BRANCH, Some(&tip), &corrupted).unwrap();

    snapshot(&group, "h1", &[("/shared.txt", 4, 10)]);
    group.multi_snapshots().create_snapshot().unwrap();
    let err = group.synchronizer().unwrap().synchronize().unwrap_err();

    assert!(matches!(err, SyncError::Storage(StorageError::Corrupt(_))));
    assert_eq!(store.branch_tip(SYNC_STATE_BRANCH).unwrap(), corrupted);
    let kept = store.read_tree(&corrupted).unwrap();
    assert!(kept
        .directory(CONFLICTS_DIRECTORY)
        .unwrap()
        .file(&name)
        .is_some());
}

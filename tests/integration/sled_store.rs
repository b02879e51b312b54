use foldsync::config::WORKSPACE_CONFIG_FILE;
use foldsync::tree::DirectoryScanner;
use foldsync::{ConfigLoader, FoldsyncConfig, HistoryGroup, SyncActionState, TreePath};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_scanned_folder_synchronizes_and_survives_reopen() {
    let workspace = TempDir::new().unwrap();
    let folder = TempDir::new().unwrap();
    fs::create_dir_all(folder.path().join("docs")).unwrap();
    fs::write(folder.path().join("docs/report.txt"), "quarterly").unwrap();
    fs::write(folder.path().join("todo.md"), "- sync").unwrap();
    let config = FoldsyncConfig::default();

    let snapshot_id = {
        let group = HistoryGroup::open(workspace.path(), &config).unwrap();
        let history = group.create_history("laptop").unwrap();
        let mut scanner = DirectoryScanner::new(folder.path()).unwrap();

        let first = history.create_snapshot(&scanner.scan().unwrap()).unwrap();
        // nothing changed on disk
        let second = history.create_snapshot(&scanner.scan().unwrap()).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(scanner.last_stats().reused, 2);

        group.multi_snapshots().create_snapshot().unwrap();
        let report = group.synchronizer().unwrap().synchronize().unwrap();
        assert_eq!(report.actions_added, 2);
        first.id
    };
    assert!(workspace.path().join(".foldsync/store").is_dir());

    let group = HistoryGroup::open(workspace.path(), &config).unwrap();
    let history = group.history("LAPTOP").unwrap();
    let snapshot = history.get_snapshot(&snapshot_id).unwrap();
    let report = snapshot
        .root
        .get_file(&TreePath::parse("/docs/report.txt").unwrap())
        .unwrap();
    assert_eq!(report.length, 9);

    let service = group.sync_state();
    assert_eq!(service.latest_sync_point().unwrap().unwrap().id, 1);
    assert_eq!(service.actions_in_state(SyncActionState::Queued).unwrap().len(), 2);
    assert!(group.synchronizer().unwrap().synchronize().unwrap().up_to_date);
}

#[test]
fn test_workspace_config_selects_store_path() {
    let workspace = TempDir::new().unwrap();
    fs::write(
        workspace.path().join(WORKSPACE_CONFIG_FILE),
        "[storage]\nstore_path = \"state/db\"\n\n[engine]\nmax_commit_attempts = 5\n",
    )
    .unwrap();

    let config = ConfigLoader::load(workspace.path()).unwrap();
    assert_eq!(config.engine.max_commit_attempts, 5);

    let group = HistoryGroup::open(workspace.path(), &config).unwrap();
    group.create_history("desktop").unwrap();
    assert_eq!(group.config().max_commit_attempts, 5);
    assert!(workspace.path().join("state/db").is_dir());
}

//! Foldsync: offline folder synchronization over a shared version store
//!
//! Each tracked folder is a history of immutable snapshots kept on its own
//! branch of a content-addressed store. Snapshots of all histories in a group
//! are pinned together as multi-snapshots; diffing consecutive multi-snapshots
//! yields per-path changes, which the synchronizer turns into a durable queue
//! of sync actions and a set of open conflicts.

pub mod concurrency;
pub mod config;
pub mod diff;
pub mod error;
pub mod graph;
pub mod heads;
pub mod history;
pub mod logging;
pub mod store;
pub mod sync;
pub mod tree;
pub mod types;

pub use config::{ConfigLoader, EngineConfig, FoldsyncConfig};
pub use error::{StorageError, SyncError};
pub use history::{FileSystemHistory, HistoryGroup, MultiFileSystemSnapshot, Snapshot};
pub use sync::{SyncAction, SyncActionState, SyncConflict, SyncReport};
pub use tree::{DirectoryTree, FileReference, PathFilter, TreePath};

//! Synchronization
//!
//! Turns group-wide diffs into a durable queue of [`SyncAction`]s and a set of
//! open [`SyncConflict`]s, stored on the group's synchronization state branch.

pub mod action;
pub mod conflict;
pub mod engine;
pub mod resolver;
pub mod service;
pub mod state;

pub use action::{ActionQueue, SyncAction, SyncActionKind, SyncActionState};
pub use conflict::{ConflictStore, SyncConflict};
pub use engine::{SyncReport, Synchronizer};
pub use resolver::{ConflictResolver, LiveVersions, Resolution, SimpleConflictResolver};
pub use service::SyncStateService;
pub use state::{SyncPoint, SyncState};

//! Integration tests for the foldsync history and synchronization engine

mod change_graph;
mod diff_engine;
mod sled_store;
mod snapshot_store;
mod synchronization;

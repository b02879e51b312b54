//! Directory trees
//!
//! Logical directory trees as captured by snapshots, the paths that address
//! them, their stored meta representation, and the local folder scanner.

pub mod meta;
pub mod node;
pub mod path;
pub mod scan;

pub use node::{
    DirectoryBuilder, DirectoryEntry, DirectoryTree, FileEntry, FileReference, NodeIndex,
    TreeNode,
};
pub use path::{PathFilter, TreePath};
pub use scan::{DirectoryScanner, ScanStats};

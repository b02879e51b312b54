//! Meta-tree conversion
//!
//! Snapshots are not stored as bare file trees. Every logical file becomes a
//! small properties record (name, length, last-write-time) and every directory
//! carries a properties record holding its real name. Storage segments are
//! case-folded, so the records are what make names and file metadata survive a
//! round trip through the store.

use super::node::{DirectoryBuilder, DirectoryTree, FileEntry, TreeNode};
use super::path::PROPERTIES_MARKER;
use crate::error::SyncError;
use crate::store::{StoredDirectory, StoredEntry, StoredFile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Top-level subtree that marks a commit as a snapshot
pub const SNAPSHOT_DIRECTORY: &str = "Snapshot";

/// Properties record describing the directory that contains it
pub const DIRECTORY_PROPERTIES_FILE: &str = "dir.props.json";

/// Suffix of per-file properties records
pub const FILE_PROPERTIES_SUFFIX: &str = ".file.props.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProperties {
    pub name: String,
    pub length: u64,
    pub last_write_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryProperties {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Properties {
    File(FileProperties),
    Directory(DirectoryProperties),
}

/// What a stored file turns out to be when read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaEntry<'a> {
    /// A file stored as-is; its metadata comes from the store
    PlainFile { name: &'a str, file: &'a StoredFile },
    Properties(Properties),
    /// A reserved-suffix file that could not be understood
    OtherFile { name: &'a str },
}

/// Classify a stored file by name and content
pub fn classify<'a>(name: &'a str, file: &'a StoredFile) -> MetaEntry<'a> {
    if name == DIRECTORY_PROPERTIES_FILE {
        return match serde_json::from_slice::<DirectoryProperties>(&file.content) {
            Ok(props) => MetaEntry::Properties(Properties::Directory(props)),
            Err(e) => {
                warn!(name = %name, error = %e, "Unreadable directory properties");
                MetaEntry::OtherFile { name }
            }
        };
    }
    if name.ends_with(FILE_PROPERTIES_SUFFIX) {
        return match serde_json::from_slice::<FileProperties>(&file.content) {
            Ok(props) => MetaEntry::Properties(Properties::File(props)),
            Err(e) => {
                warn!(name = %name, error = %e, "Unreadable file properties");
                MetaEntry::OtherFile { name }
            }
        };
    }
    if name.ends_with(PROPERTIES_MARKER) {
        return MetaEntry::OtherFile { name };
    }
    MetaEntry::PlainFile { name, file }
}

/// Convert a logical tree into its stored meta representation
pub fn to_meta(tree: &DirectoryTree) -> Result<StoredDirectory, SyncError> {
    write_directory(tree, DirectoryTree::ROOT)
}

fn write_directory(tree: &DirectoryTree, index: usize) -> Result<StoredDirectory, SyncError> {
    let mut out = StoredDirectory::new();
    let name = tree
        .node(index)
        .map(|n| n.name().to_string())
        .ok_or_else(|| SyncError::not_found("Tree node", index))?;
    out.insert_file(
        DIRECTORY_PROPERTIES_FILE,
        serde_json::to_vec(&DirectoryProperties { name })?,
    );

    for &child in tree.children(index) {
        match tree.node(child) {
            Some(TreeNode::File(file)) => {
                let props = FileProperties {
                    name: file.name.clone(),
                    length: file.length,
                    last_write_time: file.last_write_time,
                };
                out.insert_file(
                    format!("{}{}", file.name.to_lowercase(), FILE_PROPERTIES_SUFFIX),
                    serde_json::to_vec(&props)?,
                );
            }
            Some(TreeNode::Directory(dir)) => {
                out.insert_directory(dir.name.to_lowercase(), write_directory(tree, child)?);
            }
            None => return Err(SyncError::not_found("Tree node", child)),
        }
    }
    Ok(out)
}

/// Convert a stored meta-tree back into a logical tree.
///
/// `segment` names the root when it carries no directory properties.
pub fn from_meta(stored: &StoredDirectory, segment: &str) -> Result<DirectoryTree, SyncError> {
    Ok(read_directory(stored, segment)?.build())
}

fn read_directory(stored: &StoredDirectory, segment: &str) -> Result<DirectoryBuilder, SyncError> {
    let mut builder = DirectoryBuilder::new(segment)?;
    for (name, entry) in &stored.entries {
        match entry {
            StoredEntry::Directory(sub) => builder.insert_directory(read_directory(sub, name)?)?,
            StoredEntry::File(file) => match classify(name, file) {
                MetaEntry::PlainFile { name, file } => builder.insert_file(FileEntry {
                    name: name.to_string(),
                    length: file.content.len() as u64,
                    last_write_time: file.last_write_time.unwrap_or_default(),
                })?,
                MetaEntry::Properties(Properties::File(props)) => builder.insert_file(FileEntry {
                    name: props.name,
                    length: props.length,
                    last_write_time: props.last_write_time,
                })?,
                MetaEntry::Properties(Properties::Directory(props)) => {
                    builder.set_name(&props.name)?
                }
                MetaEntry::OtherFile { name } => {
                    debug!(name = %name, "Skipping unrecognized stored file");
                }
            },
        }
    }
    Ok(builder)
}

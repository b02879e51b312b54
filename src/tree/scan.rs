//! Local directory listing
//!
//! Turns a folder on disk into a [`DirectoryTree`]. The scanner owns a cache of
//! file entries keyed by relative path; an entry is reused when the file's
//! length and modification time are unchanged, and every refresh evicts the
//! entries of files that are gone.

use super::node::{DirectoryBuilder, DirectoryTree, FileEntry};
use super::path::TreePath;
use crate::error::SyncError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
struct CachedEntry {
    length: u64,
    modified: SystemTime,
    entry: FileEntry,
}

/// Statistics of the most recent refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files: usize,
    pub reused: usize,
    pub evicted: usize,
    pub skipped: usize,
}

pub struct DirectoryScanner {
    root: PathBuf,
    cache: HashMap<TreePath, CachedEntry>,
    last_stats: ScanStats,
}

impl DirectoryScanner {
    pub fn new(root: &Path) -> Result<Self, SyncError> {
        let root = dunce::canonicalize(root)?;
        Ok(Self {
            root,
            cache: HashMap::new(),
            last_stats: ScanStats::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    pub fn last_stats(&self) -> &ScanStats {
        &self.last_stats
    }

    /// List the folder and build a tree, refreshing the entry cache
    pub fn scan(&mut self) -> Result<DirectoryTree, SyncError> {
        let root_name = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("root")
            .to_string();
        let mut builder = DirectoryBuilder::new(&root_name)?;
        let mut stats = ScanStats::default();
        let mut seen: HashMap<TreePath, CachedEntry> = HashMap::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry");
                    stats.skipped += 1;
                    continue;
                }
            };
            let path = match self.tree_path(entry.path()) {
                Some(p) => p,
                None => {
                    warn!(path = %entry.path().display(), "Skipping entry with unusable name");
                    stats.skipped += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                builder.add_directory(&path)?;
                continue;
            }
            if !file_type.is_file() {
                stats.skipped += 1;
                continue;
            }

            let metadata = entry.metadata().map_err(std::io::Error::from)?;
            let length = metadata.len();
            let modified = metadata.modified()?;

            let cached = match self.cache.remove(&path) {
                Some(hit) if hit.length == length && hit.modified == modified => {
                    stats.reused += 1;
                    hit
                }
                _ => CachedEntry {
                    length,
                    modified,
                    entry: FileEntry {
                        name: path.name().to_string(),
                        last_write_time: DateTime::<Utc>::from(modified),
                        length,
                    },
                },
            };
            builder.insert_file_at(&path, cached.entry.clone())?;
            seen.insert(path, cached);
            stats.files += 1;
        }

        // whatever is still in the old cache was not seen on this refresh
        stats.evicted = self.cache.len();
        self.cache = seen;
        debug!(
            root = %self.root.display(),
            files = stats.files,
            reused = stats.reused,
            evicted = stats.evicted,
            "Scanned directory"
        );
        self.last_stats = stats;
        Ok(builder.build())
    }

    fn tree_path(&self, path: &Path) -> Option<TreePath> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut tree_path = TreePath::root();
        for component in relative.components() {
            let name = component.as_os_str().to_str()?;
            tree_path = tree_path.join(name).ok()?;
        }
        Some(tree_path)
    }
}

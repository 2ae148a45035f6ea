//! Commit store
//!
//! An append-only sequence of immutable snapshot directories under the
//! control subtree. Each snapshot is a verbatim copy of the staging tree at
//! commit time (wrapped records untouched) plus one metadata file.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::VcsError;
use crate::tree::{TreeEntry, TreeEntryKind};

/// Name of the per-snapshot metadata file
pub const METADATA_FILE: &str = "commit_info.txt";

/// Identifier of one snapshot.
///
/// Unix seconds at commit time, bumped past the previous id when two commits
/// land within the same second (or the clock steps backwards), so ids are
/// unique and strictly increasing. The decimal rendering is the snapshot's
/// directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SnapshotId {
    fn from(value: u64) -> Self {
        SnapshotId(value)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(SnapshotId)
    }
}

/// Metadata recorded alongside a snapshot's files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Snapshot the metadata belongs to
    pub id: SnapshotId,
    /// Configured author string at commit time
    pub author: String,
    /// Human-readable creation timestamp
    pub date: String,
    /// Caller-supplied commit message
    pub message: String,
}

/// Append-only snapshot storage
pub struct CommitStore {
    /// Commits root directory
    root: PathBuf,
    /// Author recorded in snapshot metadata
    author: String,
    /// High-water mark for id allocation within this process
    last_id: Mutex<u64>,
}

impl CommitStore {
    /// Create a store rooted at `root` (not created until [`init`]).
    ///
    /// [`init`]: CommitStore::init
    pub fn new(root: PathBuf, author: String) -> Self {
        Self {
            root,
            author,
            last_id: Mutex::new(0),
        }
    }

    /// Commits root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a snapshot lives in (whether or not it exists)
    pub fn snapshot_dir(&self, id: SnapshotId) -> PathBuf {
        self.root.join(id.to_string())
    }

    /// Create the commits root directory
    pub async fn init(&self) -> Result<(), VcsError> {
        fs::create_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "Initialized commit store");
        Ok(())
    }

    /// Freeze the tree under `staging_root` into a new snapshot.
    ///
    /// The staging tree is copied byte-for-byte: records are neither
    /// re-wrapped nor re-verified here. The caller is responsible for
    /// draining the staging area afterwards.
    pub async fn snapshot(
        &self,
        staging_root: &Path,
        message: &str,
    ) -> Result<SnapshotId, VcsError> {
        let id = self.allocate_id().await?;
        let dir = self.snapshot_dir(id);
        fs::create_dir(&dir).await?;

        let tree = TreeEntry::scan(staging_root)?;
        if let TreeEntryKind::Dir(children) = &tree.kind {
            copy_children(staging_root, &dir, children).await?;
        }

        self.write_meta(&dir, message).await?;

        info!(snapshot_id = %id, message, "Created snapshot");
        Ok(id)
    }

    /// All snapshot ids, ascending.
    ///
    /// Directory entries that do not parse as ids are ignored.
    pub async fn list(&self) -> Result<Vec<SnapshotId>, VcsError> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Ok(id) = entry.file_name().to_string_lossy().parse::<SnapshotId>() {
                ids.push(id);
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Whether a snapshot with this id exists
    pub async fn contains(&self, id: SnapshotId) -> bool {
        fs::metadata(self.snapshot_dir(id)).await.is_ok()
    }

    /// Read a snapshot's metadata back from its `commit_info.txt`.
    pub async fn read_meta(&self, id: SnapshotId) -> Result<SnapshotMeta, VcsError> {
        let path = self.snapshot_dir(id).join(METADATA_FILE);

        let text = fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                VcsError::SnapshotNotFound(id)
            } else {
                VcsError::Io(err)
            }
        })?;

        let field = |prefix: &str| {
            text.lines()
                .find_map(|line| line.strip_prefix(prefix))
                .unwrap_or("")
                .to_string()
        };

        Ok(SnapshotMeta {
            id,
            author: field("Author: "),
            date: field("Date: "),
            message: field("Message: "),
        })
    }

    // Unique, strictly increasing, still shaped like unix seconds: take the
    // wall clock unless a same-second (or clock-stepped) commit already
    // claimed it, then bump past the highest id seen in memory or on disk.
    async fn allocate_id(&self) -> Result<SnapshotId, VcsError> {
        let floor = self
            .list()
            .await?
            .last()
            .map(|id| id.as_u64() + 1)
            .unwrap_or(0);
        let now = Utc::now().timestamp().max(0) as u64;

        let mut last = self.last_id.lock();
        let id = now.max(floor).max(*last + 1);
        *last = id;

        Ok(SnapshotId(id))
    }

    async fn write_meta(&self, dir: &Path, message: &str) -> Result<(), VcsError> {
        let contents = format!(
            "Author: {}\nDate: {}\nMessage: {}\n",
            self.author,
            Utc::now().to_rfc2822(),
            message
        );
        fs::write(dir.join(METADATA_FILE), contents).await?;
        Ok(())
    }
}

/// Copy every entry beneath `source_root` into `dest_root`, creating each
/// destination directory before its contents.
async fn copy_children(
    source_root: &Path,
    dest_root: &Path,
    children: &[TreeEntry],
) -> Result<(), VcsError> {
    let mut stack: Vec<(PathBuf, PathBuf, &TreeEntry)> = children
        .iter()
        .map(|child| (source_root.join(&child.name), dest_root.join(&child.name), child))
        .collect();

    while let Some((src, dst, entry)) = stack.pop() {
        match &entry.kind {
            TreeEntryKind::File => {
                fs::copy(&src, &dst).await?;
            }
            TreeEntryKind::Dir(grandchildren) => {
                fs::create_dir_all(&dst).await?;
                for child in grandchildren {
                    stack.push((src.join(&child.name), dst.join(&child.name), child));
                }
            }
        }
    }

    Ok(())
}

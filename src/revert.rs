//! Revert engine
//!
//! Restores a chosen snapshot's files into the working tree, verifying and
//! unwrapping each record on the way out. Restoration is best-effort per
//! file: a record failing checksum verification is logged and skipped while
//! the rest of the snapshot is still restored. I/O failures and truncated
//! records abort the whole operation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::VcsError;
use crate::record;
use crate::store::{SnapshotId, METADATA_FILE};
use crate::tree::{TreeEntry, TreeEntryKind};

/// Restores snapshots into a working tree
pub struct RevertEngine {
    /// Commits root the engine reads snapshots from
    commits_dir: PathBuf,
    /// Working tree root files are restored into
    target_root: PathBuf,
    /// Serializes every verify-unwrap-write against other writers
    write_lock: Arc<Mutex<()>>,
}

/// Per-file outcome of a revert
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevertReport {
    /// Files restored into the working tree, relative to the snapshot root
    pub restored: Vec<PathBuf>,
    /// Files skipped because their record failed verification
    pub skipped: Vec<SkippedFile>,
}

/// A snapshot file left unrestored by checksum verification
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    /// Path relative to the snapshot root
    pub path: PathBuf,
    /// Checksum stored in the record
    pub stored: u32,
    /// Fingerprint recomputed over the record payload
    pub computed: u32,
}

impl RevertReport {
    /// Whether every file in the snapshot was restored
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Number of files the revert visited
    pub fn total(&self) -> usize {
        self.restored.len() + self.skipped.len()
    }
}

impl RevertEngine {
    /// Create an engine restoring from `commits_dir` into `target_root`.
    ///
    /// `write_lock` must be the same lock the staging paths use, so a revert
    /// never reads a destination mid-write by a concurrent staging task.
    pub fn new(commits_dir: PathBuf, target_root: PathBuf, write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            commits_dir,
            target_root,
            write_lock,
        }
    }

    /// Restore the named snapshot into the working tree.
    ///
    /// Checksum mismatches skip that file only; everything else restorable
    /// is still restored and the report lists both outcomes. Unknown ids
    /// fail with [`VcsError::SnapshotNotFound`]; I/O errors and malformed
    /// records are fatal for the whole call.
    pub async fn revert(&self, id: SnapshotId) -> Result<RevertReport, VcsError> {
        let snapshot_dir = self.commits_dir.join(id.to_string());

        match fs::metadata(&snapshot_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(VcsError::SnapshotNotFound(id)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(VcsError::SnapshotNotFound(id));
            }
            Err(err) => return Err(err.into()),
        }

        let tree = TreeEntry::scan(&snapshot_dir)?;
        let TreeEntryKind::Dir(children) = &tree.kind else {
            return Err(VcsError::SnapshotNotFound(id));
        };

        let mut report = RevertReport::default();

        // metadata lives at the snapshot's top level only; a user file of
        // the same name deeper in the tree is restored normally
        let mut stack: Vec<(PathBuf, PathBuf, PathBuf, &TreeEntry)> = children
            .iter()
            .filter(|child| child.name != METADATA_FILE)
            .map(|child| {
                (
                    snapshot_dir.join(&child.name),
                    self.target_root.join(&child.name),
                    PathBuf::from(&child.name),
                    child,
                )
            })
            .collect();

        while let Some((src, dst, rel, entry)) = stack.pop() {
            match &entry.kind {
                TreeEntryKind::File => match self.restore_file(&src, &dst).await {
                    Ok(()) => report.restored.push(rel),
                    Err(VcsError::ChecksumMismatch { stored, computed }) => {
                        warn!(
                            file = %rel.display(),
                            stored,
                            computed,
                            "Checksum validation failed, skipping file"
                        );
                        report.skipped.push(SkippedFile {
                            path: rel,
                            stored,
                            computed,
                        });
                    }
                    Err(other) => return Err(other),
                },
                TreeEntryKind::Dir(grandchildren) => {
                    fs::create_dir_all(&dst).await?;
                    for child in grandchildren {
                        stack.push((
                            src.join(&child.name),
                            dst.join(&child.name),
                            rel.join(&child.name),
                            child,
                        ));
                    }
                }
            }
        }

        info!(
            snapshot_id = %id,
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            "Revert complete"
        );
        Ok(report)
    }

    /// Read a record, verify and unwrap it, and write the original bytes to
    /// the working-tree destination. Holds the shared write lock throughout.
    async fn restore_file(&self, source: &Path, dest: &Path) -> Result<(), VcsError> {
        let _guard = self.write_lock.lock().await;

        let wrapped = fs::read(source).await?;
        let original = record::unwrap(&wrapped)?;
        fs::write(dest, original).await?;

        debug!(
            source = %source.display(),
            dest = %dest.display(),
            bytes = original.len(),
            "Restored file"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine_for(commits: &Path, target: &Path) -> RevertEngine {
        RevertEngine::new(
            commits.to_path_buf(),
            target.to_path_buf(),
            Arc::new(Mutex::new(())),
        )
    }

    /// Lay out a snapshot directory by hand: wrapped records plus metadata.
    fn write_snapshot(commits: &Path, id: u64, files: &[(&str, &[u8])]) -> SnapshotId {
        let dir = commits.join(id.to_string());
        for (rel, content) in files {
            let path = dir.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, record::wrap(content)).unwrap();
        }
        std::fs::write(
            dir.join(METADATA_FILE),
            "Author: tester\nDate: today\nMessage: test\n",
        )
        .unwrap();
        SnapshotId::from(id)
    }

    #[tokio::test]
    async fn test_revert_restores_original_bytes() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();

        let id = write_snapshot(&commits, 100, &[("notes.txt", b"hello")]);

        let report = engine_for(&commits, &target).revert(id).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.restored, vec![PathBuf::from("notes.txt")]);
        assert_eq!(std::fs::read(target.join("notes.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_revert_restores_nested_directories() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();

        let id = write_snapshot(
            &commits,
            101,
            &[
                ("project/README.md", b"readme"),
                ("project/src/main.rs", b"fn main() {}"),
            ],
        );

        let report = engine_for(&commits, &target).revert(id).await.unwrap();

        assert_eq!(report.total(), 2);
        assert_eq!(
            std::fs::read(target.join("project/src/main.rs")).unwrap(),
            b"fn main() {}"
        );
    }

    #[tokio::test]
    async fn test_revert_skips_metadata_file() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();

        let id = write_snapshot(&commits, 102, &[("a.txt", b"a")]);

        engine_for(&commits, &target).revert(id).await.unwrap();

        assert!(!target.join(METADATA_FILE).exists());
    }

    #[tokio::test]
    async fn test_partial_revert_skips_only_corrupt_file() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();

        let id = write_snapshot(
            &commits,
            103,
            &[("good1.txt", b"one"), ("bad.txt", b"two"), ("good2.txt", b"three")],
        );

        // corrupt the trailing checksum of one record
        let bad = commits.join("103/bad.txt");
        let mut bytes = std::fs::read(&bad).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&bad, bytes).unwrap();

        let report = engine_for(&commits, &target).revert(id).await.unwrap();

        assert_eq!(report.restored.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, PathBuf::from("bad.txt"));
        assert!(!target.join("bad.txt").exists());
        assert_eq!(std::fs::read(target.join("good1.txt")).unwrap(), b"one");
        assert_eq!(std::fs::read(target.join("good2.txt")).unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_revert_overwrites_working_tree_files() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("notes.txt"), "newer edits").unwrap();

        let id = write_snapshot(&commits, 104, &[("notes.txt", b"snapshotted")]);

        engine_for(&commits, &target).revert(id).await.unwrap();

        assert_eq!(
            std::fs::read(target.join("notes.txt")).unwrap(),
            b"snapshotted"
        );
    }

    #[tokio::test]
    async fn test_revert_unknown_snapshot() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        std::fs::create_dir_all(&commits).unwrap();
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();

        let result = engine_for(&commits, &target)
            .revert(SnapshotId::from(999))
            .await;
        assert!(matches!(result, Err(VcsError::SnapshotNotFound(_))));
    }

    #[tokio::test]
    async fn test_revert_truncated_record_is_fatal() {
        let dir = tempdir().unwrap();
        let commits = dir.path().join("commits");
        let target = dir.path().join("work");
        std::fs::create_dir_all(&target).unwrap();

        let id = write_snapshot(&commits, 105, &[("stub.txt", b"x")]);
        std::fs::write(commits.join("105/stub.txt"), b"abc").unwrap();

        let result = engine_for(&commits, &target).revert(id).await;
        assert!(matches!(result, Err(VcsError::Malformed { len: 3 })));
    }
}

//! Repository facade - wires the engine components together
//!
//! Owns the on-disk layout (`.git/staging`, `.git/commits`), the shared
//! write lock, and the public operation surface front ends call into.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::VcsError;
use crate::revert::{RevertEngine, RevertReport};
use crate::stager::{ConcurrentStager, DEFAULT_WORKERS};
use crate::staging::StagingArea;
use crate::store::{CommitStore, SnapshotId, SnapshotMeta};

/// Name of the control subtree, reserved under the repository root
pub const CONTROL_DIR: &str = ".git";

/// Author recorded in snapshot metadata unless configured otherwise
pub const DEFAULT_AUTHOR: &str = "warren";

/// Configuration for a repository
#[derive(Debug, Clone)]
pub struct RepoConfig {
    /// Repository root (the working tree lives here)
    pub root: PathBuf,
    /// Author string written into snapshot metadata
    pub author: String,
    /// Worker bound for bulk staging
    pub workers: usize,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            author: DEFAULT_AUTHOR.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// A local repository: working tree, staging area, and snapshot store
pub struct Repository {
    config: RepoConfig,
    staging: StagingArea,
    store: CommitStore,
    revert_engine: RevertEngine,
    stager: ConcurrentStager,
}

impl Repository {
    /// Wire up a repository rooted at `config.root`.
    ///
    /// Nothing touches the filesystem until [`init`] or an operation runs.
    ///
    /// [`init`]: Repository::init
    pub fn new(config: RepoConfig) -> Self {
        let control = config.root.join(CONTROL_DIR);
        let staging = StagingArea::new(control.join("staging"));
        let store = CommitStore::new(control.join("commits"), config.author.clone());
        let revert_engine = RevertEngine::new(
            control.join("commits"),
            config.root.clone(),
            Arc::clone(staging.write_lock()),
        );
        let stager = ConcurrentStager::new(config.workers);

        Self {
            config,
            staging,
            store,
            revert_engine,
            stager,
        }
    }

    /// Repository configuration
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Create the control subtree (`.git/staging`, `.git/commits`).
    ///
    /// Safe to call on an already-initialized repository.
    pub async fn init(&self) -> Result<(), VcsError> {
        self.staging.init().await?;
        self.store.init().await?;
        info!(root = %self.config.root.display(), "Initialized repository");
        Ok(())
    }

    /// Stage a file or directory for the next commit.
    ///
    /// Fail-closed: failures are logged and propagated.
    pub async fn add(&self, path: impl AsRef<Path>) -> Result<(), VcsError> {
        let path = path.as_ref();
        self.staging.add_path(path).await.map_err(|err| {
            warn!(path = %path.display(), error = %err, "Failed to stage path");
            err
        })
    }

    /// Stage a file or directory using the bounded worker pool.
    ///
    /// Same semantics and resulting bytes as [`add`]; worth it for large
    /// directory trees.
    ///
    /// [`add`]: Repository::add
    pub async fn add_parallel(&self, path: impl AsRef<Path>) -> Result<(), VcsError> {
        let path = path.as_ref();
        self.stager
            .add_path(&self.staging, path)
            .await
            .map_err(|err| {
                warn!(path = %path.display(), error = %err, "Failed to stage path");
                err
            })
    }

    /// Remove a named top-level entry from the staging area.
    ///
    /// Fail-open and idempotent; a missing entry is logged, not an error.
    pub async fn remove_from_staging(&self, name: &str) {
        self.staging.remove_entry(name).await;
    }

    /// Freeze the staging area into a new snapshot and drain it.
    ///
    /// An empty staging area is a logged no-op, not an error: `Ok(None)` and
    /// the commit store is left untouched.
    pub async fn commit(&self, message: &str) -> Result<Option<SnapshotId>, VcsError> {
        if self.staging.is_empty().await? {
            info!("Staging area is empty, nothing to commit");
            return Ok(None);
        }

        let result: Result<SnapshotId, VcsError> = async {
            let id = self.store.snapshot(self.staging.root(), message).await?;
            self.staging.clear().await?;
            Ok(id)
        }
        .await;

        match result {
            Ok(id) => Ok(Some(id)),
            Err(err) => {
                warn!(error = %err, "Commit failed");
                Err(err)
            }
        }
    }

    /// Restore a snapshot's files into the working tree.
    ///
    /// Returns the per-file outcome report; see [`RevertEngine::revert`].
    pub async fn revert(&self, id: SnapshotId) -> Result<RevertReport, VcsError> {
        self.revert_engine.revert(id).await.map_err(|err| {
            warn!(snapshot_id = %id, error = %err, "Revert failed");
            err
        })
    }

    /// Names of the working tree's top-level entries.
    ///
    /// The control subtree never appears here.
    pub async fn list_working_tree(&self) -> Result<Vec<String>, VcsError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.config.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name != CONTROL_DIR {
                names.push(name);
            }
        }

        debug!(count = names.len(), "Listed working tree");
        Ok(names)
    }

    /// Names of the staged top-level entries (fail-open)
    pub async fn list_staging(&self) -> Vec<String> {
        self.staging.list_entries().await
    }

    /// All snapshot ids, oldest first
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotId>, VcsError> {
        self.store.list().await
    }

    /// A snapshot's recorded author, date, and message
    pub async fn snapshot_meta(&self, id: SnapshotId) -> Result<SnapshotMeta, VcsError> {
        self.store.read_meta(id).await
    }
}

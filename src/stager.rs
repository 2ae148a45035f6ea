//! Bounded-parallel staging
//!
//! Populates a staging destination from a large directory tree faster than
//! the strictly sequential path. The caller's task does the walking and
//! creates every destination directory before any of its descendants is
//! dispatched; file wrap-writes are handed to worker tasks, at most
//! [`DEFAULT_WORKERS`] in flight at once. The wrap-write itself still
//! serializes on the staging area's shared write lock, so parallel speedup
//! comes from overlapping read-side I/O, never from interleaved writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::VcsError;
use crate::staging::{stage_file, StagingArea};
use crate::tree::{TreeEntry, TreeEntryKind};

/// Default bound on concurrently in-flight wrap-writes
pub const DEFAULT_WORKERS: usize = 4;

/// Bounded-parallelism variant of staging-area population
pub struct ConcurrentStager {
    workers: usize,
}

impl ConcurrentStager {
    /// Create a stager dispatching at most `workers` wrap-writes at once.
    ///
    /// A bound of zero is treated as one.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Stage a file or directory, like [`StagingArea::add_path`], but with
    /// directory contents wrapped and written by a bounded worker pool.
    ///
    /// Yields a staging tree byte-identical to the sequential path. The
    /// first failure aborts the call, after every already-dispatched task
    /// has finished; partial writes are not rolled back.
    pub async fn add_path(&self, staging: &StagingArea, source: &Path) -> Result<(), VcsError> {
        let tree = TreeEntry::scan(source)?;
        let dest = staging.prepare_dest(&tree.name).await?;

        match &tree.kind {
            // a single file has nothing to parallelize
            TreeEntryKind::File => stage_file(staging.write_lock(), source, &dest).await,
            TreeEntryKind::Dir(children) => {
                fs::create_dir_all(&dest).await?;
                self.stage_children(staging, source, &dest, children).await
            }
        }
    }

    async fn stage_children(
        &self,
        staging: &StagingArea,
        source_root: &Path,
        dest_root: &Path,
        children: &[TreeEntry],
    ) -> Result<(), VcsError> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<Result<(), VcsError>> = JoinSet::new();
        let mut first_error: Option<VcsError> = None;

        let mut stack: Vec<(PathBuf, PathBuf, &TreeEntry)> = children
            .iter()
            .map(|child| (source_root.join(&child.name), dest_root.join(&child.name), child))
            .collect();

        while let Some((src, dst, entry)) = stack.pop() {
            match &entry.kind {
                TreeEntryKind::File => {
                    // blocks here while the in-flight set is full
                    let permit = Arc::clone(&semaphore)
                        .acquire_owned()
                        .await
                        .expect("semaphore is never closed");
                    let lock = Arc::clone(staging.write_lock());

                    tasks.spawn(async move {
                        let _permit = permit;
                        stage_file(&lock, &src, &dst).await
                    });
                }
                TreeEntryKind::Dir(grandchildren) => {
                    // created on the walking task, before any descendant
                    // file is dispatched
                    if let Err(err) = fs::create_dir_all(&dst).await {
                        first_error = Some(err.into());
                        break;
                    }
                    for child in grandchildren {
                        stack.push((src.join(&child.name), dst.join(&child.name), child));
                    }
                }
            }
        }

        // drain every in-flight task before reporting
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(join_err) => Err(VcsError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    join_err,
                ))),
            };
            if let Err(err) = outcome {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => {
                warn!(
                    source = %source_root.display(),
                    error = %err,
                    "Bulk staging failed"
                );
                Err(err)
            }
            None => {
                debug!(source = %source_root.display(), "Bulk staging complete");
                Ok(())
            }
        }
    }
}

impl Default for ConcurrentStager {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

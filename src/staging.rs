//! Staging area
//!
//! A directory tree under the control subtree that mirrors a subset of the
//! working tree, holding a wrapped copy of every added file. Entries are
//! queued here until a commit freezes them into a snapshot.
//!
//! Mutating operations (adding) log and propagate failures; removal and
//! listing are fail-open: they log and succeed with an empty result so a
//! damaged staging area never blocks read paths.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::VcsError;
use crate::record;
use crate::tree::{TreeEntry, TreeEntryKind};

/// Mutable holding area for files queued for the next commit
pub struct StagingArea {
    /// Staging root directory
    root: PathBuf,
    /// Serializes every read-wrap-write against other writers
    write_lock: Arc<Mutex<()>>,
}

impl StagingArea {
    /// Create a staging area rooted at `root` (not created until [`init`]).
    ///
    /// [`init`]: StagingArea::init
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Staging root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The lock serializing wrap-writes.
    ///
    /// Collaborators that write the same destination trees (the concurrent
    /// stager, the revert engine) must share this lock so no file is read
    /// and written by different operations concurrently.
    pub fn write_lock(&self) -> &Arc<Mutex<()>> {
        &self.write_lock
    }

    /// Create the staging root directory
    pub async fn init(&self) -> Result<(), VcsError> {
        fs::create_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "Initialized staging area");
        Ok(())
    }

    /// Stage a file or directory.
    ///
    /// The destination is the source's base name directly under the staging
    /// root; an existing entry of that name is replaced wholesale (last add
    /// wins, no merge). Directories are staged recursively, each destination
    /// directory created before its files are written. Failures propagate
    /// after logging; already-written entries are not rolled back.
    pub async fn add_path(&self, source: &Path) -> Result<(), VcsError> {
        let tree = TreeEntry::scan(source)?;
        let dest = self.prepare_dest(&tree.name).await?;

        match &tree.kind {
            TreeEntryKind::File => stage_file(&self.write_lock, source, &dest).await,
            TreeEntryKind::Dir(children) => {
                fs::create_dir_all(&dest).await?;
                self.stage_children(source, &dest, children).await
            }
        }
    }

    /// Remove any existing entry named `name` and return the destination
    /// path for a fresh copy.
    pub(crate) async fn prepare_dest(&self, name: &OsStr) -> Result<PathBuf, VcsError> {
        let dest = self.root.join(name);

        match fs::metadata(&dest).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&dest).await?,
            Ok(_) => fs::remove_file(&dest).await?,
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        Ok(dest)
    }

    /// Sequentially wrap-and-write every file beneath `source_root`.
    async fn stage_children(
        &self,
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
                TreeEntryKind::File => stage_file(&self.write_lock, &src, &dst).await?,
                TreeEntryKind::Dir(grandchildren) => {
                    // destination directory exists before any child is staged
                    fs::create_dir_all(&dst).await?;
                    for child in grandchildren {
                        stack.push((src.join(&child.name), dst.join(&child.name), child));
                    }
                }
            }
        }

        Ok(())
    }

    /// Delete a top-level staging entry.
    ///
    /// Fail-open: a missing entry or an I/O failure is logged and the call
    /// still succeeds, so removal is idempotent.
    pub async fn remove_entry(&self, name: &str) {
        let _guard = self.write_lock.lock().await;
        let path = self.root.join(name);

        let result = match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(name, "Staging entry not found, nothing to remove");
                return;
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => debug!(name, "Removed staging entry"),
            Err(err) => warn!(name, error = %err, "Failed to remove staging entry"),
        }
    }

    /// Names of the immediate children of the staging root.
    ///
    /// Fail-open: I/O failure is logged and an empty list returned. Order is
    /// directory-iteration order, not significant.
    pub async fn list_entries(&self) -> Vec<String> {
        match self.read_names().await {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "Failed to list staging area");
                Vec::new()
            }
        }
    }

    async fn read_names(&self) -> Result<Vec<String>, std::io::Error> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        Ok(names)
    }

    /// Whether the staging area holds no entries.
    ///
    /// Unlike [`list_entries`], this propagates I/O failure: commit must not
    /// mistake an unreadable staging area for an empty one.
    ///
    /// [`list_entries`]: StagingArea::list_entries
    pub async fn is_empty(&self) -> Result<bool, VcsError> {
        let mut entries = fs::read_dir(&self.root).await?;
        Ok(entries.next_entry().await?.is_none())
    }

    /// Delete all staged entries and recreate an empty staging root
    pub async fn clear(&self) -> Result<(), VcsError> {
        fs::remove_dir_all(&self.root).await?;
        fs::create_dir_all(&self.root).await?;
        debug!(root = %self.root.display(), "Cleared staging area");
        Ok(())
    }
}

/// Read a source file, wrap it, and write the record to `dest`.
///
/// The whole read-wrap-write sequence holds the shared write lock, so the
/// step is atomic with respect to every other writer.
pub(crate) async fn stage_file(
    lock: &Mutex<()>,
    source: &Path,
    dest: &Path,
) -> Result<(), VcsError> {
    let _guard = lock.lock().await;

    let bytes = fs::read(source).await?;
    let wrapped = record::wrap(&bytes);
    fs::write(dest, &wrapped).await?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        bytes = bytes.len(),
        "Staged file"
    );
    Ok(())
}

//! Source tree model
//!
//! Staging, commit, and revert all walk directory trees. Instead of
//! re-querying file types at every step, a tree is scanned once into a
//! tagged [`TreeEntry`] and the walkers match on it exhaustively.

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::VcsError;

/// One node of a scanned source tree
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Base name of the entry
    pub name: OsString,
    /// File or directory payload
    pub kind: TreeEntryKind,
}

/// What a tree entry is
#[derive(Debug, Clone)]
pub enum TreeEntryKind {
    /// Regular file
    File,
    /// Directory with its scanned children
    Dir(Vec<TreeEntry>),
}

impl TreeEntry {
    /// Scan a path into a tree.
    ///
    /// The path must name a regular file or a directory; anything else
    /// (sockets, devices, dangling symlinks) is [`VcsError::InvalidSource`].
    /// Entries of other kinds nested inside a directory are skipped with a
    /// warning rather than failing the scan.
    pub fn scan(path: &Path) -> Result<TreeEntry, VcsError> {
        let name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| VcsError::InvalidSource(path.to_path_buf()))?;

        let metadata = fs::metadata(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => VcsError::InvalidSource(path.to_path_buf()),
            _ => VcsError::Io(err),
        })?;

        if metadata.is_file() {
            Ok(TreeEntry {
                name,
                kind: TreeEntryKind::File,
            })
        } else if metadata.is_dir() {
            Ok(TreeEntry {
                name,
                kind: TreeEntryKind::Dir(Self::scan_children(path)?),
            })
        } else {
            Err(VcsError::InvalidSource(path.to_path_buf()))
        }
    }

    fn scan_children(dir: &Path) -> Result<Vec<TreeEntry>, VcsError> {
        let mut children = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let metadata = fs::metadata(&path)?;

            if metadata.is_file() {
                children.push(TreeEntry {
                    name: entry.file_name(),
                    kind: TreeEntryKind::File,
                });
            } else if metadata.is_dir() {
                children.push(TreeEntry {
                    name: entry.file_name(),
                    kind: TreeEntryKind::Dir(Self::scan_children(&path)?),
                });
            } else {
                warn!(path = %path.display(), "Skipping non-file, non-directory entry");
            }
        }

        Ok(children)
    }

    /// Number of regular files in the tree
    pub fn file_count(&self) -> usize {
        match &self.kind {
            TreeEntryKind::File => 1,
            TreeEntryKind::Dir(children) => children.iter().map(TreeEntry::file_count).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_scan_regular_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("note.txt");
        fs::write(&file, "content").unwrap();

        let tree = TreeEntry::scan(&file).unwrap();
        assert_eq!(tree.name, OsString::from("note.txt"));
        assert!(matches!(tree.kind, TreeEntryKind::File));
        assert_eq!(tree.file_count(), 1);
    }

    #[test]
    fn test_scan_nested_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("src/deep")).unwrap();
        fs::write(root.join("README.md"), "readme").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("src/deep/util.rs"), "// util").unwrap();

        let tree = TreeEntry::scan(&root).unwrap();
        assert_eq!(tree.file_count(), 3);

        let TreeEntryKind::Dir(children) = &tree.kind else {
            panic!("expected directory");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn test_scan_empty_directory() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();

        let tree = TreeEntry::scan(&empty).unwrap();
        assert_eq!(tree.file_count(), 0);
        assert!(matches!(&tree.kind, TreeEntryKind::Dir(c) if c.is_empty()));
    }

    #[test]
    fn test_scan_missing_path_is_invalid_source() {
        let missing = PathBuf::from("/definitely/not/here");
        assert!(matches!(
            TreeEntry::scan(&missing),
            Err(VcsError::InvalidSource(_))
        ));
    }
}

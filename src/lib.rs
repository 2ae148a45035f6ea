//! # Warren
//!
//! Minimal local version control - integrity-checked staging, snapshots,
//! and restore.
//!
//! This crate provides:
//! - A staging area holding checksum-wrapped copies of added files
//! - Immutable, timestamped snapshots frozen from the staging area
//! - Verified restore of any snapshot into the working tree
//! - A bounded worker pool for staging large directory trees
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                    Repository                    │
//! │  ┌─────────────┐ ┌─────────────┐ ┌────────────┐ │
//! │  │ StagingArea │ │ CommitStore │ │RevertEngine│ │
//! │  │  (+ bulk    │ │  snapshots  │ │  verified  │ │
//! │  │   stager)   │ │  + metadata │ │  restore   │ │
//! │  └─────────────┘ └─────────────┘ └────────────┘ │
//! │         │               │               │       │
//! │         ▼               ▼               ▼       │
//! │  ┌────────────────────────────────────────────┐ │
//! │  │            wrapped records                 │ │
//! │  │   "1234" ‖ bytes ‖ FNV-1a checksum (LE)    │ │
//! │  └────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Every file entering staging is framed as a wrapped record; snapshots
//! copy those records verbatim, and restore verifies each one before the
//! original bytes reach the working tree. A file failing verification is
//! skipped and reported; the rest of the snapshot is still restored.
//!
//! ## Example
//!
//! ```rust,ignore
//! use warren::{RepoConfig, Repository};
//!
//! let repo = Repository::new(RepoConfig::default());
//! repo.init().await?;
//!
//! repo.add("notes.txt").await?;
//! let id = repo.commit("first").await?.expect("staging was not empty");
//!
//! // ... edit notes.txt, then take it back
//! let report = repo.revert(id).await?;
//! assert!(report.is_clean());
//! ```

pub mod checksum;
pub mod error;
pub mod record;
pub mod repo;
pub mod revert;
pub mod stager;
pub mod staging;
pub mod store;
pub mod tree;

pub use error::VcsError;
pub use repo::{RepoConfig, Repository, CONTROL_DIR, DEFAULT_AUTHOR};
pub use revert::{RevertEngine, RevertReport, SkippedFile};
pub use stager::{ConcurrentStager, DEFAULT_WORKERS};
pub use staging::StagingArea;
pub use store::{CommitStore, SnapshotId, SnapshotMeta, METADATA_FILE};
pub use tree::{TreeEntry, TreeEntryKind};

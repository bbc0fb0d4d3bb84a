//! The contract a versioned-storage engine must fulfil.
//!
//! [`Repository`](crate::Repository) is written purely against these
//! traits. [`GitBackend`](crate::GitBackend) is the implementation shipped
//! with the crate.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{BackendConfig, NodeKind, NodeProperty, RevisionProperty};

/// A read-only view of the tree at one revision.
///
/// Paths may be given with or without a leading slash; `""` and `"/"` both
/// name the root.
pub trait Snapshot {
    /// The revision this snapshot is bound to.
    fn revision(&self) -> u64;

    /// What `path` resolves to, or `None` if nothing is there.
    fn check_path(&self, path: &str) -> Result<Option<NodeKind>>;

    /// Full content of the file at `path`.
    ///
    /// # Errors
    /// [`Error::NotFound`](crate::Error::NotFound) if the path is absent,
    /// [`Error::IsADirectory`](crate::Error::IsADirectory) if it is a tree.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Immediate children of the directory at `path`.
    fn list_entries(&self, path: &str) -> Result<BTreeMap<String, NodeKind>>;

    /// A node property of `path`, `None` when unset or when the path is
    /// absent.
    fn property(&self, path: &str, kind: NodeProperty) -> Result<Option<String>>;
}

/// An in-progress atomic change. Nothing is visible to readers until
/// [`finalize`](NativeTransaction::finalize) succeeds.
pub trait NativeTransaction {
    /// The youngest revision when the transaction was opened.
    fn base_revision(&self) -> u64;

    /// What `path` resolves to in the in-progress root, i.e. the base
    /// revision with every change made so far applied.
    fn check_path(&self, path: &str) -> Result<Option<NodeKind>>;

    /// Create an empty directory. The parent must already exist.
    fn make_directory(&mut self, path: &str) -> Result<()>;

    /// Create an empty file. The parent must already exist.
    fn make_file(&mut self, path: &str) -> Result<()>;

    /// Replace the content of an existing file.
    fn write_content(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Set (or, with `None`, clear) a node property of an existing path.
    fn set_property(&mut self, path: &str, kind: NodeProperty, value: Option<&str>) -> Result<()>;

    /// Delete a file or directory tree.
    fn delete(&mut self, path: &str) -> Result<()>;

    /// Make every change durable and visible. Returns the youngest
    /// revision afterwards.
    fn finalize(self) -> Result<u64>;

    /// Abandon the transaction without side effects.
    fn discard(self);
}

/// A versioned-storage engine rooted at one location.
pub trait Backend: Sized + Send + Sync {
    type Snapshot<'a>: Snapshot
    where
        Self: 'a;

    type Transaction<'a>: NativeTransaction
    where
        Self: 'a;

    /// Initialize an empty repository (revision 0) at `location`, which
    /// must not exist yet or be an empty directory.
    fn create(location: &Path, config: &BackendConfig) -> Result<Self>;

    /// Open the repository at `location`.
    fn open(location: &Path, config: &BackendConfig) -> Result<Self>;

    /// Whether a repository of this kind exists at `location`.
    fn exists(location: &Path) -> bool;

    fn location(&self) -> &Path;

    fn snapshot_root(&self, revision: u64) -> Result<Self::Snapshot<'_>>;

    fn revision_property(&self, kind: RevisionProperty, revision: u64) -> Result<Option<String>>;

    /// Revisions that touched `path` within `[from, to]`, newest first.
    ///
    /// `observer` sees every `(path, revision)` event as it is found.
    ///
    /// # Errors
    /// [`Error::RevisionDoesNotExist`](crate::Error::RevisionDoesNotExist)
    /// if `to` is beyond the youngest revision,
    /// [`Conflict::FileDoesNotExist`](crate::Conflict::FileDoesNotExist)
    /// if `path` does not exist at `to`.
    fn history(
        &self,
        path: &str,
        from: u64,
        to: u64,
        observer: &mut dyn FnMut(&str, u64),
    ) -> Result<Vec<u64>>;

    fn youngest_revision(&self) -> Result<u64>;

    /// The newest revision committed at or before `timestamp`; revision 0
    /// if every revision is newer.
    fn revision_at_or_before(&self, timestamp: DateTime<Utc>) -> Result<u64>;

    /// Open a native transaction on top of the youngest revision, stamped
    /// with `actor` and `comment`.
    fn open_transaction(&self, actor: &str, comment: &str) -> Result<Self::Transaction<'_>>;
}

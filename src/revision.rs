use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};

use crate::backend::{Backend, Snapshot};
use crate::error::{Error, Result};
use crate::history;
use crate::paths;
use crate::store::GitBackend;
use crate::types::{
    parse_timestamp, DirectoryEntry, FileEntry, NodeProperty, RevisionProperty,
};

/// A revision of a git-backed repository.
pub type GitRevision = Revision<GitBackend>;

/// One numbered revision of a [`Repository`](crate::Repository).
///
/// Holds a weak reference to the repository's backend: queries fail with
/// [`Error::RepositoryClosed`] once every repository handle is dropped.
/// Entries are recomputed on every query.
pub struct Revision<B: Backend> {
    number: u64,
    backend: Weak<B>,
}

impl<B: Backend> Clone for Revision<B> {
    fn clone(&self) -> Self {
        Self {
            number: self.number,
            backend: Weak::clone(&self.backend),
        }
    }
}

impl<B: Backend> std::fmt::Debug for Revision<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Revision")
            .field("number", &self.number)
            .finish()
    }
}

impl<B: Backend> PartialEq for Revision<B> {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number && Weak::ptr_eq(&self.backend, &other.backend)
    }
}

impl<B: Backend> Revision<B> {
    /// # Errors
    /// [`Error::RevisionDoesNotExist`] if `number` is beyond the youngest
    /// revision of `backend`.
    pub(crate) fn new(backend: &Arc<B>, number: u64) -> Result<Self> {
        if number > backend.youngest_revision()? {
            return Err(Error::RevisionDoesNotExist(number));
        }
        Ok(Self {
            number,
            backend: Arc::downgrade(backend),
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    fn backend(&self) -> Result<Arc<B>> {
        self.backend.upgrade().ok_or(Error::RepositoryClosed)
    }

    /// Whether anything exists at `path` in this revision.
    pub fn path_exists(&self, path: &str) -> Result<bool> {
        let backend = self.backend()?;
        let snapshot = backend.snapshot_root(self.number)?;
        Ok(snapshot.check_path(path)?.is_some())
    }

    /// Files directly under the directory `path`, keyed by name.
    ///
    /// # Errors
    /// [`Error::NotFound`] / [`Error::NotADirectory`] if `path` is not a
    /// directory in this revision.
    pub fn files_at(&self, path: &str) -> Result<BTreeMap<String, FileEntry>> {
        let backend = self.backend()?;
        let dir = paths::canonical_path(path)?;
        let snapshot = backend.snapshot_root(self.number)?;

        let mut files = BTreeMap::new();
        for (name, kind) in snapshot.list_entries(&dir)? {
            if !kind.is_file() {
                continue;
            }
            let full = paths::join(&dir, &name);
            let (last_modified_revision, user_id) = self.last_change(&*backend, &full)?;
            let mime_type = snapshot.property(&full, NodeProperty::MimeType)?;
            files.insert(
                name.clone(),
                FileEntry {
                    name,
                    path: dir.clone(),
                    from_revision: self.number,
                    last_modified_revision,
                    changed: last_modified_revision == self.number,
                    user_id,
                    mime_type,
                },
            );
        }
        Ok(files)
    }

    /// [`files_at`](Self::files_at), keeping only files modified in this
    /// revision.
    pub fn changed_files_at(&self, path: &str) -> Result<BTreeMap<String, FileEntry>> {
        let mut files = self.files_at(path)?;
        files.retain(|_, entry| entry.changed);
        Ok(files)
    }

    /// Directories directly under `path`, keyed by name.
    pub fn directories_at(&self, path: &str) -> Result<BTreeMap<String, DirectoryEntry>> {
        let backend = self.backend()?;
        let dir = paths::canonical_path(path)?;
        let snapshot = backend.snapshot_root(self.number)?;

        let mut dirs = BTreeMap::new();
        for (name, kind) in snapshot.list_entries(&dir)? {
            if !kind.is_dir() {
                continue;
            }
            let full = paths::join(&dir, &name);
            let (last_modified_revision, user_id) = self.last_change(&*backend, &full)?;
            dirs.insert(
                name.clone(),
                DirectoryEntry {
                    name,
                    path: dir.clone(),
                    from_revision: self.number,
                    last_modified_revision,
                    changed: last_modified_revision == self.number,
                    user_id,
                },
            );
        }
        Ok(dirs)
    }

    /// Latest revision up to this one touching `path`, and its author.
    fn last_change(&self, backend: &B, path: &str) -> Result<(u64, Option<String>)> {
        let revision = history::last_modified(backend, path, self.number)?;
        let author = backend.revision_property(RevisionProperty::Author, revision)?;
        Ok((revision, author))
    }

    pub fn author(&self) -> Result<Option<String>> {
        self.backend()?
            .revision_property(RevisionProperty::Author, self.number)
    }

    /// The comment of the transaction that produced this revision.
    pub fn comment(&self) -> Result<Option<String>> {
        self.backend()?
            .revision_property(RevisionProperty::Log, self.number)
    }

    /// When this revision was committed.
    pub fn timestamp(&self) -> Result<DateTime<Utc>> {
        let date = self
            .backend()?
            .revision_property(RevisionProperty::Date, self.number)?
            .ok_or_else(|| Error::InvalidTimestamp(format!("r{} has no date", self.number)))?;
        parse_timestamp(&date)
    }

    /// Revisions up to this one touching any of `paths`, ascending.
    pub fn history<I, S>(&self, paths: I) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let backend = self.backend()?;
        history::history(&*backend, paths, 0, Some(self.number))
    }
}

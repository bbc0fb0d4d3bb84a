use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::{Backend, NativeTransaction, Snapshot};
use crate::conflict::Conflict;
use crate::error::{Error, Result};
use crate::history;
use crate::job::Job;
use crate::paths;
use crate::revision::Revision;
use crate::store::GitBackend;
use crate::transaction::Transaction;
use crate::types::{BackendConfig, CommitOutcome, FileEntry, NodeKind, NodeProperty};

/// A repository backed by the git engine.
pub type GitRepository = Repository<GitBackend>;

/// A transactional, revision-numbered file repository over backend `B`.
///
/// Cheap to clone (`Arc` internally). [`Revision`] handles hold only a
/// weak reference, so dropping every `Repository` clone closes the
/// backend.
pub struct Repository<B: Backend> {
    pub(crate) backend: Arc<B>,
}

impl<B: Backend> Clone for Repository<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for Repository<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("backend", &self.backend)
            .finish()
    }
}

/// Why a job could not be applied: a conflict to collect, or a failure
/// that aborts the whole commit.
enum JobError {
    Conflict(Conflict),
    Fatal(Error),
}

impl From<Error> for JobError {
    fn from(err: Error) -> Self {
        Self::Fatal(err)
    }
}

impl From<Conflict> for JobError {
    fn from(conflict: Conflict) -> Self {
        Self::Conflict(conflict)
    }
}

type JobResult = std::result::Result<(), JobError>;

impl<B: Backend> Repository<B> {
    /// Create a new, empty repository at `location`.
    ///
    /// # Errors
    /// [`Conflict::Collision`] (as [`Error::Conflict`]) if a repository
    /// already exists there; [`Error::Io`] if something else occupies the
    /// location.
    pub fn create(location: impl AsRef<Path>, config: &BackendConfig) -> Result<Self> {
        let location = location.as_ref();
        if B::exists(location) {
            return Err(Conflict::Collision(location.display().to_string()).into());
        }
        if location.exists() {
            return Err(Error::io(
                location,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "cannot create a repository: something with the same name exists already",
                ),
            ));
        }
        let backend = B::create(location, config)?;
        Ok(Self {
            backend: Arc::new(backend),
        })
    }

    /// Open the existing repository at `location`.
    ///
    /// # Errors
    /// [`Error::RepositoryNotFound`] if there is none.
    pub fn open(location: impl AsRef<Path>, config: &BackendConfig) -> Result<Self> {
        let location = location.as_ref();
        if !B::exists(location) {
            return Err(Error::repository_not_found(location));
        }
        Ok(Self {
            backend: Arc::new(B::open(location, config)?),
        })
    }

    /// Whether a repository exists at `location`. Never fails.
    pub fn exists(location: impl AsRef<Path>) -> bool {
        B::exists(location.as_ref())
    }

    pub fn location(&self) -> &Path {
        self.backend.location()
    }

    /// The engine behind this repository.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn latest_revision(&self) -> Result<Revision<B>> {
        let youngest = self.backend.youngest_revision()?;
        Revision::new(&self.backend, youngest)
    }

    /// # Errors
    /// [`Error::RevisionDoesNotExist`] if `number` is beyond the youngest
    /// revision.
    pub fn revision(&self, number: u64) -> Result<Revision<B>> {
        Revision::new(&self.backend, number)
    }

    /// The newest revision committed at or before `timestamp` (revision 0
    /// if every revision is newer).
    pub fn revision_at_or_before(&self, timestamp: DateTime<Utc>) -> Result<Revision<B>> {
        let number = self.backend.revision_at_or_before(timestamp)?;
        Revision::new(&self.backend, number)
    }

    /// Start a transaction on behalf of `user_id`.
    ///
    /// # Errors
    /// [`Error::MissingActor`] if `user_id` is empty.
    pub fn begin_transaction(&self, user_id: &str, comment: &str) -> Result<Transaction> {
        Transaction::new(user_id, comment)
    }

    /// Revisions touching any of `paths` within `[from, to]`, ascending.
    pub fn history<I, S>(&self, paths: I, from: u64, to: Option<u64>) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        history::history(&*self.backend, paths, from, to)
    }

    /// Apply every job of `transaction` atomically.
    ///
    /// Each job is checked against the backend before it is staged. A
    /// conflicting job is recorded and the remaining jobs are still
    /// checked, so the caller sees every conflict at once. If any conflict
    /// was recorded nothing is committed and the transaction is handed
    /// back in [`CommitOutcome::Conflicts`].
    ///
    /// # Errors
    /// Backend failures abort the commit; nothing is applied.
    pub fn commit(&self, mut transaction: Transaction) -> Result<CommitOutcome> {
        transaction.conflicts.clear();

        let mut native = self
            .backend
            .open_transaction(transaction.user_id(), transaction.comment())?;
        let base = native.base_revision();
        log::debug!(
            "applying {} jobs by {} on r{}",
            transaction.jobs().len(),
            transaction.user_id(),
            base
        );

        let mut conflicts = Vec::new();
        for job in transaction.jobs() {
            match self.apply_job(&mut native, base, job) {
                Ok(()) => {}
                Err(JobError::Conflict(conflict)) => {
                    log::debug!("conflict: {}", conflict);
                    conflicts.push(conflict);
                }
                Err(JobError::Fatal(err)) => {
                    native.discard();
                    return Err(err);
                }
            }
        }

        if !conflicts.is_empty() {
            native.discard();
            log::warn!(
                "commit by {} rejected with {} conflict(s)",
                transaction.user_id(),
                conflicts.len()
            );
            for conflict in conflicts {
                transaction.add_conflict(conflict);
            }
            return Ok(CommitOutcome::Conflicts(transaction));
        }

        let revision = native.finalize()?;
        log::info!("committed r{} by {}", revision, transaction.user_id());
        Ok(CommitOutcome::Committed { revision })
    }

    fn apply_job<'a>(
        &'a self,
        native: &mut B::Transaction<'a>,
        base: u64,
        job: &Job,
    ) -> JobResult {
        match job {
            Job::CreatePath { path } => self.create_path(native, path),
            Job::AddFile {
                path,
                content,
                mime_type,
            } => {
                if native.check_path(path)?.is_some() {
                    return Err(Conflict::FileExists(path.clone()).into());
                }
                self.write_file(native, path, content, mime_type)
            }
            Job::RemoveFile {
                path,
                expected_revision,
            } => {
                self.check_in_sync(path, base, *expected_revision)?
                    .ok_or_else(|| Conflict::FileDoesNotExist(path.clone()))?;
                // removed or turned into a directory earlier in this transaction
                if native.check_path(path)? != Some(NodeKind::File) {
                    return Err(Conflict::FileDoesNotExist(path.clone()).into());
                }
                native.delete(path)?;
                Ok(())
            }
            Job::ReplaceFile {
                path,
                content,
                mime_type,
                expected_revision,
            } => {
                if native.check_path(path)? == Some(NodeKind::Directory) {
                    return Err(Conflict::FileExists(path.clone()).into());
                }
                self.check_in_sync(path, base, *expected_revision)?;
                self.write_file(native, path, content, mime_type)
            }
        }
    }

    /// Compare `expected` with the latest revision (up to `base`) that
    /// touched `path`. `Ok(None)` when the path does not exist at `base`.
    fn check_in_sync(
        &self,
        path: &str,
        base: u64,
        expected: u64,
    ) -> std::result::Result<Option<u64>, JobError> {
        let snapshot = self.backend.snapshot_root(base)?;
        if snapshot.check_path(path)?.is_none() {
            return Ok(None);
        }
        let latest = history::last_modified(&*self.backend, path, base)?;
        if latest != expected {
            log::debug!(
                "{} last modified in r{}, caller expected r{}",
                path,
                latest,
                expected
            );
            return Err(Conflict::FileOutOfSync(path.to_string()).into());
        }
        Ok(Some(latest))
    }

    /// Create `path` and every missing ancestor in the in-progress root.
    fn create_path<'a>(&'a self, native: &mut B::Transaction<'a>, path: &str) -> JobResult {
        let normalized = paths::normalize_path(path)?;
        if normalized.is_empty() {
            return Ok(());
        }
        let mut dirs = paths::ancestors(&normalized);
        dirs.push(&normalized);
        for dir in dirs {
            match native.check_path(dir)? {
                Some(NodeKind::Directory) => {}
                Some(NodeKind::File) => {
                    return Err(Conflict::FileExists(format!("/{}", dir)).into());
                }
                None => native.make_directory(dir)?,
            }
        }
        Ok(())
    }

    /// Write content and mime type, materializing the file and its
    /// ancestors when absent.
    fn write_file<'a>(
        &'a self,
        native: &mut B::Transaction<'a>,
        path: &str,
        content: &[u8],
        mime_type: &str,
    ) -> JobResult {
        if native.check_path(path)?.is_none() {
            let normalized = paths::normalize_path(path)?;
            let (parent, _) = paths::split_parent(&normalized);
            self.create_path(native, parent)?;
            native.make_file(path)?;
        }
        native.write_content(path, content)?;
        let mime = Some(mime_type).filter(|m| !m.is_empty());
        native.set_property(path, NodeProperty::MimeType, mime)?;
        Ok(())
    }

    /// Content of `file` at the revision it was listed from.
    ///
    /// # Errors
    /// [`Conflict::FileDoesNotExist`] if the file is not there.
    pub fn read_file_content(&self, file: &FileEntry) -> Result<Vec<u8>> {
        let path = file.full_path();
        let snapshot = self.backend.snapshot_root(file.from_revision)?;
        match snapshot.read_file(&path) {
            Ok(data) => Ok(data),
            Err(Error::NotFound(_)) | Err(Error::IsADirectory(_)) => {
                Err(Conflict::FileDoesNotExist(path).into())
            }
            Err(e) => Err(e),
        }
    }

    /// Contents of several files, in the same order.
    pub fn read_file_contents(&self, files: &[FileEntry]) -> Result<Vec<Vec<u8>>> {
        files.iter().map(|f| self.read_file_content(f)).collect()
    }
}

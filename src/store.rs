use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use git2::{Oid, Repository};

use crate::backend::{Backend, Snapshot};
use crate::error::{Error, Result};
use crate::index::RevisionIndex;
use crate::notes;
use crate::paths;
use crate::tree::{self, TreeEntryResult};
use crate::txn::GitTransaction;
use crate::types::{BackendConfig, NodeKind, NodeProperty, RevisionProperty};

/// The versioned-storage engine: a bare git repository.
///
/// Revision numbers are positions on the configured branch's first-parent
/// chain (see [`BackendConfig::branch`]). `Send + Sync`; the repository
/// handle and the revision index each sit behind a mutex.
pub struct GitBackend {
    pub(crate) path: PathBuf,
    pub(crate) config: BackendConfig,
    pub(crate) refname: String,
    pub(crate) repo: Mutex<Repository>,
    pub(crate) index: Mutex<RevisionIndex>,
}

impl std::fmt::Debug for GitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBackend")
            .field("path", &self.path)
            .field("refname", &self.refname)
            .finish()
    }
}

impl GitBackend {
    fn from_repo(path: &Path, config: &BackendConfig, repo: Repository) -> Result<Self> {
        let refname = format!("refs/heads/{}", config.branch);
        let mut index = RevisionIndex::new();
        index.refresh(&repo, &refname)?;
        Ok(GitBackend {
            path: path.to_path_buf(),
            config: config.clone(),
            refname,
            repo: Mutex::new(repo),
            index: Mutex::new(index),
        })
    }

    /// Create the initial commit on the branch with an empty tree.
    fn init_branch(repo: &Repository, refname: &str, config: &BackendConfig) -> Result<()> {
        let tree_oid = tree::empty_tree(repo)?;
        let tree = repo.find_tree(tree_oid).map_err(Error::git)?;
        let sig = git2::Signature::now(&config.author, &config.email).map_err(Error::git)?;
        repo.commit(
            Some(refname),
            &sig,
            &sig,
            "Initialize repository",
            &tree,
            &[],
        )
        .map_err(Error::git)?;
        repo.set_head(refname).map_err(Error::git)?;
        Ok(())
    }

    /// Helper: lock the repo mutex and call `f` with the repository.
    pub(crate) fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;
        f(&repo)
    }

    /// Helper: lock the repo, refresh the revision index and call `f` with
    /// both.
    pub(crate) fn with_revisions<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository, &RevisionIndex) -> Result<T>,
    {
        self.with_repo(|repo| {
            let mut index = self
                .index
                .lock()
                .map_err(|e| Error::git_msg(e.to_string()))?;
            index.refresh(repo, &self.refname)?;
            f(repo, &index)
        })
    }

    /// The settings this backend was opened with.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Revision-level helpers shared with the snapshot and the transaction
// ---------------------------------------------------------------------------

pub(crate) fn tree_of(repo: &Repository, commit: Oid) -> Result<Oid> {
    Ok(repo.find_commit(commit).map_err(Error::git)?.tree_id())
}

fn entry_at_revision(
    repo: &Repository,
    index: &RevisionIndex,
    revision: u64,
    path: &str,
) -> Result<Option<TreeEntryResult>> {
    let tree_oid = tree_of(repo, index.commit(revision)?)?;
    tree::entry_at_path(repo, tree_oid, path)
}

fn commit_seconds(repo: &Repository, commit: Oid) -> Result<i64> {
    Ok(repo.find_commit(commit).map_err(Error::git)?.time().seconds())
}

/// Walk down from `revision` while `path` exists, returning the first
/// recorded value of `kind`.
fn node_property(
    repo: &Repository,
    index: &RevisionIndex,
    notes_ref: &str,
    revision: u64,
    path: &str,
    kind: NodeProperty,
) -> Result<Option<String>> {
    let mut rev = revision;
    loop {
        if entry_at_revision(repo, index, rev, path)?.is_none() {
            return Ok(None);
        }
        let note = notes::read_properties(repo, notes_ref, index.commit(rev)?)?;
        if let Some(value) = note.get(path, kind) {
            return Ok(value.map(str::to_string));
        }
        if rev == 0 {
            return Ok(None);
        }
        rev -= 1;
    }
}

// ---------------------------------------------------------------------------
// Backend impl
// ---------------------------------------------------------------------------

impl Backend for GitBackend {
    type Snapshot<'a> = GitSnapshot<'a>;
    type Transaction<'a> = GitTransaction<'a>;

    fn create(location: &Path, config: &BackendConfig) -> Result<Self> {
        paths::validate_branch_name(&config.branch)?;
        std::fs::create_dir_all(location).map_err(|e| Error::io(location, e))?;
        let repo = Repository::init_bare(location).map_err(Error::git)?;
        let refname = format!("refs/heads/{}", config.branch);
        Self::init_branch(&repo, &refname, config)?;
        log::info!("created repository at {}", location.display());
        Self::from_repo(location, config, repo)
    }

    fn open(location: &Path, config: &BackendConfig) -> Result<Self> {
        paths::validate_branch_name(&config.branch)?;
        if !Self::exists(location) {
            return Err(Error::repository_not_found(location));
        }
        let repo = Repository::open_bare(location).map_err(Error::git)?;
        let refname = format!("refs/heads/{}", config.branch);
        if repo.refname_to_id(&refname).is_err() {
            return Err(Error::repository_not_found(location));
        }
        log::debug!("opened repository at {}", location.display());
        Self::from_repo(location, config, repo)
    }

    fn exists(location: &Path) -> bool {
        match Repository::open_bare(location) {
            Ok(repo) => repo.is_bare() && repo.head().is_ok(),
            Err(_) => false,
        }
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn snapshot_root(&self, revision: u64) -> Result<GitSnapshot<'_>> {
        let tree_oid = self.with_revisions(|repo, index| tree_of(repo, index.commit(revision)?))?;
        Ok(GitSnapshot {
            backend: self,
            revision,
            tree_oid,
        })
    }

    fn revision_property(&self, kind: RevisionProperty, revision: u64) -> Result<Option<String>> {
        self.with_revisions(|repo, index| {
            let commit = repo
                .find_commit(index.commit(revision)?)
                .map_err(Error::git)?;
            let value = match kind {
                RevisionProperty::Author => commit.author().name().map(str::to_string),
                RevisionProperty::Log => commit.message().map(str::to_string),
                RevisionProperty::Date => DateTime::<Utc>::from_timestamp(commit.time().seconds(), 0)
                    .map(|t| t.to_rfc3339()),
            };
            Ok(value)
        })
    }

    fn history(
        &self,
        path: &str,
        from: u64,
        to: u64,
        observer: &mut dyn FnMut(&str, u64),
    ) -> Result<Vec<u64>> {
        let normalized = paths::normalize_path(path)?;
        self.with_revisions(|repo, index| {
            if to > index.youngest()? {
                return Err(Error::RevisionDoesNotExist(to));
            }

            let mut current = entry_at_revision(repo, index, to, &normalized)?.ok_or_else(|| {
                crate::Conflict::FileDoesNotExist(format!("/{}", normalized))
            })?;

            let mut revisions = Vec::new();
            let mut rev = to;
            while rev >= from {
                let previous = if rev == 0 {
                    None
                } else {
                    entry_at_revision(repo, index, rev - 1, &normalized)?
                };
                let touched = previous != Some(current)
                    || notes::read_properties(repo, &self.config.notes_ref, index.commit(rev)?)?
                        .mentions(&normalized);
                if touched {
                    observer(path, rev);
                    revisions.push(rev);
                }
                match previous {
                    Some(entry) if rev > from => {
                        current = entry;
                        rev -= 1;
                    }
                    _ => break,
                }
            }
            Ok(revisions)
        })
    }

    fn youngest_revision(&self) -> Result<u64> {
        self.with_revisions(|_, index| index.youngest())
    }

    fn revision_at_or_before(&self, timestamp: DateTime<Utc>) -> Result<u64> {
        let target = timestamp.timestamp();
        self.with_revisions(|repo, index| {
            let commits = index.commits();
            // first revision committed after `target`
            let (mut lo, mut hi) = (0usize, commits.len());
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if commit_seconds(repo, commits[mid])? <= target {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            Ok(lo.saturating_sub(1) as u64)
        })
    }

    fn open_transaction(&self, actor: &str, comment: &str) -> Result<GitTransaction<'_>> {
        GitTransaction::open(self, actor, comment)
    }
}

// ---------------------------------------------------------------------------
// GitSnapshot
// ---------------------------------------------------------------------------

/// The tree of one revision.
pub struct GitSnapshot<'a> {
    backend: &'a GitBackend,
    revision: u64,
    tree_oid: Oid,
}

impl Snapshot for GitSnapshot<'_> {
    fn revision(&self) -> u64 {
        self.revision
    }

    fn check_path(&self, path: &str) -> Result<Option<NodeKind>> {
        self.backend.with_repo(|repo| {
            Ok(tree::entry_at_path(repo, self.tree_oid, path)?.map(|e| e.kind()))
        })
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.backend
            .with_repo(|repo| tree::read_blob_at_path(repo, self.tree_oid, path))
    }

    fn list_entries(&self, path: &str) -> Result<BTreeMap<String, NodeKind>> {
        self.backend
            .with_repo(|repo| tree::list_tree_at_path(repo, self.tree_oid, path))
    }

    fn property(&self, path: &str, kind: NodeProperty) -> Result<Option<String>> {
        let normalized = paths::normalize_path(path)?;
        self.backend.with_revisions(|repo, index| {
            node_property(
                repo,
                index,
                &self.backend.config.notes_ref,
                self.revision,
                &normalized,
                kind,
            )
        })
    }
}

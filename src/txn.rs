use std::collections::BTreeSet;

use git2::{Oid, Repository};

use crate::backend::NativeTransaction;
use crate::error::{Error, Result};
use crate::lock::with_repo_lock;
use crate::notes::{self, PropertyNote};
use crate::paths;
use crate::store::{tree_of, GitBackend};
use crate::tree::{self, StagedDir};
use crate::types::{NodeKind, NodeProperty};

/// A recorded mutation, replayed when the branch moved underneath us.
#[derive(Debug, Clone)]
enum StagedOp {
    MakeDir(String),
    PutBlob(String, Oid),
    Remove(String),
}

/// Native transaction of the git engine.
///
/// Changes are staged on an in-memory overlay of the base revision's tree.
/// Blobs are written to the object database eagerly (they are unreachable
/// until finalized); the tree, the commit, the property note and the
/// branch update happen in [`finalize`](NativeTransaction::finalize) under
/// the repository lock.
pub struct GitTransaction<'a> {
    backend: &'a GitBackend,
    actor: String,
    comment: String,
    base_revision: u64,
    base_commit: Oid,
    root: StagedDir,
    ops: Vec<StagedOp>,
    touched: BTreeSet<String>,
    properties: PropertyNote,
}

impl<'a> GitTransaction<'a> {
    pub(crate) fn open(backend: &'a GitBackend, actor: &str, comment: &str) -> Result<Self> {
        let (base_revision, base_commit, base_tree) = backend.with_revisions(|repo, index| {
            let youngest = index.youngest()?;
            let commit = index.commit(youngest)?;
            Ok((youngest, commit, tree_of(repo, commit)?))
        })?;
        log::debug!("opened native transaction for {} on r{}", actor, base_revision);
        Ok(GitTransaction {
            backend,
            actor: actor.to_string(),
            comment: comment.to_string(),
            base_revision,
            base_commit,
            root: StagedDir::new(Some(base_tree)),
            ops: Vec::new(),
            touched: BTreeSet::new(),
            properties: PropertyNote::new(),
        })
    }

    fn apply(&mut self, op: StagedOp) -> Result<()> {
        let root = &mut self.root;
        self.backend.with_repo(|repo| replay(root, repo, &op))?;
        match &op {
            StagedOp::MakeDir(_) => {}
            StagedOp::PutBlob(path, _) | StagedOp::Remove(path) => {
                self.touched.insert(path.clone());
            }
        }
        self.ops.push(op);
        Ok(())
    }

    fn require_kind(&self, path: &str, want: NodeKind) -> Result<()> {
        match self.check_path(path)? {
            Some(kind) if kind == want => Ok(()),
            Some(NodeKind::Directory) => Err(Error::is_a_directory(path)),
            Some(NodeKind::File) => Err(Error::not_a_directory(path)),
            None => Err(Error::not_found(path)),
        }
    }

    /// Rebuild the staged changes on top of `head`, failing if any path
    /// they touch changed since the base revision, in content or in its
    /// recorded properties.
    fn rebase(
        repo: &Repository,
        notes_ref: &str,
        base_commit: Oid,
        head: Oid,
        ops: &[StagedOp],
        touched: &BTreeSet<String>,
    ) -> Result<StagedDir> {
        let base_tree = tree_of(repo, base_commit)?;
        let head_tree = tree_of(repo, head)?;
        for path in touched {
            if tree::entry_at_path(repo, base_tree, path)? != tree::entry_at_path(repo, head_tree, path)? {
                return Err(Error::out_of_date(format!(
                    "/{} changed since the transaction began",
                    path
                )));
            }
        }

        // commits in (base, head] along the first-parent chain
        let mut cursor = head;
        while cursor != base_commit {
            let note = notes::read_properties(repo, notes_ref, cursor)?;
            if let Some(path) = touched.iter().find(|p| note.mentions(p.as_str())) {
                return Err(Error::out_of_date(format!(
                    "properties of /{} changed since the transaction began",
                    path
                )));
            }
            let commit = repo.find_commit(cursor).map_err(Error::git)?;
            if commit.parent_count() == 0 {
                return Err(Error::out_of_date("branch history was rewritten"));
            }
            cursor = commit.parent_id(0).map_err(Error::git)?;
        }

        let mut root = StagedDir::new(Some(head_tree));
        for op in ops {
            replay(&mut root, repo, op)?;
        }
        Ok(root)
    }
}

fn replay(root: &mut StagedDir, repo: &Repository, op: &StagedOp) -> Result<()> {
    match op {
        StagedOp::MakeDir(path) => {
            let segments: Vec<&str> = path.split('/').collect();
            match root.kind(repo, &segments)? {
                Some(NodeKind::Directory) => Ok(()),
                _ => root.make_dir(repo, path),
            }
        }
        StagedOp::PutBlob(path, oid) => root.put_blob(repo, path, *oid),
        StagedOp::Remove(path) => root.remove(repo, path),
    }
}

fn non_root(path: &str) -> Result<String> {
    let normalized = paths::normalize_path(path)?;
    if normalized.is_empty() {
        return Err(Error::invalid_path("operation needs a non-root path"));
    }
    Ok(normalized)
}

impl NativeTransaction for GitTransaction<'_> {
    fn base_revision(&self) -> u64 {
        self.base_revision
    }

    fn check_path(&self, path: &str) -> Result<Option<NodeKind>> {
        let normalized = paths::normalize_path(path)?;
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        self.backend
            .with_repo(|repo| self.root.kind(repo, &segments))
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        let normalized = non_root(path)?;
        if self.check_path(&normalized)?.is_some() {
            return Err(Error::invalid_path(format!("already exists: /{}", normalized)));
        }
        self.apply(StagedOp::MakeDir(normalized))
    }

    fn make_file(&mut self, path: &str) -> Result<()> {
        let normalized = non_root(path)?;
        if self.check_path(&normalized)?.is_some() {
            return Err(Error::invalid_path(format!("already exists: /{}", normalized)));
        }
        let oid = self
            .backend
            .with_repo(|repo| repo.blob(&[]).map_err(Error::git))?;
        self.apply(StagedOp::PutBlob(normalized, oid))
    }

    fn write_content(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let normalized = non_root(path)?;
        self.require_kind(&normalized, NodeKind::File)?;
        let oid = self
            .backend
            .with_repo(|repo| repo.blob(data).map_err(Error::git))?;
        self.apply(StagedOp::PutBlob(normalized, oid))
    }

    fn set_property(&mut self, path: &str, kind: NodeProperty, value: Option<&str>) -> Result<()> {
        let normalized = non_root(path)?;
        if self.check_path(&normalized)?.is_none() {
            return Err(Error::not_found(path));
        }
        self.properties.set(&normalized, kind, value);
        self.touched.insert(normalized);
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        let normalized = non_root(path)?;
        if self.check_path(&normalized)?.is_none() {
            return Err(Error::not_found(path));
        }
        self.properties.forget(&normalized);
        self.apply(StagedOp::Remove(normalized))
    }

    fn finalize(self) -> Result<u64> {
        let GitTransaction {
            backend,
            actor,
            comment,
            base_revision,
            base_commit,
            root,
            ops,
            touched,
            properties,
        } = self;

        let repo = backend
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;

        with_repo_lock(&backend.path, backend.config.lock_timeout, || {
            let head = repo.refname_to_id(&backend.refname).map_err(Error::git)?;
            let root = if head == base_commit {
                root
            } else {
                log::warn!(
                    "branch moved since r{}; replaying {} staged changes",
                    base_revision,
                    ops.len()
                );
                Self::rebase(
                    &repo,
                    &backend.config.notes_ref,
                    base_commit,
                    head,
                    &ops,
                    &touched,
                )?
            };

            let tree_oid = root.write(&repo)?;
            let head_commit = repo.find_commit(head).map_err(Error::git)?;

            if tree_oid == head_commit.tree_id() && properties.is_empty() {
                log::debug!("native transaction by {} changed nothing", actor);
            } else {
                let tree = repo.find_tree(tree_oid).map_err(Error::git)?;
                let sig = git2::Signature::now(&actor, &backend.config.email).map_err(Error::git)?;
                let commit_oid = repo
                    .commit(None, &sig, &sig, &comment, &tree, &[&head_commit])
                    .map_err(Error::git)?;
                if !properties.is_empty() {
                    notes::write_properties(
                        &repo,
                        &backend.config.notes_ref,
                        &sig,
                        commit_oid,
                        &properties,
                    )?;
                }
                repo.reference_matching(
                    &backend.refname,
                    commit_oid,
                    true,
                    head,
                    &format!("commit: {}", comment),
                )
                .map_err(Error::git)?;
            }

            let mut index = backend
                .index
                .lock()
                .map_err(|e| Error::git_msg(e.to_string()))?;
            index.refresh(&repo, &backend.refname)?;
            index.youngest()
        })
    }

    fn discard(self) {
        log::debug!(
            "discarded native transaction by {} ({} staged changes)",
            self.actor,
            self.ops.len()
        );
    }
}

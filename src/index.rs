//! Revision numbering for the git engine.
//!
//! Revision `n` is the `n`-th commit on the branch's first-parent chain,
//! counting the initial empty commit as revision 0.

use git2::{Oid, Repository};

use crate::error::{Error, Result};

/// Commit oids indexed by revision number.
#[derive(Debug, Default)]
pub(crate) struct RevisionIndex {
    head: Option<Oid>,
    commits: Vec<Oid>,
}

impl RevisionIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Bring the index up to date with the current tip of `refname`.
    ///
    /// Only commits newer than the cached head are walked. If the cached
    /// head is not an ancestor of the new tip the index is rebuilt.
    pub(crate) fn refresh(&mut self, repo: &Repository, refname: &str) -> Result<()> {
        let tip = repo
            .refname_to_id(refname)
            .map_err(|_| Error::not_found(format!("branch ref '{}' not found", refname)))?;
        if self.head == Some(tip) {
            return Ok(());
        }

        let mut fresh = Vec::new();
        let mut cursor = tip;
        let mut reached_cached_head = false;
        loop {
            if Some(cursor) == self.head {
                reached_cached_head = true;
                break;
            }
            fresh.push(cursor);
            let commit = repo.find_commit(cursor).map_err(Error::git)?;
            if commit.parent_count() == 0 {
                break;
            }
            cursor = commit.parent_id(0).map_err(Error::git)?;
        }

        if !reached_cached_head {
            log::debug!("rebuilding revision index for {}", refname);
            self.commits.clear();
        }
        fresh.reverse();
        self.commits.extend(fresh);
        self.head = Some(tip);
        Ok(())
    }

    pub(crate) fn youngest(&self) -> Result<u64> {
        match self.commits.len() {
            0 => Err(Error::git_msg("revision index is empty")),
            n => Ok((n - 1) as u64),
        }
    }

    /// The commit of `revision`.
    pub(crate) fn commit(&self, revision: u64) -> Result<Oid> {
        usize::try_from(revision)
            .ok()
            .and_then(|idx| self.commits.get(idx).copied())
            .ok_or(Error::RevisionDoesNotExist(revision))
    }

    pub(crate) fn commits(&self) -> &[Oid] {
        &self.commits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_on(repo: &Repository, refname: &str, parent: Option<Oid>, msg: &str) -> Oid {
        let sig = git2::Signature::now("t", "t@localhost").unwrap();
        let tree_oid = repo.treebuilder(None).unwrap().write().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let parents: Vec<git2::Commit> = parent
            .map(|p| vec![repo.find_commit(p).unwrap()])
            .unwrap_or_default();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some(refname), &sig, &sig, msg, &tree, &parent_refs)
            .unwrap()
    }

    #[test]
    fn numbers_follow_first_parent_chain() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        let r0 = commit_on(&repo, "refs/heads/main", None, "r0");
        let r1 = commit_on(&repo, "refs/heads/main", Some(r0), "r1");

        let mut index = RevisionIndex::new();
        index.refresh(&repo, "refs/heads/main").unwrap();
        assert_eq!(index.youngest().unwrap(), 1);
        assert_eq!(index.commit(0).unwrap(), r0);
        assert_eq!(index.commit(1).unwrap(), r1);
        assert!(matches!(index.commit(2), Err(Error::RevisionDoesNotExist(2))));

        let r2 = commit_on(&repo, "refs/heads/main", Some(r1), "r2");
        index.refresh(&repo, "refs/heads/main").unwrap();
        assert_eq!(index.commits(), &[r0, r1, r2]);
    }

    #[test]
    fn missing_branch_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        let mut index = RevisionIndex::new();
        assert!(matches!(
            index.refresh(&repo, "refs/heads/main"),
            Err(Error::NotFound(_))
        ));
        assert!(index.youngest().is_err());
    }
}

use crate::conflict::Conflict;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::paths;

/// A caller-assembled batch of file operations, applied all-or-nothing by
/// [`Repository::commit`](crate::Repository::commit).
///
/// Paths are normalized when a job is added; an invalid path is rejected
/// right away rather than at commit time. Conflicts are only ever
/// recorded by `commit`, which hands the transaction back when it has any.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub(crate) user_id: String,
    pub(crate) comment: String,
    pub(crate) jobs: Vec<Job>,
    pub(crate) conflicts: Vec<Conflict>,
}

impl Transaction {
    /// Start an empty transaction on behalf of `user_id`.
    ///
    /// # Errors
    /// Returns [`Error::MissingActor`] if `user_id` is empty or blank.
    pub fn new(user_id: impl Into<String>, comment: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(Error::MissingActor);
        }
        Ok(Self {
            user_id,
            comment: comment.into(),
            jobs: Vec::new(),
            conflicts: Vec::new(),
        })
    }

    /// Request a directory (and every missing ancestor).
    pub fn add_path(&mut self, path: &str) -> Result<()> {
        let path = paths::canonical_path(path)?;
        self.jobs.push(Job::CreatePath { path });
        Ok(())
    }

    /// Request a new file at `path`.
    pub fn add(&mut self, path: &str, content: impl Into<Vec<u8>>, mime_type: &str) -> Result<()> {
        let path = file_path(path)?;
        self.jobs.push(Job::AddFile {
            path,
            content: content.into(),
            mime_type: mime_type.to_string(),
        });
        Ok(())
    }

    /// Request removal of `path`, asserting it was last modified in
    /// `expected_revision`.
    pub fn remove(&mut self, path: &str, expected_revision: u64) -> Result<()> {
        let path = file_path(path)?;
        self.jobs.push(Job::RemoveFile {
            path,
            expected_revision,
        });
        Ok(())
    }

    /// Request new content for `path`, asserting it was last modified in
    /// `expected_revision`.
    pub fn replace(
        &mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
        mime_type: &str,
        expected_revision: u64,
    ) -> Result<()> {
        let path = file_path(path)?;
        self.jobs.push(Job::ReplaceFile {
            path,
            content: content.into(),
            mime_type: mime_type.to_string(),
            expected_revision,
        });
        Ok(())
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Jobs in the order they will be applied.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Conflicts recorded by the last commit attempt.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// `true` when no jobs have been added.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub(crate) fn add_conflict(&mut self, conflict: Conflict) {
        self.conflicts.push(conflict);
    }
}

/// Canonicalize a path that must name a file, i.e. not the root.
fn file_path(path: &str) -> Result<String> {
    if paths::is_root_path(path) {
        return Err(Error::invalid_path("a file path must not be the root"));
    }
    paths::canonical_path(path)
}

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One requested change inside a [`Transaction`](crate::Transaction).
///
/// Paths are stored in canonical absolute form (`/dir/file.txt`).
/// `expected_revision` is the optimistic-concurrency token: the revision
/// the caller believes last modified `path`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Job {
    /// Create a directory and any missing ancestors.
    CreatePath { path: String },

    /// Add a new file.
    AddFile {
        path: String,
        content: Vec<u8>,
        mime_type: String,
    },

    /// Remove an existing file.
    RemoveFile { path: String, expected_revision: u64 },

    /// Overwrite a file's content and mime type.
    ReplaceFile {
        path: String,
        content: Vec<u8>,
        mime_type: String,
        expected_revision: u64,
    },
}

impl Job {
    /// The path this job operates on.
    pub fn path(&self) -> &str {
        match self {
            Self::CreatePath { path }
            | Self::AddFile { path, .. }
            | Self::RemoveFile { path, .. }
            | Self::ReplaceFile { path, .. } => path,
        }
    }

    /// The optimistic-concurrency token, for jobs that carry one.
    pub fn expected_revision(&self) -> Option<u64> {
        match self {
            Self::RemoveFile {
                expected_revision, ..
            }
            | Self::ReplaceFile {
                expected_revision, ..
            } => Some(*expected_revision),
            Self::CreatePath { .. } | Self::AddFile { .. } => None,
        }
    }
}

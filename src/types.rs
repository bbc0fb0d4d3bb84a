use std::time::Duration;

use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Mode constants
// ---------------------------------------------------------------------------

pub const MODE_BLOB: i32 = 0o100644;
pub const MODE_TREE: i32 = 0o040000;

// ---------------------------------------------------------------------------
// NodeKind / properties
// ---------------------------------------------------------------------------

/// What a path resolves to in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    /// Classify a raw git file mode.
    pub fn from_mode(mode: i32) -> Self {
        if mode == MODE_TREE {
            Self::Directory
        } else {
            Self::File
        }
    }

    pub fn is_file(self) -> bool {
        matches!(self, Self::File)
    }

    pub fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Properties recorded once per revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevisionProperty {
    /// The actor that committed the revision.
    Author,
    /// Commit time, RFC 3339.
    Date,
    /// The transaction comment.
    Log,
}

/// Properties attached to a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeProperty {
    MimeType,
}

impl NodeProperty {
    /// Key used when the property is persisted.
    pub fn key(self) -> &'static str {
        match self {
            Self::MimeType => "mime-type",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "mime-type" => Some(Self::MimeType),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot entries
// ---------------------------------------------------------------------------

/// A file listed by a [`Revision`](crate::Revision) query.
///
/// Also serves as the handle for
/// [`Repository::read_file_content`](crate::Repository::read_file_content):
/// content is read from `from_revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FileEntry {
    pub name: String,
    /// Canonical parent directory (`/` for top-level files).
    pub path: String,
    /// The revision this entry was listed from.
    pub from_revision: u64,
    pub last_modified_revision: u64,
    /// `true` iff `last_modified_revision == from_revision`.
    pub changed: bool,
    /// Author of `last_modified_revision`.
    pub user_id: Option<String>,
    pub mime_type: Option<String>,
}

impl FileEntry {
    /// Canonical absolute path of the file.
    pub fn full_path(&self) -> String {
        crate::paths::join(&self.path, &self.name)
    }
}

/// A directory listed by a [`Revision`](crate::Revision) query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub from_revision: u64,
    pub last_modified_revision: u64,
    pub changed: bool,
    pub user_id: Option<String>,
}

impl DirectoryEntry {
    pub fn full_path(&self) -> String {
        crate::paths::join(&self.path, &self.name)
    }
}

// ---------------------------------------------------------------------------
// CommitOutcome
// ---------------------------------------------------------------------------

/// Result of [`Repository::commit`](crate::Repository::commit).
#[derive(Debug)]
#[must_use]
pub enum CommitOutcome {
    /// Every job applied; `revision` is the youngest revision afterwards.
    Committed { revision: u64 },
    /// Nothing was applied; the transaction carries every conflict found.
    Conflicts(crate::transaction::Transaction),
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// The new revision, if the commit went through.
    pub fn revision(&self) -> Option<u64> {
        match self {
            Self::Committed { revision } => Some(*revision),
            Self::Conflicts(_) => None,
        }
    }

    /// The conflicts, empty when committed.
    pub fn conflicts(&self) -> &[crate::conflict::Conflict] {
        match self {
            Self::Committed { .. } => &[],
            Self::Conflicts(txn) => txn.conflicts(),
        }
    }
}

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Engine settings, passed to a backend when it is created or opened.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Branch whose first-parent chain defines the revision numbers.
    pub branch: String,
    /// Author recorded on revision 0.
    pub author: String,
    /// Email used in every commit signature.
    pub email: String,
    /// Ref holding node properties.
    pub notes_ref: String,
    /// How long a commit waits for the repository lock.
    pub lock_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            branch: "main".into(),
            author: "revstore".into(),
            email: "revstore@localhost".into(),
            notes_ref: "refs/notes/revstore".into(),
            lock_timeout: Duration::from_secs(30),
        }
    }
}

/// Parse an RFC 3339 timestamp.
///
/// # Errors
/// Returns [`Error::InvalidTimestamp`] if `s` is not RFC 3339.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidTimestamp(format!("{:?}: {}", s, e)))
}

use std::path::{Path, PathBuf};

use crate::conflict::Conflict;

/// All structural errors produced by revstore.
///
/// Per-job conflicts discovered during a commit are *not* errors; they are
/// collected into the [`Transaction`](crate::Transaction). A [`Conflict`]
/// only surfaces here when there is no transaction to carry it (a
/// repository collision, a read of a missing file, history of a missing
/// path).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no repository at {}", .0.display())]
    RepositoryNotFound(PathBuf),

    #[error("revision {0} does not exist")]
    RevisionDoesNotExist(u64),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("a transaction requires a user id")]
    MissingActor,

    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("transaction out of date: {0}")]
    OutOfDate(String),

    #[error("repository handle has been dropped")]
    RepositoryClosed,

    #[error("git error: {0}")]
    Git(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn out_of_date(msg: impl Into<String>) -> Self {
        Self::OutOfDate(msg.into())
    }

    pub fn repository_not_found(location: impl AsRef<Path>) -> Self {
        Self::RepositoryNotFound(location.as_ref().to_path_buf())
    }

    pub fn git(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Git(Box::new(err))
    }

    pub fn git_msg(msg: impl Into<String>) -> Self {
        Self::Git(msg.into().into())
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }

    /// The conflict carried by this error, if it is one.
    pub fn as_conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

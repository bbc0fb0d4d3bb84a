//! Reasons a single job could not be applied.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why one file operation could not be applied.
///
/// Conflicts are terminal for the job that produced them; retrying with
/// refreshed revision tokens is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Conflict {
    /// The path is already occupied.
    #[error("file already exists: {0}")]
    FileExists(String),

    /// The path is not present.
    #[error("file does not exist: {0}")]
    FileDoesNotExist(String),

    /// The caller's expected revision is not the path's latest modifying
    /// revision.
    #[error("file is out of sync: {0}")]
    FileOutOfSync(String),

    /// A repository already exists at the location given to `create`.
    #[error("there is already a repository at {0}")]
    Collision(String),
}

impl Conflict {
    /// The path (or, for [`Conflict::Collision`], the location) concerned.
    pub fn path(&self) -> &str {
        match self {
            Self::FileExists(p)
            | Self::FileDoesNotExist(p)
            | Self::FileOutOfSync(p)
            | Self::Collision(p) => p,
        }
    }
}

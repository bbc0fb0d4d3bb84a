//! A transactional, revision-numbered file repository.
//!
//! `revstore` applies batches of file operations atomically, numbers every
//! successful commit, and guards concurrent edits with per-file
//! optimistic-concurrency tokens. Storage is delegated to a [`Backend`];
//! [`GitBackend`] keeps everything in a bare git repository.
//!
//! # Key types
//!
//! - [`Repository`]: the handle to one repository; creates transactions,
//!   commits them and hands out revisions.
//! - [`Transaction`]: an ordered batch of [`Job`]s. A commit either
//!   applies every job or applies none and returns every [`Conflict`].
//! - [`Revision`]: a read-only view of one revision: listings, last
//!   modification, authorship.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use revstore::{BackendConfig, CommitOutcome, GitRepository};
//!
//! let repo = GitRepository::create("/tmp/course.git", &BackendConfig::default()).unwrap();
//!
//! let mut txn = repo.begin_transaction("alice", "first submission").unwrap();
//! txn.add("/a1/main.c", b"int main() {}".to_vec(), "text/x-c").unwrap();
//! let rev = match repo.commit(txn).unwrap() {
//!     CommitOutcome::Committed { revision } => revision,
//!     CommitOutcome::Conflicts(txn) => panic!("{:?}", txn.conflicts()),
//! };
//!
//! // Editing requires the revision that last touched the file.
//! let mut txn = repo.begin_transaction("alice", "fix").unwrap();
//! txn.replace("/a1/main.c", b"int main() { return 0; }".to_vec(), "text/x-c", rev).unwrap();
//! assert!(repo.commit(txn).unwrap().is_committed());
//!
//! let files = repo.latest_revision().unwrap().files_at("/a1").unwrap();
//! assert!(files["main.c"].changed);
//! ```

pub mod backend;
pub mod conflict;
pub mod error;
pub mod history;
mod index;
pub mod job;
pub mod lock;
mod notes;
pub mod paths;
pub mod repository;
pub mod revision;
pub mod store;
pub mod transaction;
pub mod tree;
pub mod txn;
pub mod types;

// Re-export primary public types at crate root.
pub use backend::{Backend, NativeTransaction, Snapshot};
pub use conflict::Conflict;
pub use error::{Error, Result};
pub use job::Job;
pub use repository::{GitRepository, Repository};
pub use revision::{GitRevision, Revision};
pub use store::{GitBackend, GitSnapshot};
pub use transaction::Transaction;
pub use txn::GitTransaction;
pub use types::*;

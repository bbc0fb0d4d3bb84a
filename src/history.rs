//! Merged history over several paths.

use std::collections::BTreeSet;

use crate::backend::Backend;
use crate::conflict::Conflict;
use crate::error::Result;
use crate::paths;

/// Revisions within `[from, to]` that touched any of `paths`, ascending and
/// without duplicates. `to` defaults to the youngest revision.
///
/// # Errors
/// [`Error::RevisionDoesNotExist`](crate::Error::RevisionDoesNotExist) if
/// `to` is beyond the youngest revision;
/// [`Conflict::FileDoesNotExist`] if a path does not exist at `to`.
pub fn history<B, I, S>(backend: &B, paths: I, from: u64, to: Option<u64>) -> Result<Vec<u64>>
where
    B: Backend,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    history_with(backend, paths, from, to, |_, _| {})
}

/// Like [`history`], invoking `observer` for every `(path, revision)` event
/// the backend reports, in the backend's order.
pub fn history_with<B, I, S, F>(
    backend: &B,
    paths: I,
    from: u64,
    to: Option<u64>,
    mut observer: F,
) -> Result<Vec<u64>>
where
    B: Backend,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str, u64),
{
    let to = match to {
        Some(to) => to,
        None => backend.youngest_revision()?,
    };

    let mut revisions = BTreeSet::new();
    for path in paths {
        let found = backend.history(path.as_ref(), from, to, &mut observer)?;
        revisions.extend(found);
    }
    Ok(revisions.into_iter().collect())
}

/// The latest revision at or before `bound` that touched `path`.
pub(crate) fn last_modified<B: Backend>(backend: &B, path: &str, bound: u64) -> Result<u64> {
    let revisions = backend.history(path, 0, bound, &mut |_, _| {})?;
    // newest first
    match revisions.first() {
        Some(rev) => Ok(*rev),
        None => Err(Conflict::FileDoesNotExist(paths::canonical_path(path)?).into()),
    }
}

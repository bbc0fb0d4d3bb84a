use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

const MAX_BACKOFF: Duration = Duration::from_millis(200);

/// Acquire an advisory file lock on the repository, execute `f`, then release.
///
/// Creates `<gitdir>/revstore.lock` and takes an exclusive `fs2` lock on
/// it, retrying with exponential backoff until `timeout` has elapsed.
/// Serializes commits across threads and processes.
///
/// # Arguments
/// * `gitdir` - Path to the bare repository directory.
/// * `timeout` - How long to keep retrying.
/// * `f` - Closure to execute while the lock is held.
///
/// # Errors
/// Returns an [`Error::Io`] of kind `TimedOut` if the lock cannot be
/// acquired within the timeout.
pub fn with_repo_lock<F, T>(gitdir: &Path, timeout: Duration, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let lock_path = gitdir.join("revstore.lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    let deadline = Instant::now() + timeout;
    let mut backoff = Duration::from_millis(5);
    loop {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => break,
            Err(e) if is_contended(&e) => {
                if Instant::now() >= deadline {
                    return Err(Error::io(
                        &lock_path,
                        io::Error::new(io::ErrorKind::TimedOut, "timed out waiting for repository lock"),
                    ));
                }
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(e) => return Err(Error::io(&lock_path, e)),
        }
    }

    f()
    // `file` drops here, releasing the lock
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

use crate::error::{Error, Result};

/// Normalize a repository path: strip leading/trailing slashes, reject `..`
/// segments, and collapse repeated slashes and `.` markers.
///
/// An empty input (or one made only of slashes) returns an empty string,
/// which denotes the root.
///
/// # Errors
/// Returns [`Error::InvalidPath`] if the path contains `..` segments or
/// collapses to nothing (e.g. `"."`).
pub fn normalize_path(path: &str) -> Result<String> {
    if path.is_empty() {
        return Ok(String::new());
    }

    let mut segments: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        if seg == ".." {
            return Err(Error::invalid_path(format!(
                "path segment '{}' is not allowed",
                seg,
            )));
        }
        segments.push(seg);
    }

    if segments.is_empty() {
        if path.bytes().all(|b| b == b'/') {
            return Ok(String::new());
        }
        return Err(Error::invalid_path("path must not be empty"));
    }

    Ok(segments.join("/"))
}

/// Normalize `path` and render it in the absolute form used in jobs,
/// conflicts and entries: `"/"` for the root, `"/a/b"` otherwise.
pub fn canonical_path(path: &str) -> Result<String> {
    let normalized = normalize_path(path)?;
    Ok(format!("/{}", normalized))
}

/// Returns `true` when the path refers to the root of the tree
/// (empty string or only slashes).
pub fn is_root_path(path: &str) -> bool {
    path.is_empty() || path.chars().all(|c| c == '/')
}

/// Join a directory and an entry name into a canonical absolute path.
pub fn join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{}", name)
    } else if dir.starts_with('/') {
        format!("{}/{}", dir, name)
    } else {
        format!("/{}/{}", dir, name)
    }
}

/// Split a normalized path into `(parent, name)`. The parent of a
/// top-level entry is the empty string.
pub fn split_parent(normalized: &str) -> (&str, &str) {
    match normalized.rfind('/') {
        Some(idx) => (&normalized[..idx], &normalized[idx + 1..]),
        None => ("", normalized),
    }
}

/// Every proper ancestor of a normalized path, shallowest first.
///
/// `ancestors("a/b/c")` yields `["a", "a/b"]`.
pub fn ancestors(normalized: &str) -> Vec<&str> {
    normalized
        .match_indices('/')
        .map(|(idx, _)| &normalized[..idx])
        .collect()
}

/// Validate a branch name used by the git engine.
///
/// Rejects spaces, control characters, `..`, `@{`, a trailing `.` and a
/// `.lock` suffix per git's `check-ref-format` rules.
///
/// # Errors
/// Returns [`Error::InvalidPath`] if the name violates any rule.
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_path("branch name must not be empty"));
    }

    for ch in name.chars() {
        match ch {
            ':' | ' ' | '\t' | '\n' | '\r' | '\\' | '^' | '~' | '?' | '*' | '[' => {
                return Err(Error::invalid_path(format!(
                    "branch name contains invalid character: {:?}",
                    ch,
                )));
            }
            _ => {}
        }
    }

    if name.contains("..") || name.contains("@{") {
        return Err(Error::invalid_path(format!("invalid branch name: {}", name)));
    }

    if name.ends_with('.') || name.ends_with(".lock") || name.starts_with('/') {
        return Err(Error::invalid_path(format!("invalid branch name: {}", name)));
    }

    Ok(())
}

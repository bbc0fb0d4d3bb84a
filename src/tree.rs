use std::collections::BTreeMap;

use git2::{Oid, Repository};

use crate::error::{Error, Result};
use crate::types::{NodeKind, MODE_BLOB, MODE_TREE};

/// Result of looking up a single tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeEntryResult {
    pub oid: Oid,
    pub mode: i32,
}

impl TreeEntryResult {
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_mode(self.mode)
    }
}

/// Return the `(oid, mode)` of the entry at `path`, or `None` if missing.
///
/// Walks the tree from `tree_oid` through each path segment. Returns `None`
/// when any segment is not found or an intermediate entry is not a tree.
///
/// # Arguments
/// * `repo` - The git repository.
/// * `tree_oid` - Root tree to search from.
/// * `path` - Forward-slash path (e.g. `"dir/file.txt"`); `""` is the root.
pub fn entry_at_path(
    repo: &Repository,
    tree_oid: Oid,
    path: &str,
) -> Result<Option<TreeEntryResult>> {
    let path = crate::paths::normalize_path(path)?;
    if path.is_empty() {
        return Ok(Some(TreeEntryResult {
            oid: tree_oid,
            mode: MODE_TREE,
        }));
    }

    let segments: Vec<&str> = path.split('/').collect();
    let mut current_oid = tree_oid;

    for (i, segment) in segments.iter().enumerate() {
        let tree = repo.find_tree(current_oid).map_err(Error::git)?;
        let entry = match tree.get_name(segment) {
            Some(entry) => entry,
            None => return Ok(None),
        };
        let entry_mode = entry.filemode();
        let entry_oid = entry.id();

        if i == segments.len() - 1 {
            return Ok(Some(TreeEntryResult {
                oid: entry_oid,
                mode: entry_mode,
            }));
        }
        if entry_mode != MODE_TREE {
            return Ok(None);
        }
        current_oid = entry_oid;
    }

    Ok(None)
}

/// Read a blob at a given path in the tree, returning its raw bytes.
///
/// # Errors
/// Returns [`Error::IsADirectory`] if the path points to a tree,
/// [`Error::NotFound`] if the path does not exist.
pub fn read_blob_at_path(repo: &Repository, tree_oid: Oid, path: &str) -> Result<Vec<u8>> {
    let entry = entry_at_path(repo, tree_oid, path)?.ok_or_else(|| Error::not_found(path))?;
    if entry.mode == MODE_TREE {
        return Err(Error::is_a_directory(path));
    }
    let blob = repo.find_blob(entry.oid).map_err(Error::git)?;
    Ok(blob.content().to_vec())
}

/// List the immediate children of the tree at `path`.
///
/// # Errors
/// Returns [`Error::NotFound`] if the path does not exist, or
/// [`Error::NotADirectory`] if it is not a tree.
pub fn list_tree_at_path(
    repo: &Repository,
    tree_oid: Oid,
    path: &str,
) -> Result<BTreeMap<String, NodeKind>> {
    let entry = entry_at_path(repo, tree_oid, path)?.ok_or_else(|| Error::not_found(path))?;
    if entry.mode != MODE_TREE {
        return Err(Error::not_a_directory(path));
    }

    let tree = repo.find_tree(entry.oid).map_err(Error::git)?;
    let mut entries = BTreeMap::new();
    for e in tree.iter() {
        let name = String::from_utf8_lossy(e.name_bytes()).into_owned();
        entries.insert(name, NodeKind::from_mode(e.filemode()));
    }
    Ok(entries)
}

/// Write (or find) the empty tree object.
pub fn empty_tree(repo: &Repository) -> Result<Oid> {
    let builder = repo.treebuilder(None).map_err(Error::git)?;
    builder.write().map_err(Error::git)
}

// ---------------------------------------------------------------------------
// StagedDir: mutable overlay over a committed tree
// ---------------------------------------------------------------------------

/// A node in a [`StagedDir`].
#[derive(Debug, Clone)]
pub(crate) enum StagedNode {
    Blob { oid: Oid, mode: i32 },
    Tree(StagedDir),
}

/// A directory whose children are loaded from `base` on first mutation.
///
/// Unloaded directories are written back by reference, so only the
/// ancestor chain of changed paths is rebuilt; siblings are shared.
/// Empty directories are kept.
#[derive(Debug, Clone)]
pub(crate) struct StagedDir {
    base: Option<Oid>,
    children: Option<BTreeMap<String, StagedNode>>,
}

impl StagedDir {
    pub(crate) fn new(base: Option<Oid>) -> Self {
        Self {
            base,
            children: None,
        }
    }

    fn empty() -> Self {
        Self {
            base: None,
            children: Some(BTreeMap::new()),
        }
    }

    fn load(&mut self, repo: &Repository) -> Result<&mut BTreeMap<String, StagedNode>> {
        if self.children.is_none() {
            let mut map = BTreeMap::new();
            if let Some(oid) = self.base {
                let tree = repo.find_tree(oid).map_err(Error::git)?;
                for e in tree.iter() {
                    let name = String::from_utf8_lossy(e.name_bytes()).into_owned();
                    let node = if e.filemode() == MODE_TREE {
                        StagedNode::Tree(StagedDir::new(Some(e.id())))
                    } else {
                        StagedNode::Blob {
                            oid: e.id(),
                            mode: e.filemode(),
                        }
                    };
                    map.insert(name, node);
                }
            }
            self.children = Some(map);
        }
        Ok(self.children.get_or_insert_with(BTreeMap::new))
    }

    /// What `segments` resolves to beneath this directory.
    pub(crate) fn kind(&self, repo: &Repository, segments: &[&str]) -> Result<Option<NodeKind>> {
        let (first, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Ok(Some(NodeKind::Directory)),
        };

        match &self.children {
            Some(children) => match children.get(*first) {
                None => Ok(None),
                Some(StagedNode::Blob { .. }) if rest.is_empty() => Ok(Some(NodeKind::File)),
                Some(StagedNode::Blob { .. }) => Ok(None),
                Some(StagedNode::Tree(dir)) => dir.kind(repo, rest),
            },
            None => match self.base {
                Some(oid) => {
                    let entry = entry_at_path(repo, oid, &segments.join("/"))?;
                    Ok(entry.map(|e| e.kind()))
                }
                None => Ok(None),
            },
        }
    }

    /// The directory at `segments`, loading along the way.
    fn dir_mut(
        &mut self,
        repo: &Repository,
        segments: &[&str],
        path: &str,
    ) -> Result<&mut StagedDir> {
        let (first, rest) = match segments.split_first() {
            Some(split) => split,
            None => return Ok(self),
        };
        match self.load(repo)?.get_mut(*first) {
            Some(StagedNode::Tree(dir)) => dir.dir_mut(repo, rest, path),
            Some(StagedNode::Blob { .. }) => Err(Error::not_a_directory(path)),
            None => Err(Error::not_found(path)),
        }
    }

    /// Split `path` into parent segments and leaf name.
    fn leaf(path: &str) -> Result<(Vec<&str>, &str)> {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let name = segments
            .pop()
            .ok_or_else(|| Error::invalid_path("operation needs a non-root path"))?;
        Ok((segments, name))
    }

    /// Create an empty directory at the normalized `path`.
    pub(crate) fn make_dir(&mut self, repo: &Repository, path: &str) -> Result<()> {
        let (parent, name) = Self::leaf(path)?;
        let children = self.dir_mut(repo, &parent, path)?.load(repo)?;
        if children.contains_key(name) {
            return Err(Error::invalid_path(format!("already exists: {}", path)));
        }
        children.insert(name.to_string(), StagedNode::Tree(StagedDir::empty()));
        Ok(())
    }

    /// Point the file at the normalized `path` to blob `oid`, creating it
    /// if absent.
    pub(crate) fn put_blob(&mut self, repo: &Repository, path: &str, oid: Oid) -> Result<()> {
        let (parent, name) = Self::leaf(path)?;
        let children = self.dir_mut(repo, &parent, path)?.load(repo)?;
        if let Some(StagedNode::Tree(_)) = children.get(name) {
            return Err(Error::is_a_directory(path));
        }
        children.insert(
            name.to_string(),
            StagedNode::Blob {
                oid,
                mode: MODE_BLOB,
            },
        );
        Ok(())
    }

    /// Remove the entry at the normalized `path`.
    pub(crate) fn remove(&mut self, repo: &Repository, path: &str) -> Result<()> {
        let (parent, name) = Self::leaf(path)?;
        let children = self.dir_mut(repo, &parent, path)?.load(repo)?;
        match children.remove(name) {
            Some(_) => Ok(()),
            None => Err(Error::not_found(path)),
        }
    }

    /// Write this directory (and every loaded descendant) to the object
    /// database, returning the tree oid.
    pub(crate) fn write(&self, repo: &Repository) -> Result<Oid> {
        let children = match &self.children {
            Some(children) => children,
            None => {
                return match self.base {
                    Some(oid) => Ok(oid),
                    None => empty_tree(repo),
                }
            }
        };

        let mut builder = repo.treebuilder(None).map_err(Error::git)?;
        for (name, node) in children {
            let (oid, mode) = match node {
                StagedNode::Blob { oid, mode } => (*oid, *mode),
                StagedNode::Tree(dir) => (dir.write(repo)?, MODE_TREE),
            };
            builder
                .insert(name.as_str(), oid, mode)
                .map_err(Error::git)?;
        }
        builder.write().map_err(Error::git)
    }
}

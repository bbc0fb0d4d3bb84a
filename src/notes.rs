//! Node properties stored as git notes.
//!
//! Git trees have no per-path metadata, so the properties a commit sets
//! are written as a note on that commit under `BackendConfig::notes_ref`.
//! The note body is a JSON array of `[key, path, value]` triples, where
//! `path` is normalized and an empty value records that the property was
//! cleared.

use std::collections::BTreeMap;

use git2::{ErrorCode, Oid, Repository, Signature};

use crate::error::{Error, Result};
use crate::types::NodeProperty;

/// The properties set by a single commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PropertyNote {
    entries: BTreeMap<(String, NodeProperty), String>,
}

impl PropertyNote {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `value` for `path`; `None` records a cleared property.
    pub(crate) fn set(&mut self, path: &str, kind: NodeProperty, value: Option<&str>) {
        self.entries.insert(
            (path.to_string(), kind),
            value.unwrap_or_default().to_string(),
        );
    }

    /// `Some(None)` when the property was cleared, `None` when this note
    /// says nothing about it.
    pub(crate) fn get(&self, path: &str, kind: NodeProperty) -> Option<Option<&str>> {
        self.entries
            .get(&(path.to_string(), kind))
            .map(|v| if v.is_empty() { None } else { Some(v.as_str()) })
    }

    /// Whether any property of `path` or of a path beneath it is recorded.
    pub(crate) fn mentions(&self, path: &str) -> bool {
        if path.is_empty() {
            return !self.entries.is_empty();
        }
        let prefix = format!("{}/", path);
        self.entries
            .keys()
            .any(|(p, _)| p == path || p.starts_with(&prefix))
    }

    /// Drop everything recorded for `path` and its descendants.
    pub(crate) fn forget(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        self.entries
            .retain(|(p, _), _| p != path && !p.starts_with(&prefix));
    }

    /// Decode a note body. Entries with unknown keys are skipped.
    fn parse(text: &str) -> Result<Self> {
        let rows: Vec<[String; 3]> = serde_json::from_str(text)
            .map_err(|e| Error::git_msg(format!("malformed property note: {}", e)))?;
        let mut note = Self::new();
        for [key, path, value] in rows {
            if let Some(kind) = NodeProperty::from_key(&key) {
                note.entries.insert((path, kind), value);
            }
        }
        Ok(note)
    }

    fn render(&self) -> Result<String> {
        let rows: Vec<[&str; 3]> = self
            .entries
            .iter()
            .map(|((path, kind), value)| [kind.key(), path.as_str(), value.as_str()])
            .collect();
        serde_json::to_string_pretty(&rows).map_err(Error::git)
    }
}

/// Read the properties recorded on `commit`; empty if it has no note.
pub(crate) fn read_properties(
    repo: &Repository,
    notes_ref: &str,
    commit: Oid,
) -> Result<PropertyNote> {
    match repo.find_note(Some(notes_ref), commit) {
        Ok(note) => PropertyNote::parse(note.message().unwrap_or("[]")),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(PropertyNote::new()),
        Err(e) => Err(Error::git(e)),
    }
}

/// Attach `note` to `commit`, replacing any previous note.
pub(crate) fn write_properties(
    repo: &Repository,
    notes_ref: &str,
    signature: &Signature<'_>,
    commit: Oid,
    note: &PropertyNote,
) -> Result<()> {
    repo.note(
        signature,
        signature,
        Some(notes_ref),
        commit,
        &note.render()?,
        true,
    )
    .map_err(Error::git)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_then_parse() {
        let mut note = PropertyNote::new();
        note.set("a.txt", NodeProperty::MimeType, Some("text/plain"));
        note.set("dir/b.bin", NodeProperty::MimeType, None);
        let parsed = PropertyNote::parse(&note.render().unwrap()).unwrap();
        assert_eq!(parsed, note);
        assert_eq!(
            parsed.get("a.txt", NodeProperty::MimeType),
            Some(Some("text/plain"))
        );
        assert_eq!(parsed.get("dir/b.bin", NodeProperty::MimeType), Some(None));
        assert_eq!(parsed.get("c.txt", NodeProperty::MimeType), None);
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let parsed = PropertyNote::parse(
            r#"[["svn:eol", "a", "x"], ["mime-type", "b", "text/html"]]"#,
        )
        .unwrap();
        assert!(!parsed.mentions("a"));
        assert!(parsed.mentions("b"));
        assert!(PropertyNote::parse("mime-type\tb\ttext/html").is_err());
    }

    #[test]
    fn separators_in_paths_and_values_survive() {
        let mut note = PropertyNote::new();
        note.set("a\tb", NodeProperty::MimeType, Some("text/plain"));
        note.set(
            "m.txt",
            NodeProperty::MimeType,
            Some("text/plain\nmime-type\tvictim.txt\tapplication/evil"),
        );
        let parsed = PropertyNote::parse(&note.render().unwrap()).unwrap();
        assert_eq!(parsed, note);
        assert_eq!(
            parsed.get("a\tb", NodeProperty::MimeType),
            Some(Some("text/plain"))
        );
        assert!(!parsed.mentions("a"));
        assert!(!parsed.mentions("victim.txt"));
    }

    #[test]
    fn mentions_covers_descendants() {
        let mut note = PropertyNote::new();
        note.set("dir/sub/a", NodeProperty::MimeType, Some("x"));
        assert!(note.mentions("dir"));
        assert!(note.mentions("dir/sub"));
        assert!(note.mentions(""));
        assert!(!note.mentions("di"));
    }

    #[test]
    fn forget_drops_descendants() {
        let mut note = PropertyNote::new();
        note.set("dir/a", NodeProperty::MimeType, Some("x"));
        note.set("dir", NodeProperty::MimeType, Some("y"));
        note.set("dirt", NodeProperty::MimeType, Some("z"));
        note.forget("dir");
        assert!(!note.mentions("dir/a"));
        assert!(!note.mentions("dir"));
        assert!(note.mentions("dirt"));
    }

    #[test]
    fn notes_round_trip_through_git() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        let sig = Signature::now("t", "t@localhost").unwrap();
        let tree = repo
            .find_tree(repo.treebuilder(None).unwrap().write().unwrap())
            .unwrap();
        let commit = repo.commit(None, &sig, &sig, "c", &tree, &[]).unwrap();

        assert!(read_properties(&repo, "refs/notes/test", commit)
            .unwrap()
            .is_empty());

        let mut note = PropertyNote::new();
        note.set("a.txt", NodeProperty::MimeType, Some("text/plain"));
        write_properties(&repo, "refs/notes/test", &sig, commit, &note).unwrap();
        assert_eq!(read_properties(&repo, "refs/notes/test", commit).unwrap(), note);
    }
}

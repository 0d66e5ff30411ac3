use crate::error::{ExtractorError, Result};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Reduces a set of selected folders to non-overlapping roots under a
/// traversal root.
pub struct PathSetCanonicalizer {
    root: PathBuf,
}

impl PathSetCanonicalizer {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Every input must lie strictly below the traversal root; root files are
    /// a separate unit and never a folder selection.
    pub fn canonicalize<I, P>(&self, paths: I) -> Result<Vec<PathBuf>>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut candidates = Vec::new();

        for path in paths {
            let path = path.as_ref();

            if path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
            {
                return Err(ExtractorError::InvalidSelection {
                    selection: path.display().to_string(),
                    reason: "path must not contain '.' or '..' segments".to_string(),
                });
            }

            if path == self.root.as_path() {
                return Err(ExtractorError::InvalidSelection {
                    selection: path.display().to_string(),
                    reason: "the root itself cannot be selected as a folder; select root files instead"
                        .to_string(),
                });
            }

            if !path.starts_with(&self.root) {
                return Err(ExtractorError::InvalidSelection {
                    selection: path.display().to_string(),
                    reason: format!("not inside root {}", self.root.display()),
                });
            }

            candidates.push(path.to_path_buf());
        }

        Ok(minimal_roots(candidates))
    }
}

/// Drops every path that is equal to or below another path in the set.
///
/// Candidates are visited in ascending depth so an ancestor is always
/// accepted before any of its descendants is considered. The result is
/// sorted and independent of input order.
pub fn minimal_roots<I>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let unique: BTreeSet<PathBuf> = paths.into_iter().collect();
    let mut by_depth: Vec<PathBuf> = unique.into_iter().collect();
    by_depth.sort_by_key(|p| p.components().count());

    let mut accepted: Vec<PathBuf> = Vec::new();
    for candidate in by_depth {
        if !accepted.iter().any(|parent| candidate.starts_with(parent)) {
            accepted.push(candidate);
        }
    }

    accepted.sort();
    accepted
}

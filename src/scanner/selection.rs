use crate::error::{ExtractorError, Result};
use crate::scanner::policy::ExtractionPolicy;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Stable identifier of a selectable folder: its root-relative path with `/`
/// separators. Display text is derived from it, never the other way around.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FolderId(String);

impl FolderId {
    pub fn from_relative(relative: &Path) -> Option<Self> {
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
                _ => return None,
            }
        }

        if segments.is_empty() {
            None
        } else {
            Some(Self(segments.join("/")))
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        let trimmed = id.trim().trim_matches('/');
        Self::from_relative(Path::new(trimmed)).ok_or_else(|| ExtractorError::InvalidSelection {
            selection: id.to_string(),
            reason: "expected a folder path relative to the root".to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.split('/').count()
    }

    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// Every immediate, non-excluded subfolder of the root plus root files.
    Everything,
    Specific {
        folders: Vec<String>,
        include_root_files: bool,
    },
}

#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub root: PathBuf,
    pub mode: SelectionMode,
}

/// Resolved selection: absolute folder paths (not yet canonicalized) and the
/// root files flag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSelection {
    pub folders: Vec<PathBuf>,
    pub include_root_files: bool,
}

/// Folders available for selection beneath a root, keyed by [`FolderId`].
#[derive(Debug, Clone)]
pub struct FolderCatalog {
    root: PathBuf,
    entries: BTreeMap<FolderId, PathBuf>,
}

impl FolderCatalog {
    /// Lists folders up to `max_depth` levels below `root`, pruning excluded
    /// directories. Unreadable subtrees are skipped.
    pub fn scan(root: &Path, policy: &ExtractionPolicy, max_depth: usize) -> Result<Self> {
        let root = resolve_root(root)?;
        let mut entries = BTreeMap::new();

        let walker = WalkDir::new(&root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || e.file_name().to_str().is_some_and(|n| policy.should_descend(n))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Skipping unreadable folder while listing: {}", err);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            if let Some(id) = FolderId::from_relative(relative) {
                entries.insert(id, entry.path().to_path_buf());
            }
        }

        Ok(Self { root, entries })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FolderId, &PathBuf)> {
        self.entries.iter()
    }

    pub fn path_for(&self, id: &FolderId) -> Option<&Path> {
        self.entries.get(id).map(PathBuf::as_path)
    }

    /// Top-level folders only, as used by the "everything" mode.
    pub fn top_level(&self) -> Vec<PathBuf> {
        self.entries
            .iter()
            .filter(|(id, _)| id.depth() == 1)
            .map(|(_, path)| path.clone())
            .collect()
    }
}

/// Turns a request into absolute folder paths.
///
/// Ids that are not in the catalog (for example deeper than the scan depth)
/// are still accepted when they name an existing folder that the policy would
/// not prune.
pub fn resolve_selection(
    request: &SelectionRequest,
    policy: &ExtractionPolicy,
    scan_depth: usize,
) -> Result<ResolvedSelection> {
    match &request.mode {
        SelectionMode::Everything => {
            let catalog = FolderCatalog::scan(&request.root, policy, 1)?;
            Ok(ResolvedSelection {
                folders: catalog.top_level(),
                include_root_files: true,
            })
        }
        SelectionMode::Specific {
            folders,
            include_root_files,
        } => {
            if folders.is_empty() && !include_root_files {
                return Err(ExtractorError::InvalidSelection {
                    selection: String::new(),
                    reason: "select at least one folder or the root files".to_string(),
                });
            }

            let catalog = FolderCatalog::scan(&request.root, policy, scan_depth)?;
            let mut resolved = Vec::with_capacity(folders.len());

            for raw in folders {
                let id = FolderId::parse(raw)?;
                let path = match catalog.path_for(&id) {
                    Some(path) => path.to_path_buf(),
                    None => resolve_uncatalogued(&catalog, &id, policy)?,
                };
                resolved.push(path);
            }

            Ok(ResolvedSelection {
                folders: resolved,
                include_root_files: *include_root_files,
            })
        }
    }
}

fn resolve_uncatalogued(
    catalog: &FolderCatalog,
    id: &FolderId,
    policy: &ExtractionPolicy,
) -> Result<PathBuf> {
    let path = id.to_path(catalog.root());

    if !path.is_dir() {
        return Err(ExtractorError::InvalidSelection {
            selection: id.to_string(),
            reason: "no such folder under the root".to_string(),
        });
    }

    if let Some(excluded) = id.as_str().split('/').find(|s| !policy.should_descend(s)) {
        return Err(ExtractorError::InvalidSelection {
            selection: id.to_string(),
            reason: format!("'{}' is an excluded directory", excluded),
        });
    }

    Ok(path)
}

/// Validates and absolutizes a traversal root.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    let resolved = root.canonicalize().map_err(|_| ExtractorError::InvalidRoot {
        path: root.display().to_string(),
    })?;

    if !resolved.is_dir() {
        return Err(ExtractorError::InvalidRoot {
            path: resolved.display().to_string(),
        });
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src/utils/deep/deeper")).unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("README.md"), "# readme").unwrap();
        temp_dir
    }

    #[test]
    fn test_folder_id_parsing() {
        assert_eq!(FolderId::parse("src/utils").unwrap().as_str(), "src/utils");
        assert_eq!(FolderId::parse("/src/").unwrap().as_str(), "src");
        assert!(FolderId::parse("../etc").is_err());
        assert!(FolderId::parse("").is_err());
        assert_eq!(FolderId::parse("a/b/c").unwrap().depth(), 3);
    }

    #[test]
    fn test_catalog_respects_depth_and_exclusions() {
        let temp_dir = create_tree();
        let policy = ExtractionPolicy::default();

        let catalog = FolderCatalog::scan(temp_dir.path(), &policy, 2).unwrap();
        let ids: Vec<&str> = catalog.iter().map(|(id, _)| id.as_str()).collect();

        assert_eq!(ids, vec!["docs", "src", "src/utils"]);
        assert!(catalog.path_for(&FolderId::parse("node_modules").unwrap()).is_none());
    }

    #[test]
    fn test_everything_mode_selects_top_level() {
        let temp_dir = create_tree();
        let policy = ExtractionPolicy::default();
        let request = SelectionRequest {
            root: temp_dir.path().to_path_buf(),
            mode: SelectionMode::Everything,
        };

        let resolved = resolve_selection(&request, &policy, 3).unwrap();
        let names: Vec<_> = resolved
            .folders
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["docs", "src"]);
        assert!(resolved.include_root_files);
    }

    #[cfg(unix)]
    #[test]
    fn test_everything_mode_skips_symlinked_folders() {
        let temp_dir = create_tree();
        let root = temp_dir.path();
        std::os::unix::fs::symlink(root.join("docs"), root.join("docs_link")).unwrap();
        let policy = ExtractionPolicy::default();
        let request = SelectionRequest {
            root: root.to_path_buf(),
            mode: SelectionMode::Everything,
        };

        let resolved = resolve_selection(&request, &policy, 3).unwrap();
        let names: Vec<_> = resolved
            .folders
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["docs", "src"]);
    }

    #[test]
    fn test_specific_mode_resolves_ids() {
        let temp_dir = create_tree();
        let policy = ExtractionPolicy::default();
        let request = SelectionRequest {
            root: temp_dir.path().to_path_buf(),
            mode: SelectionMode::Specific {
                folders: vec!["src/utils".to_string(), "src/utils/deep/deeper".to_string()],
                include_root_files: false,
            },
        };

        let resolved = resolve_selection(&request, &policy, 2).unwrap();
        assert_eq!(resolved.folders.len(), 2);
        assert!(resolved.folders[1].ends_with("deep/deeper"));
        assert!(!resolved.include_root_files);
    }

    #[test]
    fn test_specific_mode_rejects_unknown_and_excluded() {
        let temp_dir = create_tree();
        let policy = ExtractionPolicy::default();

        for folder in ["missing", "node_modules/pkg"] {
            let request = SelectionRequest {
                root: temp_dir.path().to_path_buf(),
                mode: SelectionMode::Specific {
                    folders: vec![folder.to_string()],
                    include_root_files: false,
                },
            };
            let result = resolve_selection(&request, &policy, 3);
            assert!(
                matches!(result, Err(ExtractorError::InvalidSelection { .. })),
                "{} should be rejected",
                folder
            );
        }
    }

    #[test]
    fn test_empty_specific_selection_is_rejected() {
        let temp_dir = create_tree();
        let request = SelectionRequest {
            root: temp_dir.path().to_path_buf(),
            mode: SelectionMode::Specific {
                folders: vec![],
                include_root_files: false,
            },
        };
        assert!(resolve_selection(&request, &ExtractionPolicy::default(), 3).is_err());
    }

    #[test]
    fn test_invalid_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(matches!(
            resolve_root(&missing),
            Err(ExtractorError::InvalidRoot { .. })
        ));

        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            resolve_root(&file),
            Err(ExtractorError::InvalidRoot { .. })
        ));
    }
}

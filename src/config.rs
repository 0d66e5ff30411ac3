use crate::error::{ExtractorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path};

pub const DEFAULT_OUTPUT_DIR_NAME: &str = "CODEBASE_EXTRACTS";
pub const DEFAULT_MAX_FILE_SIZE_MB: f64 = 1.0;
pub const DEFAULT_SCAN_DEPTH: usize = 3;
pub const FILE_COUNT_WARNING_THRESHOLD: usize = 1000;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub output: OutputConfig,
    pub selection: SelectionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub excluded_dirs: BTreeSet<String>,
    pub excluded_filenames: BTreeSet<String>,
    pub allowed_extensions: BTreeSet<String>,
    pub allowed_filenames: BTreeSet<String>,
    pub exclude_large_files: bool,
    pub max_file_size_mb: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Created inside the traversal root and never traversed itself.
    pub directory_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub scan_depth: usize,
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            excluded_dirs: string_set(&[
                // Version control, dependencies and build output
                "node_modules", "vendor", "__pycache__", "dist", "build", "target", ".next",
                ".git", ".svn", ".hg", ".vscode", ".idea", "venv", ".venv",
                // Flutter and mobile tooling
                ".dart_tool", ".gradle", "Pods", "DerivedData",
            ]),
            excluded_filenames: string_set(&[
                "package-lock.json",
                "yarn.lock",
                "composer.lock",
                ".env",
                "Podfile.lock",
            ]),
            allowed_extensions: string_set(&[
                ".php", ".html", ".css", ".js", ".jsx", ".ts", ".tsx", ".vue", ".svelte",
                ".py", ".rb", ".java", ".c", ".cpp", ".cs", ".go", ".rs", ".json", ".xml",
                ".yaml", ".yml", ".toml", ".ini", ".conf", ".md", ".txt", ".rst", ".twig",
                ".blade", ".handlebars", ".mustache", ".ejs", ".sql", ".graphql", ".gql",
                ".tf", ".dart", ".arb", ".gradle", ".properties", ".plist", ".xcconfig",
                ".sh", ".bat",
            ]),
            allowed_filenames: string_set(&[
                "dockerfile", ".gitignore", ".htaccess", "makefile", ".dockerignore",
                ".env.example", "podfile", "gemfile", "jenkinsfile", "gradlew",
            ]),
            exclude_large_files: true,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory_name: DEFAULT_OUTPUT_DIR_NAME.to_string(),
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            scan_depth: DEFAULT_SCAN_DEPTH,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractorError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ExtractorError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ExtractorError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["codebase-extractor.toml", ".codebase-extractor.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref exclude) = cli_args.exclude_dirs {
            self.policy
                .excluded_dirs
                .extend(exclude.iter().map(|d| d.trim().to_string()).filter(|d| !d.is_empty()));
        }

        if let Some(ref extensions) = cli_args.extensions {
            self.policy.allowed_extensions = extensions
                .iter()
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
        }

        if let Some(exclude_large) = cli_args.exclude_large_files {
            self.policy.exclude_large_files = exclude_large;
        }

        if let Some(max_size) = cli_args.max_file_size_mb {
            self.policy.max_file_size_mb = max_size;
        }

        if let Some(ref output_dir) = cli_args.output_dir_name {
            self.output.directory_name = output_dir.clone();
        }

        if let Some(depth) = cli_args.scan_depth {
            self.selection.scan_depth = depth;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| ExtractorError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| ExtractorError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.policy.max_file_size_mb.is_finite() || self.policy.max_file_size_mb <= 0.0 {
            return Err(ExtractorError::Config {
                message: format!(
                    "Maximum file size must be a positive number of MB (got {})",
                    self.policy.max_file_size_mb
                ),
            });
        }

        if self.policy.allowed_extensions.is_empty() && self.policy.allowed_filenames.is_empty() {
            return Err(ExtractorError::Config {
                message: "At least one allowed extension or filename must be specified"
                    .to_string(),
            });
        }

        if self.selection.scan_depth == 0 {
            return Err(ExtractorError::Config {
                message: "Folder scan depth must be greater than 0".to_string(),
            });
        }

        validate_output_dir_name(&self.output.directory_name)?;

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

/// The output directory must be a single plain segment so it can be matched
/// by name in `excluded_dirs`.
fn validate_output_dir_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ExtractorError::Config {
            message: format!(
                "Output directory must be a single folder name inside the root (got '{}')",
                name
            ),
        }),
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub exclude_dirs: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub exclude_large_files: Option<bool>,
    pub max_file_size_mb: Option<f64>,
    pub output_dir_name: Option<String>,
    pub scan_depth: Option<usize>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exclude_dirs(mut self, exclude: Option<Vec<String>>) -> Self {
        self.exclude_dirs = exclude;
        self
    }

    pub fn with_extensions(mut self, extensions: Option<Vec<String>>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_exclude_large_files(mut self, exclude: Option<bool>) -> Self {
        self.exclude_large_files = exclude;
        self
    }

    pub fn with_max_file_size_mb(mut self, max_size: Option<f64>) -> Self {
        self.max_file_size_mb = max_size;
        self
    }

    pub fn with_output_dir_name(mut self, name: Option<String>) -> Self {
        self.output_dir_name = name;
        self
    }

    pub fn with_scan_depth(mut self, depth: Option<usize>) -> Self {
        self.scan_depth = depth;
        self
    }
}

use crate::error::{ExtractorError, Result};
use crate::extractor::walker::ExtractionResult;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Identity shared by every document written in one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_ref: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new() -> Self {
        Self {
            run_ref: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    /// ISO-8601 UTC timestamp stamped into each document header.
    pub fn run_timestamp(&self) -> String {
        self.started_at.to_rfc3339_opts(SecondsFormat::Micros, false)
    }

    fn short_ref(&self) -> String {
        self.run_ref.simple().to_string()[..8].to_string()
    }
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Fence language for a file extension (including the leading dot,
/// lower-case). Unmapped extensions get an empty tag.
pub fn language_tag(extension: &str) -> &'static str {
    match extension {
        ".js" => "javascript",
        ".jsx" => "jsx",
        ".ts" => "typescript",
        ".tsx" => "tsx",
        ".py" => "python",
        ".html" => "html",
        ".css" => "css",
        ".json" | ".arb" => "json",
        ".md" => "markdown",
        ".sh" => "bash",
        ".yml" | ".yaml" => "yaml",
        ".toml" => "toml",
        ".xml" | ".plist" => "xml",
        ".php" => "php",
        ".rb" => "ruby",
        ".java" => "java",
        ".c" => "c",
        ".cpp" => "cpp",
        ".cs" => "csharp",
        ".go" => "go",
        ".rs" => "rust",
        ".vue" => "vue",
        ".svelte" => "svelte",
        ".sql" => "sql",
        ".graphql" | ".gql" => "graphql",
        ".dart" => "dart",
        ".gradle" => "groovy",
        ".xcconfig" | ".properties" => "properties",
        ".bat" => "batch",
        _ => "",
    }
}

/// Language tag for a file path, derived from its lower-cased extension.
pub fn language_tag_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| language_tag(&format!(".{}", e.to_lowercase())))
        .unwrap_or("")
}

/// One labeled block: the relative path as a heading and the content in a
/// fence long enough not to be closed by backticks inside the content.
pub fn render_file_section(relative_path: &str, language: &str, content: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(content).max(2) + 1);
    let mut section = String::with_capacity(content.len() + relative_path.len() + 32);

    section.push_str("## `");
    section.push_str(relative_path);
    section.push_str("`\n\n");
    section.push_str(&fence);
    section.push_str(language);
    section.push('\n');
    section.push_str(content);
    if !content.ends_with('\n') {
        section.push('\n');
    }
    section.push_str(&fence);
    section.push_str("\n\n");

    section
}

fn longest_backtick_run(content: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in content.chars() {
        if ch == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Renders unit documents and writes them into the output directory.
pub struct MarkdownAggregator {
    output_dir: PathBuf,
    dry_run: bool,
}

impl MarkdownAggregator {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn render(&self, result: &ExtractionResult, metadata: &RunMetadata, unit_name: &str) -> String {
        let mut document = String::with_capacity(result.markdown_body.len() + 512);

        document.push_str("---\n");
        document.push_str(&format!("run_ref: {}\n", metadata.run_ref));
        document.push_str(&format!("run_timestamp: {}\n", metadata.run_timestamp()));
        document.push_str(&format!("folder_name: {}\n", yaml_string(unit_name)));
        document.push_str(&format!("file_count: {}\n", result.file_count));
        document.push_str(&format!("char_count: {}\n", result.char_count));
        document.push_str(&format!("word_count: {}\n", result.word_count));
        document.push_str("---\n\n");
        document.push_str(&format!("# Codebase extract: {}\n\n", unit_name));
        document.push_str(&result.markdown_body);

        document
    }

    /// Renders and writes one unit's document. Returns the path it was (or,
    /// in dry-run mode, would have been) written to.
    ///
    /// The document goes to a temporary file in the output directory first
    /// and is moved into place only once complete, so a unit is either fully
    /// written or absent.
    pub fn write_unit(
        &self,
        result: &ExtractionResult,
        metadata: &RunMetadata,
        unit_name: &str,
        file_stem: &str,
    ) -> Result<PathBuf> {
        let document = self.render(result, metadata, unit_name);
        let base_name = output_file_name(file_stem, metadata);

        if self.dry_run {
            tracing::debug!(
                "Dry run: skipped writing {} ({} bytes)",
                base_name,
                document.len()
            );
            return Ok(self.output_dir.join(base_name));
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| ExtractorError::OutputWrite {
            path: self.output_dir.display().to_string(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(&self.output_dir).map_err(|source| {
            ExtractorError::OutputWrite {
                path: self.output_dir.display().to_string(),
                source,
            }
        })?;

        temp.write_all(document.as_bytes())
            .and_then(|_| temp.flush())
            .map_err(|source| ExtractorError::OutputWrite {
                path: temp.path().display().to_string(),
                source,
            })?;

        self.persist_unique(temp, &base_name)
    }

    fn persist_unique(&self, mut temp: NamedTempFile, base_name: &str) -> Result<PathBuf> {
        let stem = base_name.trim_end_matches(".md");
        let mut attempt = 1;

        loop {
            let candidate = if attempt == 1 {
                self.output_dir.join(base_name)
            } else {
                self.output_dir.join(format!("{}_{}.md", stem, attempt))
            };

            match temp.persist_noclobber(&candidate) {
                Ok(_) => return Ok(candidate),
                Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                    temp = err.file;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(ExtractorError::OutputWrite {
                        path: candidate.display().to_string(),
                        source: err.error,
                    })
                }
            }
        }
    }
}

/// `<stem>_<UTC timestamp>_<run ref prefix>.md`
pub fn output_file_name(file_stem: &str, metadata: &RunMetadata) -> String {
    format!(
        "{}_{}_{}.md",
        sanitize_file_stem(file_stem),
        metadata.started_at.format("%Y%m%d_%H%M%S"),
        metadata.short_ref()
    )
}

pub fn sanitize_file_stem(name: &str) -> String {
    let mut sanitized = String::new();

    for ch in name.chars() {
        match ch {
            '/' | '\\' => sanitized.push_str("__"),
            c if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' => sanitized.push(c),
            _ => sanitized.push('_'),
        }
    }

    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_');

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else if sanitized.chars().count() > 100 {
        sanitized.chars().take(100).collect()
    } else {
        sanitized.to_string()
    }
}

fn yaml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

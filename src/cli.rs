use crate::config::{CliOverrides, Config};
use crate::error::{ExtractorError, Result};
use crate::scanner::selection::SelectionMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "codebase-extractor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bundle the text files of a codebase into Markdown documents")]
#[command(
    long_about = "Walks selected folders of a project, keeps the files that pass the \
                  extension, name, folder and size filters, and writes one Markdown \
                  document per folder with every file in a fenced code block."
)]
#[command(after_help = "EXAMPLES:\n  \
    codebase-extractor\n  \
    codebase-extractor ~/src/app --list-folders\n  \
    codebase-extractor ~/src/app --select src,docs --select-root\n  \
    codebase-extractor . --select src/api --include-large-files --dry-run\n  \
    codebase-extractor . --max-size 512KB --exclude fixtures,snapshots")]
pub struct Cli {
    /// Root directory to extract from
    #[arg(default_value = ".")]
    pub root: PathBuf,

    /// Which folders to extract (defaults to `specific` when --select or --select-root is given)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Folder ids to extract, as shown by --list-folders (comma-separated or repeated)
    #[arg(short, long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Also extract the files directly inside the root folder
    #[arg(long)]
    pub select_root: bool,

    /// Skip files at or above the size limit
    #[arg(long, conflicts_with = "include_large_files")]
    pub exclude_large_files: bool,

    /// Keep files regardless of size
    #[arg(long)]
    pub include_large_files: bool,

    /// Size limit, in MB unless a unit is given (e.g. 2, 0.5, 512KB)
    #[arg(long, value_parser = parse_size_mb)]
    pub max_size: Option<f64>,

    /// Additional folder names to skip at any depth
    #[arg(short, long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Replace the allowed file extensions (e.g. .rs,.toml,.md)
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Name of the output folder created inside the root
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// How many folder levels --list-folders and --select look at
    #[arg(long)]
    pub depth: Option<usize>,

    /// Configuration file path
    #[arg(short, long, env = "CODEBASE_EXTRACTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Compute everything without writing any file
    #[arg(long)]
    pub dry_run: bool,

    /// List the folders that can be selected and exit
    #[arg(long)]
    pub list_folders: bool,

    /// Write a sample configuration file (to --config or codebase-extractor.toml) and exit
    #[arg(long)]
    pub generate_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Every top-level folder plus the root files
    Everything,
    /// Only the folders named with --select
    Specific,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON formatted output
    Json,
    /// Plain text output
    Plain,
}

impl Cli {
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load_with_defaults(self.config.as_ref())?;

        let overrides = self.create_cli_overrides();
        config.merge_with_cli_args(&overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn create_cli_overrides(&self) -> CliOverrides {
        let exclude_large_files = if self.include_large_files {
            Some(false)
        } else if self.exclude_large_files {
            Some(true)
        } else {
            None
        };

        CliOverrides::new()
            .with_exclude_dirs(self.exclude.clone())
            .with_extensions(self.extensions.clone())
            .with_exclude_large_files(exclude_large_files)
            .with_max_file_size_mb(self.max_size)
            .with_output_dir_name(self.output_dir.clone())
            .with_scan_depth(self.depth)
    }

    pub fn selection_mode(&self) -> Result<SelectionMode> {
        let has_selection = !self.select.is_empty() || self.select_root;

        match self.mode {
            Some(ModeArg::Everything) if has_selection => Err(ExtractorError::InvalidSelection {
                selection: self.select.join(","),
                reason: "--select and --select-root cannot be combined with --mode everything"
                    .to_string(),
            }),
            Some(ModeArg::Everything) => Ok(SelectionMode::Everything),
            None if !has_selection => Ok(SelectionMode::Everything),
            Some(ModeArg::Specific) | None => Ok(SelectionMode::Specific {
                folders: self
                    .select
                    .iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                include_root_files: self.select_root,
            }),
        }
    }

    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}

/// Parses a size into MB. Bare numbers are MB; `B`, `KB`, `MB` and `GB`
/// suffixes are accepted in any case.
pub fn parse_size_mb(s: &str) -> std::result::Result<f64, String> {
    let s = s.trim().to_lowercase();

    let (number_str, to_mb) = if let Some(n) = s.strip_suffix("kb").or_else(|| s.strip_suffix('k')) {
        (n, 1.0 / 1024.0)
    } else if let Some(n) = s.strip_suffix("mb").or_else(|| s.strip_suffix('m')) {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix("gb").or_else(|| s.strip_suffix('g')) {
        (n, 1024.0)
    } else if let Some(n) = s.strip_suffix('b') {
        (n, 1.0 / (1024.0 * 1024.0))
    } else {
        (s.as_str(), 1.0)
    };

    let number: f64 = number_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number format: {}", number_str))?;

    if !number.is_finite() || number <= 0.0 {
        return Err("Size must be a positive number".to_string());
    }

    Ok(number * to_mb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["codebase-extractor"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.selection_mode().unwrap(), SelectionMode::Everything);
        assert_eq!(cli.verbosity_level(), 0);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_select_implies_specific_mode() {
        let cli = parse(&["proj", "--select", "src,docs", "-s", "api"]);
        assert_eq!(
            cli.selection_mode().unwrap(),
            SelectionMode::Specific {
                folders: vec!["src".to_string(), "docs".to_string(), "api".to_string()],
                include_root_files: false,
            }
        );

        let cli = parse(&["--select-root"]);
        assert_eq!(
            cli.selection_mode().unwrap(),
            SelectionMode::Specific {
                folders: vec![],
                include_root_files: true,
            }
        );
    }

    #[test]
    fn test_everything_mode_rejects_selection() {
        let cli = parse(&["--mode", "everything", "--select", "src"]);
        assert!(matches!(
            cli.selection_mode(),
            Err(ExtractorError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_large_file_flags() {
        assert_eq!(parse(&[]).create_cli_overrides().exclude_large_files, None);
        assert_eq!(
            parse(&["--include-large-files"])
                .create_cli_overrides()
                .exclude_large_files,
            Some(false)
        );
        assert_eq!(
            parse(&["--exclude-large-files"])
                .create_cli_overrides()
                .exclude_large_files,
            Some(true)
        );
        assert!(Cli::try_parse_from([
            "codebase-extractor",
            "--include-large-files",
            "--exclude-large-files"
        ])
        .is_err());
    }

    #[test]
    fn test_overrides_from_flags() {
        let cli = parse(&[
            "--max-size",
            "2.5",
            "--exclude",
            "fixtures,tmp",
            "--output-dir",
            "dumps",
            "--depth",
            "5",
        ]);
        let overrides = cli.create_cli_overrides();

        assert_eq!(overrides.max_file_size_mb, Some(2.5));
        assert_eq!(
            overrides.exclude_dirs,
            Some(vec!["fixtures".to_string(), "tmp".to_string()])
        );
        assert_eq!(overrides.output_dir_name.as_deref(), Some("dumps"));
        assert_eq!(overrides.scan_depth, Some(5));
    }

    #[test]
    fn test_parse_size_mb() {
        assert_eq!(parse_size_mb("1").unwrap(), 1.0);
        assert_eq!(parse_size_mb("0.5").unwrap(), 0.5);
        assert_eq!(parse_size_mb("512KB").unwrap(), 0.5);
        assert_eq!(parse_size_mb("2mb").unwrap(), 2.0);
        assert_eq!(parse_size_mb("1GB").unwrap(), 1024.0);
        assert_eq!(parse_size_mb("1048576b").unwrap(), 1.0);

        assert!(parse_size_mb("invalid").is_err());
        assert!(parse_size_mb("-5MB").is_err());
        assert!(parse_size_mb("0").is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["codebase-extractor", "-q", "-v"]).is_err());
    }
}

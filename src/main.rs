use clap::Parser;
use codebase_extractor::{
    BatchSummary, Cli, CodebaseExtractor, ExtractorError, OutputFormatter, OutputMode,
    UserFriendlyError,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_PARTIAL_FAILURE: i32 = 2;
const EXIT_CONFIG_ERROR: i32 = 3;
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let exit_code = run();
    process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();
    setup_logging(cli.verbosity_level(), cli.quiet);

    if cli.generate_config {
        return handle_generate_config(&cli);
    }

    let extractor = match CodebaseExtractor::from_cli(&cli) {
        Ok(extractor) => extractor,
        Err(e) => {
            print_startup_error(&e, &cli);
            return error_exit_code(&e);
        }
    };

    if cli.list_folders {
        return match extractor.list_folders() {
            Ok(catalog) => {
                extractor.output_formatter().print_folder_catalog(&catalog);
                EXIT_SUCCESS
            }
            Err(e) => {
                extractor.handle_error(&e);
                error_exit_code(&e)
            }
        };
    }

    let mode = match cli.selection_mode() {
        Ok(mode) => mode,
        Err(e) => {
            extractor.handle_error(&e);
            return error_exit_code(&e);
        }
    };

    match extractor.run(mode, cli.dry_run) {
        Ok(summary) => summary_exit_code(&summary),
        Err(e) => {
            extractor.handle_error(&e);
            error_exit_code(&e)
        }
    }
}

fn summary_exit_code(summary: &BatchSummary) -> i32 {
    if summary.cancelled {
        EXIT_INTERRUPTED
    } else if summary.has_failures() {
        EXIT_PARTIAL_FAILURE
    } else {
        // No matching files is still a successful run.
        EXIT_SUCCESS
    }
}

fn error_exit_code(error: &ExtractorError) -> i32 {
    match error {
        ExtractorError::Cancelled => EXIT_INTERRUPTED,
        e if e.is_configuration_error() => EXIT_CONFIG_ERROR,
        _ => EXIT_FAILURE,
    }
}

fn handle_generate_config(cli: &Cli) -> i32 {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("codebase-extractor.toml"));

    match CodebaseExtractor::generate_sample_config(&config_path) {
        Ok(()) => {
            println!(
                "Generated sample configuration file: {}",
                config_path.display()
            );
            println!("\nTo use this configuration:");
            println!(
                "  codebase-extractor <root> --config {}",
                config_path.display()
            );
            println!("\nA codebase-extractor.toml in the current directory is picked up automatically.");
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!(
                "Failed to generate configuration file: {}",
                e.user_message()
            );
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            EXIT_FAILURE
        }
    }
}

fn print_startup_error(error: &ExtractorError, cli: &Cli) {
    let mode = match cli.output_format {
        codebase_extractor::OutputFormat::Json => OutputMode::Json,
        codebase_extractor::OutputFormat::Plain => OutputMode::Plain,
        codebase_extractor::OutputFormat::Human => OutputMode::Human,
    };
    let formatter = OutputFormatter::new(mode, 0, false);
    formatter.print_user_friendly_error(error);
}

/// Diagnostics go to stderr so they never mix with JSON on stdout.
/// `RUST_LOG` wins over the verbosity flags.
fn setup_logging(verbosity: u8, quiet: bool) {
    let default_filter = match (quiet, verbosity) {
        (true, _) => "codebase_extractor=error",
        (false, 0) => "codebase_extractor=warn",
        (false, 1) => "codebase_extractor=info",
        (false, _) => "codebase_extractor=debug",
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use codebase_extractor::{BatchProgress, RunMetadata};
    use std::fs;
    use tempfile::TempDir;

    fn summary(cancelled: bool, failed_units: usize) -> BatchSummary {
        let metadata = RunMetadata::new();
        BatchSummary {
            run_ref: metadata.run_ref,
            run_timestamp: metadata.run_timestamp(),
            output_dir: PathBuf::from("out"),
            dry_run: false,
            cancelled,
            progress: BatchProgress::new(2),
            total_files: 0,
            total_chars: 0,
            total_words: 0,
            empty_units: 0,
            failed_units,
            skipped_undecodable: 0,
            skipped_unreadable: 0,
            units: Vec::new(),
        }
    }

    #[test]
    fn test_generate_config_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let cli = Cli::try_parse_from([
            "codebase-extractor",
            "--generate-config",
            "--config",
            config_path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(handle_generate_config(&cli), EXIT_SUCCESS);
        let content = fs::read_to_string(&config_path).unwrap();
        assert!(content.contains("[policy]"));
    }

    #[test]
    fn test_summary_exit_codes() {
        assert_eq!(summary_exit_code(&summary(false, 0)), EXIT_SUCCESS);
        assert_eq!(summary_exit_code(&summary(false, 1)), EXIT_PARTIAL_FAILURE);
        assert_eq!(summary_exit_code(&summary(true, 1)), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(error_exit_code(&ExtractorError::Cancelled), EXIT_INTERRUPTED);
        assert_eq!(
            error_exit_code(&ExtractorError::InvalidRoot {
                path: "x".to_string()
            }),
            EXIT_CONFIG_ERROR
        );
        assert_eq!(
            error_exit_code(&ExtractorError::Permission {
                path: "x".to_string()
            }),
            EXIT_FAILURE
        );
    }
}

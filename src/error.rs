use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid root directory: {path}")]
    InvalidRoot { path: String },

    #[error("Invalid selection '{selection}': {reason}")]
    InvalidSelection { selection: String, reason: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Permission denied: {path}")]
    Permission { path: String },

    #[error("Failed to walk {path}: {message}")]
    Walk { path: String, message: String },

    #[error("Failed to write output file {path}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation was cancelled by user")]
    Cancelled,
}

impl ExtractorError {
    /// Errors that stop a batch before any unit runs.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ExtractorError::InvalidRoot { .. }
                | ExtractorError::InvalidSelection { .. }
                | ExtractorError::Config { .. }
        )
    }
}

pub trait UserFriendlyError {
    fn user_message(&self) -> String;
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for ExtractorError {
    fn user_message(&self) -> String {
        match self {
            ExtractorError::InvalidRoot { path } => {
                format!("The provided root path is not a valid directory: {}", path)
            }
            ExtractorError::InvalidSelection { selection, reason } => {
                format!("Cannot use selection '{}': {}", selection, reason)
            }
            ExtractorError::Config { message } => {
                format!("Configuration error: {}", message)
            }
            ExtractorError::Permission { path } => {
                format!("Permission denied accessing: {}", path)
            }
            ExtractorError::Walk { path, message } => {
                format!("Could not read folder {}: {}", path, message)
            }
            ExtractorError::OutputWrite { path, source } => {
                format!("Could not write {}: {}", path, source)
            }
            ExtractorError::Cancelled => "Extraction aborted by user".to_string(),
            _ => self.to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            ExtractorError::InvalidRoot { .. } => Some(
                "Pass an existing directory as the root argument (defaults to the current directory).".to_string()
            ),
            ExtractorError::InvalidSelection { .. } => Some(
                "Run with --list-folders to see the folder ids that can be selected.".to_string()
            ),
            ExtractorError::Config { .. } => Some(
                "Check your configuration file syntax and values, or regenerate one with --generate-config.".to_string()
            ),
            ExtractorError::Permission { .. } => Some(
                "Ensure you have read permission for the selected folders and write permission for the output directory.".to_string()
            ),
            ExtractorError::OutputWrite { .. } => Some(
                "Check free disk space and write permissions for the output directory.".to_string()
            ),
            _ => None,
        }
    }
}

impl From<walkdir::Error> for ExtractorError {
    fn from(error: walkdir::Error) -> Self {
        let path = error
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        if error
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied)
        {
            return ExtractorError::Permission { path };
        }

        ExtractorError::Walk {
            path,
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;

pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

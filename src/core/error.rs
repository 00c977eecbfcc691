//! Error handling for the OTA updater
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** so callers can tell a transport failure from a
//!    protocol rejection or a filesystem problem
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Transport**: [`OtaError::TransportFailed`], [`OtaError::HttpStatus`], [`OtaError::EmptyBody`]
//! - **Protocol / integrity**: [`OtaError::InvalidResponse`], [`OtaError::SignedUrlMismatch`]
//! - **Archive**: [`OtaError::NotAnArchive`], [`OtaError::ArchiveError`], [`OtaError::UnsafeArchiveEntry`]
//! - **File system**: [`OtaError::FileSystemError`], [`OtaError::Io`]
//! - **Configuration**: [`OtaError::ConfigError`], [`OtaError::NotConfigured`], [`OtaError::InvalidAppVersion`]
//! - **Concurrency**: [`OtaError::UpdateInProgress`]
//! - **Anything else**: [`OtaError::Other`]
//!
//! Resolution misses are deliberately absent: the resolver fails open to the
//! built-in bundle instead of returning an error.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ota_updater::core::{OtaError, user_friendly_error};
//!
//! let err = OtaError::UpdateInProgress { root: "/data/ota".to_string() };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Result type for the pipelines that surface [`OtaError`] verbatim.
pub type OtaResult<T> = std::result::Result<T, OtaError>;

/// The main error type for OTA operations.
#[derive(Error, Debug)]
pub enum OtaError {
    /// The connection could not be established or broke mid-stream.
    #[error("Transport error while fetching {url}: {reason}")]
    TransportFailed {
        /// URL being fetched
        url: String,
        /// Underlying transport message
        reason: String,
    },

    /// The server answered with a non-success status code.
    #[error("Server returned HTTP {status} for {url}")]
    HttpStatus {
        /// URL being fetched
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response carried no body.
    #[error("Empty response body from {url}")]
    EmptyBody {
        /// URL being fetched
        url: String,
    },

    /// The update-check response was malformed or missing required fields.
    #[error("Invalid update-check response: {reason}")]
    InvalidResponse {
        /// What was wrong with the response
        reason: String,
    },

    /// The signed URL does not reference the advertised file name.
    ///
    /// This is a substring containment check only. It catches server-side
    /// mix-ups, not tampering.
    #[error("Signed URL does not contain file name '{filename}'")]
    SignedUrlMismatch {
        /// The signed download URL
        signed_url: String,
        /// The advertised bundle file name
        filename: String,
    },

    /// An archive entry would be written outside the destination directory.
    #[error("Archive entry escapes the destination directory: {entry}")]
    UnsafeArchiveEntry {
        /// Raw entry path as stored in the archive
        entry: String,
    },

    /// The downloaded payload does not start with a ZIP header.
    #[error("Downloaded payload is not a ZIP archive: {path}")]
    NotAnArchive {
        /// Staged download path
        path: String,
    },

    /// The archive could not be opened or an entry could not be read.
    #[error("Failed to read archive {path}: {reason}")]
    ArchiveError {
        /// Archive path
        path: String,
        /// Reason reported by the archive reader
        reason: String,
    },

    /// A file system operation failed.
    #[error("File system error: {operation} ({path})")]
    FileSystemError {
        /// The operation that failed (e.g. "create directory")
        operation: String,
        /// Path involved in the failure
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Another update cycle holds the root namespace lock.
    #[error("An update is already in progress for {root}")]
    UpdateInProgress {
        /// Root namespace being updated
        root: String,
    },

    /// The configuration file is unreadable or invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// A required setting was never provided.
    #[error("Missing configuration: {setting}")]
    NotConfigured {
        /// Name of the missing setting
        setting: String,
    },

    /// The host app version cannot be used as a version directory name.
    #[error("Invalid app version '{version}': {reason}")]
    InvalidAppVersion {
        /// The rejected version string
        version: String,
        /// Why it was rejected
        reason: String,
    },

    /// IO error
    /// A failure outside the typed categories, rendered as its message.
    #[error("{message}")]
    Other {
        /// Outermost message of the failure
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OtaError {
    /// Builds a [`OtaError::FileSystemError`] for `path`.
    pub fn fs(operation: impl Into<String>, path: &Path, source: std::io::Error) -> Self {
        Self::FileSystemError {
            operation: operation.into(),
            path: path.display().to_string(),
            source,
        }
    }

    /// Whether the failure happened on the network side of a download.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::TransportFailed { .. } | Self::HttpStatus { .. } | Self::EmptyBody { .. }
        )
    }

    /// Whether the failure is a protocol/integrity rejection raised before any download.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::InvalidResponse { .. } | Self::SignedUrlMismatch { .. })
    }
}

/// Error wrapper carrying a suggestion and details for terminal display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: OtaError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: OtaError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colored labels.
    pub fn display(&self) {
        for (section, text) in self.sections() {
            eprintln!("{}: {}", section.paint(), text);
        }
    }

    /// The error line, then details and suggestion when present.
    fn sections(&self) -> Vec<(Section, String)> {
        let mut sections = vec![(Section::Error, self.error.to_string())];
        sections.extend(self.details.iter().map(|d| (Section::Details, d.clone())));
        sections.extend(self.suggestion.iter().map(|s| (Section::Suggestion, s.clone())));
        sections
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Error,
    Details,
    Suggestion,
}

impl Section {
    const fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Details => "details",
            Self::Suggestion => "suggestion",
        }
    }

    fn paint(self) -> colored::ColoredString {
        match self {
            Self::Error => self.label().red().bold(),
            Self::Details => self.label().yellow(),
            Self::Suggestion => self.label().green(),
        }
    }
}

/// Same layout as [`ErrorContext::display`], without colors.
impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .sections()
            .into_iter()
            .map(|(section, text)| format!("{}: {text}", section.label()))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions for the CLI.
///
/// Typed [`OtaError`]s (even when wrapped in `anyhow` context) keep their
/// variant; bare I/O errors are mapped by kind; anything else becomes
/// [`OtaError::Other`] carrying the full context chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = format!("{error:#}");

    let error = match error.downcast::<OtaError>() {
        Ok(ota_error) => return create_error_context(ota_error, chain),
        Err(other) => other,
    };

    match error.downcast::<std::io::Error>() {
        Ok(io_error) => match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorContext::new(OtaError::Io(io_error))
                .with_suggestion("Check ownership and permissions of the OTA root directory")
                .with_details(chain),
            std::io::ErrorKind::NotFound => ErrorContext::new(OtaError::Io(io_error))
                .with_suggestion("Check that the file or directory exists and the path is correct")
                .with_details(chain),
            _ => ErrorContext::new(OtaError::Io(io_error)).with_details(chain),
        },
        Err(other) => {
            let ctx = ErrorContext::new(OtaError::Other {
                message: other.to_string(),
            });
            // A bare message has no chain beyond itself.
            if chain == other.to_string() { ctx } else { ctx.with_details(chain) }
        }
    }
}

fn create_error_context(error: OtaError, chain: String) -> ErrorContext {
    let suggestion = match &error {
        OtaError::TransportFailed { .. } => "Check your network connection and retry the update",
        OtaError::HttpStatus { status, .. } if *status == 401 || *status == 403 => {
            "Check the configured api_key"
        }
        OtaError::HttpStatus { .. } | OtaError::EmptyBody { .. } => {
            "The update server is unhealthy; retry later"
        }
        OtaError::InvalidResponse { .. } | OtaError::SignedUrlMismatch { .. } => {
            "The update server returned an unexpected response; nothing was downloaded"
        }
        OtaError::NotAnArchive { .. }
        | OtaError::ArchiveError { .. }
        | OtaError::UnsafeArchiveEntry { .. } => {
            "The published bundle is not a valid ZIP archive; republish it"
        }
        OtaError::FileSystemError { .. } | OtaError::Io(_) => {
            "Check free disk space and permissions of the OTA root directory"
        }
        OtaError::UpdateInProgress { .. } => {
            "Wait for the running update to finish before starting another"
        }
        OtaError::NotConfigured { setting } if setting.starts_with("app version") => {
            "Pass the host application's version string, e.g. --app-version 1.2.0"
        }
        OtaError::NotConfigured { .. } => "Set update_check_url in the config file or pass --url",
        OtaError::ConfigError { .. } => "Check the syntax and values of the config file",
        OtaError::InvalidAppVersion { .. } => {
            "Pass the host application's version string, e.g. --app-version 1.2.0"
        }
        OtaError::Other { .. } => "Re-run with --verbose for more detail",
    };

    ErrorContext::new(error).with_suggestion(suggestion).with_details(chain)
}

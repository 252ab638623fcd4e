//! Error types for govis-build.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for govis-build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that can occur while reading project configuration.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Failed to read a configuration file.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse govis.toml: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Malformed `go.mod` line.
    #[error("go.mod:{line}: {message}")]
    GoMod { line: usize, message: String },

    /// `go.mod` without a `module` directive.
    #[error("go.mod has no module directive")]
    MissingModule,

    /// Configuration validation error.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

//! Error types for the shroud-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for different failure modes.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shroud operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all shroud operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Source file could not be parsed
    #[error("failed to parse '{path}' at byte {offset}: {details}")]
    Parse {
        /// Path to the source file
        path: PathBuf,
        /// Byte offset of the failure
        offset: usize,
        /// Description of what was expected
        details: String,
    },

    /// Project module metadata is missing or unreadable
    #[error("no module declaration found under '{path}'")]
    MissingModule {
        /// Project directory that was searched
        path: PathBuf,
    },

    /// Executable container format was not recognized
    #[error("unsupported binary format: {details}")]
    UnsupportedFormat {
        /// Description of the leading bytes
        details: String,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new parse error
    pub fn parse(path: impl Into<PathBuf>, offset: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            offset,
            details: details.into(),
        }
    }

    /// Creates a new missing-module error
    pub fn missing_module(path: impl Into<PathBuf>) -> Self {
        Self::MissingModule { path: path.into() }
    }

    /// Creates a new unsupported-format error
    pub fn unsupported_format(details: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            details: details.into(),
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a recoverable error that should be skipped
    ///
    /// A parse failure excludes one file from the rename universe; a missing
    /// module degrades discovery to a default replacement table. Neither
    /// aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::MissingModule { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::parse("/tmp/broken.go", 42, "expected '}'");
        assert!(err.to_string().contains("broken.go"));
        assert!(err.to_string().contains("byte 42"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::parse("/x.go", 0, "eof").is_recoverable());
        assert!(Error::missing_module("/proj").is_recoverable());
        assert!(!Error::unsupported_format("4-byte header").is_recoverable());
    }
}

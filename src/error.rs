//! Error types for license resolution

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for license operations
pub type Result<T> = std::result::Result<T, LicenseError>;

/// Main error type for license operations
///
/// Policy violations (forbidden licenses, missing licenses, unlisted
/// dependencies) are never errors: they are reported through
/// [`crate::ThirdPartyReport`] and judged by [`crate::FailurePolicy`].
#[derive(Error, Debug)]
pub enum LicenseError {
    #[error("Invalid allow-list coordinate '{coordinate}': expected groupId:artifactId[:version], found {tokens} token(s)")]
    InvalidCoordinate { coordinate: String, tokens: usize },

    #[error("IO error on {}: {source}", path.display())]
    FileError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed third-party descriptor {location}: {message}")]
    DescriptorError { location: String, message: String },

    #[error("Failed to fetch {url}: {message}")]
    FetchError { url: String, message: String },

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cargo metadata error: {0}")]
    CargoMetadataError(#[from] cargo_metadata::Error),

    #[error("Unable to resolve dependency {id}: {message}")]
    ResolutionError { id: String, message: String },

    #[error("Failed to parse dependency graph: {0}")]
    ParseError(String),
}

impl LicenseError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Wrap an I/O error with the path it happened on
    pub fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileError {
            path: path.into(),
            source,
        }
    }

    /// Create a descriptor error
    pub fn descriptor(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DescriptorError {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchError {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a resolution error for a dependency id
    pub fn resolution(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResolutionError {
            id: id.into(),
            message: message.into(),
        }
    }
}

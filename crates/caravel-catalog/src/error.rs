use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Stable classification of catalog failures.
///
/// The engine switches on this, never on remote message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    NotFound,
    AlreadyExists,
    Unauthorized,
    Unsupported,
    Transport,
    Protocol,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog source \"{source_value}\"")]
    InvalidSource {
        source_value: String,
        #[source]
        source: url::ParseError,
    },
    #[error(
        "unsupported catalog source scheme \"{scheme}\"; expected http(s)://, file://, or a path"
    )]
    UnsupportedSourceScheme { scheme: String },
    #[error("catalog source \"{source_value}\" is not a usable local path")]
    SourceNotAPath { source_value: String },
    #[error("catalog request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("catalog response from {url} could not be decoded")]
    DecodeResponse {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("catalog returned an empty response for {operation}")]
    MissingData { operation: &'static str },
    #[error("catalog rejected {operation}: {message}")]
    Remote {
        operation: &'static str,
        message: String,
        kind: CatalogErrorKind,
    },
    #[error("failed to read catalog snapshot {path}")]
    SnapshotRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode catalog snapshot {path}")]
    SnapshotDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{operation} is not supported by a snapshot catalog")]
    SnapshotUnsupported { operation: &'static str },
}

impl CatalogError {
    #[must_use]
    pub const fn kind(&self) -> CatalogErrorKind {
        match self {
            Self::Transport { .. } => CatalogErrorKind::Transport,
            Self::Remote { kind, .. } => *kind,
            Self::SnapshotUnsupported { .. } => CatalogErrorKind::Unsupported,
            Self::InvalidSource { .. }
            | Self::UnsupportedSourceScheme { .. }
            | Self::SourceNotAPath { .. }
            | Self::DecodeResponse { .. }
            | Self::MissingData { .. }
            | Self::SnapshotRead { .. }
            | Self::SnapshotDecode { .. } => CatalogErrorKind::Protocol,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no client configuration found (looked for {path})")]
    Missing { path: PathBuf },
    #[error("no configuration directory available on this host")]
    NoConfigDir,
    #[error("failed to read client configuration {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse client configuration {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

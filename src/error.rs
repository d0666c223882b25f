//! Error Types
//!
//! Fatal errors raised while decoding, loading or encoding a workflow
//! document. Semantic problems found after a successful decode are not
//! errors in this sense: they are reported as [`Violation`]s by the
//! validator.
//!
//! [`Violation`]: crate::validator::Violation

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning raw bytes into a typed [`Workflow`].
///
/// Decoding is all-or-nothing: any of these aborts the decode call and no
/// partially-built document is returned.
///
/// [`Workflow`]: crate::model::Workflow
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The input (or a fetched resource) is not well-formed JSON/YAML.
    #[error("{path} has a syntax error {fragment:?}: {message}")]
    Syntax {
        path: String,
        fragment: String,
        message: String,
    },

    /// A field holds a value of a legal shape but with mistyped content.
    #[error("{path}: {detail}")]
    TypeMismatch { path: String, detail: String },

    /// A field holds a value outside its accepted shape set.
    #[error("{path} must be {accepted}")]
    UnsupportedShape { path: String, accepted: String },

    /// A tagged union discriminator names no known variant.
    #[error("{path} value {value:?} is not supported, it must be one of {accepted}")]
    UnknownVariant {
        path: String,
        value: String,
        accepted: String,
    },

    /// An external resource could not be fetched or had an invalid layout.
    #[error("{path} references {uri:?}: {source}")]
    Resource {
        path: String,
        uri: String,
        #[source]
        source: LoadError,
    },

    /// An include path handed to the decoder was rejected.
    #[error("include path {0:?} must be absolute")]
    IncludePath(PathBuf),
}

impl DecodeError {
    /// Returns the field path the error refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Syntax { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::UnsupportedShape { path, .. }
            | Self::UnknownVariant { path, .. }
            | Self::Resource { path, .. } => Some(path),
            Self::IncludePath(_) => None,
        }
    }
}

/// Errors raised by a [`ResourceLoader`] while fetching a referenced file.
///
/// [`ResourceLoader`]: crate::decode::loader::ResourceLoader
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file not found in any of {searched:?}")]
    NotFound { searched: Vec<PathBuf> },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unsupported URI scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("invalid external resource definition: {0}")]
    InvalidResource(String),
}

/// Errors raised while re-serialising a workflow.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to encode workflow as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode workflow as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Any error raised by the library's fallible entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

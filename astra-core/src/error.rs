//! Error types for the AStRA core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error for callers that drive a whole run.
#[derive(Debug, Error)]
pub enum AstraError {
    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<Box<figment::Error>> for AstraError {
    fn from(err: Box<figment::Error>) -> Self {
        AstraError::Config(err.to_string())
    }
}

/// Fatal failures raised by the format extractors.
///
/// Anything that reaches the caller aborts the run; recoverable conditions
/// (unparsable lines, unresolvable insert blobs) never surface here.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to clone '{url}': {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },
    #[error("repository has no '{0}' remote URL")]
    MissingRemote(String),
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from decoding an ASCII-armored OpenPGP signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no armored signature block found")]
    MissingArmor,
    #[error("armor body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("packet stream truncated at offset {0}")]
    Truncated(usize),
    #[error("malformed packet header at offset {0}")]
    BadHeader(usize),
    #[error("partial body lengths are not supported")]
    PartialLength,
    #[error("no signature packet present")]
    NoSignature,
}

/// Unknown input format name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown format: {0} (expected git, in-toto, slsa or buildinfo)")]
pub struct FormatError(pub String);

use thiserror::Error;

use crate::location::Path;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: Path, reason: &'static str },
    #[error("normalization did not converge after {iterations} steps")]
    NormalizeDidNotConverge { iterations: usize },
    #[error("editor factory must be frozen before an editor is built")]
    FactoryNotFrozen,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl EditorError {
    pub(crate) fn invalid_path(path: &[usize], reason: &'static str) -> Self {
        EditorError::InvalidPath {
            path: path.to_vec(),
            reason,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("{0} is frozen and can no longer be configured")]
    Frozen(&'static str),
    #[error("duplicate element type: {0}")]
    DuplicateElement(String),
    #[error("duplicate action key: {0}")]
    DuplicateAction(String),
    #[error("text leaf is already defined")]
    DuplicateText,
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to write markdown: {0}")]
    Write(#[from] std::io::Error),
    #[error("generated markdown is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("upload rejected: {0}")]
    Rejected(String),
    #[error("upload transport failed: {0}")]
    Transport(String),
}

//! Error types for azptu-core.
//!
//! Validation rejections are not errors of this kind: they are reported as
//! [`crate::ValidationFailure`] inside a [`crate::ValidationResult`]. `CoreError`
//! covers malformed input that never reaches the engine (bad catalog documents,
//! non-positive capacities, unparseable topology names).

use std::path::PathBuf;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid model catalog: {0}")]
    Catalog(String),

    #[error("failed to read model catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// True for errors caused by user input on the command line, as opposed to
    /// a broken catalog file.
    pub fn is_user_input(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

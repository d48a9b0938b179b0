//! Error taxonomy shared by the index, the synthesizer and the code-action layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Error, Debug)]
pub enum ImportError {
    /// No provider is indexed under this name.
    #[error("no import found for `{name}`")]
    LookupMiss { name: String },

    /// A source file could not be read during a scan.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The specifier occurs in the document but no import statement for it matched.
    #[error("no import statement from '{specifier}' to merge into")]
    MergeMismatch { specifier: String },

    /// The diagnostic message is not an undefined-symbol report.
    #[error("unrecognized diagnostic: {0}")]
    MalformedDiagnostic(String),

    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImportError {
    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, ImportError::LookupMiss { .. })
    }
}

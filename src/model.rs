use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::paths;

const DISCOVERED_KEY_PREFIX: &str = "module:";

/// Where an exported symbol comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FileRef {
    /// A file inside the workspace, addressed by absolute path.
    Workspace { path: String },
    /// A package-style module resolved outside the workspace; its specifier is
    /// used verbatim as the import source.
    Discovered { specifier: String },
}

impl FileRef {
    /// Workspace file; the path is stored slash-normalized with `.` and `..` resolved.
    pub fn workspace(path: impl AsRef<Path>) -> Self {
        FileRef::Workspace {
            path: paths::normalize(&path.as_ref().to_string_lossy()),
        }
    }

    pub fn discovered(specifier: impl Into<String>) -> Self {
        FileRef::Discovered {
            specifier: specifier.into(),
        }
    }

    pub fn is_discovered(&self) -> bool {
        matches!(self, FileRef::Discovered { .. })
    }

    /// The raw path (workspace file) or specifier (discovered module).
    pub fn fs_path(&self) -> &str {
        match self {
            FileRef::Workspace { path } => path,
            FileRef::Discovered { specifier } => specifier,
        }
    }

    /// Key under which the file's back-references are stored in `mapping`.
    pub fn key(&self) -> String {
        match self {
            FileRef::Workspace { path } => paths::file_key(path),
            FileRef::Discovered { specifier } => format!("{DISCOVERED_KEY_PREFIX}{specifier}"),
        }
    }

    /// Same kind and same key, however the path was spelled.
    pub fn same_file(&self, other: &FileRef) -> bool {
        self.is_discovered() == other.is_discovered() && self.key() == other.key()
    }
}

/// One exported symbol available for import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub name: String,
    pub file: FileRef,
    pub is_default: bool,
}

impl ProviderRecord {
    pub fn named(name: impl Into<String>, file: FileRef) -> Self {
        Self {
            name: name.into(),
            file,
            is_default: false,
        }
    }

    pub fn default_export(name: impl Into<String>, file: FileRef) -> Self {
        Self {
            name: name.into(),
            file,
            is_default: true,
        }
    }
}

const IMPORTS_PREFIX: &str = "/imports/";

/// Back-reference from a file's `mapping` entry into `imports`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub location: String,
}

impl Location {
    pub fn for_name(name: &str) -> Self {
        Self {
            location: format!("{IMPORTS_PREFIX}{name}"),
        }
    }

    /// The `imports` key this pointer refers to.
    pub fn name(&self) -> &str {
        self.location
            .strip_prefix(IMPORTS_PREFIX)
            .unwrap_or(&self.location)
    }
}

/// The persisted per-workspace document.
///
/// ```json
/// { "imports": { "<name>": [ProviderRecord, ...] },
///   "mapping": { "<file-key>": [{ "location": "/imports/<name>" }, ...] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexDocument {
    pub imports: BTreeMap<String, Vec<ProviderRecord>>,
    pub mapping: BTreeMap<String, Vec<Location>>,
}

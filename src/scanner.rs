use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use ignore::overrides::{Override, OverrideBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use crate::config::{Config, ALWAYS_EXCLUDED_DIRS};
use crate::error::ImportError;
use crate::extractor::{ExportExtractor, PatternExtractor};
use crate::model::{FileRef, ProviderRecord};
use crate::paths::to_slashes;
use crate::store::{JsonFileRepository, Repository, SymbolIndex};

fn default_overrides(root: &Path, exclude_dir_names: &[String]) -> Result<Override> {
    let mut ob = OverrideBuilder::new(root);

    // Dependency and typing directories, plus project-specific ones.
    // Include patterns for both the directory entry and its descendants,
    // otherwise the walker may still descend into the directory.
    let mut dirs: Vec<&str> = ALWAYS_EXCLUDED_DIRS.to_vec();
    dirs.extend(
        exclude_dir_names
            .iter()
            .map(|d| d.trim().trim_matches('/'))
            .filter(|d| !d.is_empty()),
    );
    for d in dirs {
        ob.add(&format!("!**/{d}"))?;
        ob.add(&format!("!**/{d}/**"))?;
    }

    Ok(ob.build()?)
}

/// Files under `root` selected by `filesToScan`, in discovery order (sorted by path).
pub fn discover_files(root: &Path, cfg: &Config) -> Result<Vec<PathBuf>> {
    let pattern = Pattern::new(&cfg.files_to_scan)
        .with_context(|| format!("Invalid filesToScan pattern: {}", cfg.files_to_scan))?;
    let match_opts = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let overrides = default_overrides(root, &cfg.exclude_dir_names)?;
    let walker = WalkBuilder::new(root)
        .standard_filters(true) // .gitignore, .ignore, hidden, etc.
        .overrides(overrides)
        .build();

    let mut files = Vec::new();
    for item in walker {
        let dent = match item {
            Ok(d) => d,
            Err(_) => continue,
        };
        if !dent.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let abs_path = dent.into_path();
        let Ok(rel) = abs_path.strip_prefix(root) else { continue };
        if !pattern.matches_with(&to_slashes(&rel.to_string_lossy()), match_opts) {
            continue;
        }

        let bytes = match std::fs::metadata(&abs_path).map(|m| m.len()) {
            Ok(b) => b,
            Err(_) => continue,
        };
        if bytes == 0 || bytes > cfg.max_file_bytes {
            continue;
        }

        files.push(abs_path);
    }

    files.sort();
    Ok(files)
}

/// Read a source file; binary content reads as empty.
fn read_source(path: &Path) -> crate::error::Result<String> {
    let bytes = std::fs::read(path).map_err(|source| ImportError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.contains(&0u8) {
        return Ok(String::new());
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// What to (re)index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ScanRequest {
    /// Rescan the whole workspace.
    Full,
    /// A file was created or changed.
    Edit { file: PathBuf },
    /// A file was deleted.
    Delete { file: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Files read and indexed.
    pub files: usize,
    /// Files whose read failed; their symbols are absent.
    pub failed: usize,
    /// Records dropped for deleted files.
    pub removed: usize,
    /// Index size after the batch (names plus files).
    pub entries: usize,
    pub elapsed_ms: u64,
}

/// Notified after each completed scan batch.
pub trait ScanObserver: Send + Sync {
    fn scan_finished(&self, summary: &ScanSummary);
}

impl<F> ScanObserver for F
where
    F: Fn(&ScanSummary) + Send + Sync,
{
    fn scan_finished(&self, summary: &ScanSummary) {
        self(summary)
    }
}

pub struct ImportScanner<R: Repository = JsonFileRepository> {
    root: PathBuf,
    config: Config,
    index: SymbolIndex<R>,
    extractor: Box<dyn ExportExtractor>,
    observer: Option<Box<dyn ScanObserver>>,
}

impl ImportScanner<JsonFileRepository> {
    /// Scanner backed by the workspace's JSON document under the configured store dir.
    pub fn open(root: &Path, config: Config) -> Self {
        let index = SymbolIndex::open(&config.store_dir(root), root);
        Self::new(root, config, index)
    }
}

impl<R: Repository> ImportScanner<R> {
    pub fn new(root: &Path, config: Config, index: SymbolIndex<R>) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            index,
            extractor: Box::new(PatternExtractor::new()),
            observer: None,
        }
    }

    pub fn with_extractor(mut self, extractor: impl ExportExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_observer(mut self, observer: impl ScanObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn index(&self) -> &SymbolIndex<R> {
        &self.index
    }

    pub fn handle(&self, request: &ScanRequest) -> Result<ScanSummary> {
        match request {
            ScanRequest::Full => self.scan(),
            ScanRequest::Edit { file } => self.edit(file),
            ScanRequest::Delete { file } => self.delete(file),
        }
    }

    /// Absolute form of `path` with `.` and `..` resolved, so an edit spelled
    /// `./src/a.js` hits the same index entries as the scan's `src/a.js`.
    fn resolve(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let mut out = PathBuf::new();
        for comp in joined.components() {
            match comp {
                Component::CurDir => {}
                Component::ParentDir => {
                    if !out.pop() {
                        out.push(comp);
                    }
                }
                other => out.push(other),
            }
        }
        out
    }

    fn finish(&self, mut summary: ScanSummary, started: Instant) -> Result<ScanSummary> {
        summary.entries = self.index.count().context("Failed to read index size")?;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        if let Some(observer) = &self.observer {
            observer.scan_finished(&summary);
        }
        Ok(summary)
    }

    fn extract_file(&self, path: &Path) -> crate::error::Result<(FileRef, Vec<ProviderRecord>)> {
        let text = read_source(path)?;
        let file = FileRef::workspace(path);
        let records = self.extractor.extract(&text, &file);
        Ok((file, records))
    }

    /// Index every discovered file. Reads and extraction run in parallel;
    /// each file's records then replace its previous ones in the index.
    pub fn scan(&self) -> Result<ScanSummary> {
        let started = Instant::now();
        let mut files = discover_files(&self.root, &self.config)?;
        files.reverse();

        let extracted: Vec<_> = files
            .par_iter()
            .map(|path| (path, self.extract_file(path)))
            .collect();

        let mut summary = ScanSummary::default();
        for (path, result) in extracted {
            match result {
                Ok((file, records)) => {
                    crate::debug_log!("[autoimport] file={} exports={}", path.display(), records.len());
                    self.index
                        .replace_file(&file, &records)
                        .with_context(|| format!("Failed to index {}", path.display()))?;
                    summary.files += 1;
                }
                Err(e) => {
                    eprintln!("[autoimport] WARN {e}");
                    summary.failed += 1;
                }
            }
        }

        self.finish(summary, started)
    }

    /// Re-index one created or changed file. A file that no longer exists is removed instead.
    pub fn edit(&self, path: &Path) -> Result<ScanSummary> {
        let path = self.resolve(path);
        if !path.exists() {
            return self.delete(&path);
        }

        let started = Instant::now();
        let mut summary = ScanSummary::default();
        match self.extract_file(&path) {
            Ok((file, records)) => {
                self.index
                    .replace_file(&file, &records)
                    .with_context(|| format!("Failed to index {}", path.display()))?;
                summary.files = 1;
            }
            Err(e) => {
                eprintln!("[autoimport] WARN {e}");
                self.index.delete_by_file(&FileRef::workspace(&path))?;
                summary.failed = 1;
            }
        }
        self.finish(summary, started)
    }

    /// Drop everything a deleted file contributed.
    pub fn delete(&self, path: &Path) -> Result<ScanSummary> {
        let started = Instant::now();
        let path = self.resolve(path);
        let summary = ScanSummary {
            removed: self.index.delete_by_file(&FileRef::workspace(&path))?,
            ..ScanSummary::default()
        };
        crate::debug_log!("[autoimport] removed {} records of {}", summary.removed, path.display());
        self.finish(summary, started)
    }

    /// Index a module resolved outside the workspace (e.g. a package entry point).
    pub fn ingest_discovered(&self, specifier: &str, text: &str) -> Result<usize> {
        let file = FileRef::discovered(specifier);
        let records = self.extractor.extract(text, &file);
        Ok(self.index.replace_file(&file, &records)?)
    }
}

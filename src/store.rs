use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{ImportError, Result};
use crate::model::{FileRef, IndexDocument, Location, ProviderRecord};
use crate::paths::to_slashes;

// ---------------------------------------------------------------------------
// Symbol index: one JSON document per workspace.
//
// Storage layout:  <store_dir>/import-<workspace id>.json
//   { "imports": { "<name>": [ProviderRecord, ...] },
//     "mapping": { "<file key>": [{ "location": "/imports/<name>" }, ...] } }
//
// Every operation is a fresh read-modify-write of the document; nothing is
// cached between calls. `imports` and `mapping` are always written together.
// ---------------------------------------------------------------------------

/// Durable storage for one workspace's [`IndexDocument`].
pub trait Repository: Send + Sync {
    /// The current document; an absent document reads as empty.
    fn read(&self) -> Result<IndexDocument>;
    fn write(&self, doc: &IndexDocument) -> Result<()>;
    /// Drop the document entirely. Deleting an absent document is not an error.
    fn delete(&self) -> Result<()>;
}

/// Stable identity of a workspace, derived from its root path.
pub fn workspace_id(workspace_root: &Path) -> String {
    let root = to_slashes(&workspace_root.to_string_lossy());
    let root = root.trim_end_matches('/');
    format!("{:016x}", xxh3_64(root.as_bytes()))
}

#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_workspace(store_dir: &Path, workspace_root: &Path) -> Self {
        Self::new(store_dir.join(format!("import-{}.json", workspace_id(workspace_root))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Repository for JsonFileRepository {
    fn read(&self) -> Result<IndexDocument> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(IndexDocument::default()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<IndexDocument>(&text) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                eprintln!(
                    "[autoimport] WARN index {} corrupted ({}), rebuilding from scratch",
                    self.path.display(),
                    e
                );
                Ok(IndexDocument::default())
            }
        }
    }

    fn write(&self, doc: &IndexDocument) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        // Write-then-rename so a crash never leaves a half-written document.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(doc)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process repository, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    doc: Mutex<IndexDocument>,
}

impl Repository for MemoryRepository {
    fn read(&self) -> Result<IndexDocument> {
        Ok(self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn write(&self, doc: &IndexDocument) -> Result<()> {
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = doc.clone();
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = IndexDocument::default();
        Ok(())
    }
}

/// Trimmed name, or `None` when it is too short to be worth indexing.
fn normalize_name(name: &str) -> Option<&str> {
    let name = name.trim();
    (name.chars().count() > 1).then_some(name)
}

/// Append one record to both structures. Duplicates are kept.
fn append(doc: &mut IndexDocument, record: ProviderRecord) {
    doc.mapping
        .entry(record.file.key())
        .or_default()
        .push(Location::for_name(&record.name));
    doc.imports.entry(record.name.clone()).or_default().push(record);
}

/// Remove the `mapping` entry for `file` and every record it points at that came
/// from that file. `None` when the file has no mapping entry.
fn remove_file_records(doc: &mut IndexDocument, file: &FileRef) -> Option<usize> {
    let locations = doc.mapping.remove(&file.key())?;

    let names: BTreeSet<String> = locations.iter().map(|l| l.name().to_string()).collect();
    let mut removed = 0usize;
    for name in names {
        let Some(records) = doc.imports.get_mut(&name) else { continue };
        let before = records.len();
        records.retain(|r| !r.file.same_file(file));
        removed += before - records.len();
        if records.is_empty() {
            doc.imports.remove(&name);
        }
    }
    Some(removed)
}

pub struct SymbolIndex<R: Repository = JsonFileRepository> {
    repo: R,
}

impl SymbolIndex<JsonFileRepository> {
    /// Index for `workspace_root`, persisted under `store_dir`.
    pub fn open(store_dir: &Path, workspace_root: &Path) -> Self {
        Self::new(JsonFileRepository::for_workspace(store_dir, workspace_root))
    }
}

impl<R: Repository> SymbolIndex<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Record that `file` exports `name`. Empty and single-character names are ignored.
    pub fn save_import(&self, name: &str, file: &FileRef, is_default: bool) -> Result<()> {
        let Some(name) = normalize_name(name) else { return Ok(()) };

        let mut doc = self.repo.read()?;
        append(
            &mut doc,
            ProviderRecord {
                name: name.to_string(),
                file: file.clone(),
                is_default,
            },
        );
        self.repo.write(&doc)
    }

    /// Append a batch of records in one read-modify-write.
    ///
    /// Same per-record rules as [`save_import`](Self::save_import). Returns how many were stored.
    pub fn save_records(&self, records: &[ProviderRecord]) -> Result<usize> {
        let valid: Vec<ProviderRecord> = records
            .iter()
            .filter_map(|r| {
                normalize_name(&r.name).map(|name| ProviderRecord {
                    name: name.to_string(),
                    ..r.clone()
                })
            })
            .collect();
        if valid.is_empty() {
            return Ok(0);
        }

        let stored = valid.len();
        let mut doc = self.repo.read()?;
        for record in valid {
            append(&mut doc, record);
        }
        self.repo.write(&doc)?;
        Ok(stored)
    }

    /// Drop what `file` contributed and store `records` in its place, as one
    /// read-modify-write. Returns how many records were stored.
    pub fn replace_file(&self, file: &FileRef, records: &[ProviderRecord]) -> Result<usize> {
        let mut doc = self.repo.read()?;
        remove_file_records(&mut doc, file);

        let mut stored = 0usize;
        for record in records {
            let Some(name) = normalize_name(&record.name) else { continue };
            append(
                &mut doc,
                ProviderRecord {
                    name: name.to_string(),
                    ..record.clone()
                },
            );
            stored += 1;
        }
        self.repo.write(&doc)?;
        Ok(stored)
    }

    /// Every provider of `name`, in insertion order.
    pub fn get_import(&self, name: &str) -> Result<Vec<ProviderRecord>> {
        let key = name.trim();
        let mut doc = self.repo.read()?;
        match doc.imports.remove(key) {
            Some(records) if !records.is_empty() => Ok(records),
            _ => Err(ImportError::LookupMiss {
                name: key.to_string(),
            }),
        }
    }

    /// Remove exactly the records `file` contributed. Returns how many were removed;
    /// a file that was never indexed removes nothing.
    pub fn delete_by_file(&self, file: &FileRef) -> Result<usize> {
        let mut doc = self.repo.read()?;
        let Some(removed) = remove_file_records(&mut doc, file) else {
            return Ok(0);
        };
        self.repo.write(&doc)?;
        Ok(removed)
    }

    /// Distinct `imports` keys plus `mapping` keys.
    pub fn count(&self) -> Result<usize> {
        let doc = self.repo.read()?;
        Ok(doc.imports.len() + doc.mapping.len())
    }

    /// Forget everything indexed for this workspace.
    pub fn clear(&self) -> Result<()> {
        self.repo.delete()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mem_index() -> SymbolIndex<MemoryRepository> {
        SymbolIndex::new(MemoryRepository::default())
    }

    #[test]
    fn saved_name_is_found() {
        let idx = mem_index();
        let file = FileRef::workspace("/w/util.js");
        idx.save_import("  parseDate ", &file, false).unwrap();

        let found = idx.get_import("parseDate").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "parseDate");
        assert_eq!(found[0].file, file);
    }

    #[test]
    fn single_character_and_empty_names_are_ignored() {
        let idx = mem_index();
        let file = FileRef::workspace("/w/util.js");
        idx.save_import("a", &file, false).unwrap();
        idx.save_import("   ", &file, false).unwrap();

        let err = idx.get_import("a").unwrap_err();
        assert!(err.is_lookup_miss());
        assert_eq!(idx.count().unwrap(), 0);
    }

    #[test]
    fn duplicate_saves_append() {
        let idx = mem_index();
        let file = FileRef::workspace("/w/Widget.js");
        idx.save_import("Widget", &file, true).unwrap();
        idx.save_import("Widget", &file, true).unwrap();
        assert_eq!(idx.get_import("Widget").unwrap().len(), 2);
    }

    #[test]
    fn delete_removes_only_that_files_records() {
        let idx = mem_index();
        let a = FileRef::workspace("/w/a.js");
        let b = FileRef::workspace("/w/b.js");
        idx.save_import("shared", &a, false).unwrap();
        idx.save_import("onlyA", &a, false).unwrap();
        idx.save_import("shared", &b, false).unwrap();
        idx.save_import("onlyB", &b, false).unwrap();

        assert_eq!(idx.delete_by_file(&a).unwrap(), 2);

        let shared = idx.get_import("shared").unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].file, b);
        assert!(idx.get_import("onlyA").unwrap_err().is_lookup_miss());
        assert_eq!(idx.get_import("onlyB").unwrap().len(), 1);

        let doc = idx.repository().read().unwrap();
        assert!(!doc.mapping.contains_key(&a.key()));
        assert!(doc.mapping.contains_key(&b.key()));
    }

    #[test]
    fn delete_keeps_files_whose_paths_differ_only_by_separators() {
        let idx = mem_index();
        let a = FileRef::workspace("/w/date-utils/index.js");
        let b = FileRef::workspace("/w/date/utils-index.js");
        idx.save_import("fromA", &a, false).unwrap();
        idx.save_import("fromB", &b, false).unwrap();

        assert_eq!(idx.delete_by_file(&a).unwrap(), 1);
        assert!(idx.get_import("fromA").unwrap_err().is_lookup_miss());
        let kept = idx.get_import("fromB").unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file, b);
    }

    #[test]
    fn replace_file_swaps_only_that_files_records() {
        let idx = mem_index();
        let a = FileRef::workspace("/w/a.js");
        let b = FileRef::workspace("/w/b.js");
        idx.save_import("oldName", &a, false).unwrap();
        idx.save_import("shared", &a, false).unwrap();
        idx.save_import("shared", &b, false).unwrap();

        let stored = idx
            .replace_file(&a, &[ProviderRecord::named("newName", a.clone()), ProviderRecord::named("shared", a.clone())])
            .unwrap();
        assert_eq!(stored, 2);
        assert!(idx.get_import("oldName").unwrap_err().is_lookup_miss());
        assert_eq!(idx.get_import("newName").unwrap().len(), 1);
        assert_eq!(idx.get_import("shared").unwrap().len(), 2, "no duplicate from the re-scan");
    }

    #[test]
    fn deleting_unknown_file_is_silent() {
        let idx = mem_index();
        assert_eq!(idx.delete_by_file(&FileRef::workspace("/w/never.js")).unwrap(), 0);
    }

    #[test]
    fn count_adds_names_and_files() {
        let idx = mem_index();
        let a = FileRef::workspace("/w/a.js");
        let b = FileRef::workspace("/w/b.js");
        let stored = idx
            .save_records(&[
                ProviderRecord::named("first", a.clone()),
                ProviderRecord::named("second", a.clone()),
                ProviderRecord::named("x", a),
                ProviderRecord::named("first", b),
            ])
            .unwrap();
        assert_eq!(stored, 3);
        // 2 names + 2 files
        assert_eq!(idx.count().unwrap(), 4);
    }

    #[test]
    fn json_store_persists_across_instances() {
        let tmp = TempDir::new().unwrap();
        let root = Path::new("/projects/app");
        let file = FileRef::workspace("/projects/app/src/api.js");

        SymbolIndex::open(tmp.path(), root)
            .save_import("fetchUser", &file, false)
            .unwrap();

        let reopened = SymbolIndex::open(tmp.path(), root);
        assert_eq!(reopened.get_import("fetchUser").unwrap()[0].file, file);

        let text = std::fs::read_to_string(reopened.repository().path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(v["imports"]["fetchUser"].is_array());
        assert_eq!(
            v["mapping"][file.key()][0]["location"],
            "/imports/fetchUser"
        );
    }

    #[test]
    fn workspaces_do_not_share_a_document() {
        let tmp = TempDir::new().unwrap();
        let one = SymbolIndex::open(tmp.path(), Path::new("/projects/one"));
        let two = SymbolIndex::open(tmp.path(), Path::new("/projects/two"));
        assert_ne!(one.repository().path(), two.repository().path());

        one.save_import("onlyInOne", &FileRef::workspace("/projects/one/a.js"), false)
            .unwrap();
        assert!(two.get_import("onlyInOne").unwrap_err().is_lookup_miss());
        assert_eq!(workspace_id(Path::new("/projects/one")), workspace_id(Path::new("/projects/one/")));
    }

    #[test]
    fn corrupt_document_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let repo = JsonFileRepository::new(tmp.path().join("import-broken.json"));
        std::fs::write(repo.path(), "{ nope").unwrap();
        assert_eq!(repo.read().unwrap(), IndexDocument::default());
    }

    #[test]
    fn clear_drops_the_document() {
        let tmp = TempDir::new().unwrap();
        let idx = SymbolIndex::open(tmp.path(), Path::new("/projects/app"));
        idx.save_import("thing", &FileRef::workspace("/projects/app/t.js"), false)
            .unwrap();
        idx.clear().unwrap();
        assert!(!idx.repository().path().exists());
        assert_eq!(idx.count().unwrap(), 0);
        idx.clear().unwrap();
    }
}

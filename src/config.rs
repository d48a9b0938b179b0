use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-workspace configuration file, looked up at the workspace root.
pub const CONFIG_FILE_NAME: &str = ".autoimport.json";

/// Directory names that are never scanned, whatever the config says.
pub const ALWAYS_EXCLUDED_DIRS: [&str; 3] = ["node_modules", "typings", "jspm_packages"];

/// How rendered import statements look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Formatting {
    /// `{ a, b }` when true, `{a, b}` when false.
    pub space_between_braces: bool,
    /// `"./foo"` when true, `'./foo'` when false.
    pub double_quotes: bool,
}

impl Default for Formatting {
    fn default() -> Self {
        Self {
            space_between_braces: true,
            double_quotes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Glob (relative to the workspace root) selecting the files to index.
    pub files_to_scan: String,
    /// Print scan progress and completion messages.
    pub show_notifications: bool,
    #[serde(flatten)]
    pub formatting: Formatting,
    /// Extra directory *names* to skip anywhere in the tree.
    ///
    /// Compared against path components, not full paths.
    pub exclude_dir_names: Vec<String>,
    /// Where the per-workspace index documents live. `None` means `~/.autoimport`.
    pub store_dir: Option<PathBuf>,
    /// Files larger than this are skipped by discovery.
    pub max_file_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            files_to_scan: "**/*.js".to_string(),
            show_notifications: true,
            formatting: Formatting::default(),
            exclude_dir_names: vec![],
            store_dir: None,
            // 512 KB default; larger files are treated as bundles.
            max_file_bytes: 512 * 1024,
        }
    }
}

impl Config {
    /// Resolve the store directory; relative `storeDir` values are taken from the workspace root.
    pub fn store_dir(&self, workspace_root: &Path) -> PathBuf {
        match &self.store_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => workspace_root.join(dir),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".autoimport"),
        }
    }
}

pub fn load_config(workspace_root: &Path) -> Config {
    let primary = workspace_root.join(CONFIG_FILE_NAME);

    let text = std::fs::read_to_string(&primary);
    let Ok(text) = text else { return Config::default() };

    serde_json::from_str::<Config>(&text).unwrap_or_else(|_e| {
        crate::debug_log!("[autoimport] ignoring malformed {}: {}", primary.display(), _e);
        Config::default()
    })
}

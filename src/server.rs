use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::action::ImportAction;
use crate::config::load_config;
use crate::model::ProviderRecord;
use crate::scanner::{ImportScanner, ScanRequest};
use crate::synth::{Document, ImportSynthesizer};

#[derive(Default)]
pub struct ServerState {
    root: Option<PathBuf>,
}

fn reply_ok(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn reply_err(id: Value, code: i64, message: String) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .with_context(|| format!("Missing {key}"))
}

impl ServerState {
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: Some(root.canonicalize().unwrap_or_else(|_| root.to_path_buf())),
        }
    }

    fn root_from_params(&mut self, params: &Value) -> PathBuf {
        let root = params
            .get("root")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .or_else(|| self.root.clone())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let root = root.canonicalize().unwrap_or(root);

        self.root = Some(root.clone());
        root
    }

    fn scanner(&mut self, params: &Value) -> ImportScanner {
        let root = self.root_from_params(params);
        let cfg = load_config(&root);
        ImportScanner::open(&root, cfg)
    }

    fn scan(&mut self, params: &Value) -> Result<Value> {
        let request: ScanRequest =
            serde_json::from_value(params.clone()).context("Invalid scan request")?;
        let summary = self.scanner(params).handle(&request)?;
        Ok(serde_json::to_value(summary)?)
    }

    fn lookup(&mut self, params: &Value) -> Result<Value> {
        let name = str_param(params, "name")?;
        let scanner = self.scanner(params);
        let imports = match scanner.index().get_import(name) {
            Ok(found) => found,
            Err(e) if e.is_lookup_miss() => vec![],
            Err(e) => return Err(e.into()),
        };
        Ok(json!({ "imports": imports }))
    }

    fn code_actions(&mut self, params: &Value) -> Result<Value> {
        let document = str_param(params, "document")?;
        let message = str_param(params, "message")?;
        let scanner = self.scanner(params);
        let actions = ImportAction::new(scanner.index()).actions(document, message);
        Ok(json!({ "actions": actions }))
    }

    fn fix_import(&mut self, params: &Value) -> Result<Value> {
        let path = str_param(params, "document")?;
        let imports: Vec<ProviderRecord> = serde_json::from_value(
            params.get("imports").cloned().unwrap_or_else(|| json!([])),
        )
        .context("Invalid imports")?;
        let symbol = params
            .get("symbol")
            .and_then(|v| v.as_str())
            .or_else(|| imports.first().map(|r| r.name.as_str()))
            .unwrap_or("")
            .to_string();

        let root = self.root_from_params(params);
        let document = match params.get("text").and_then(|v| v.as_str()) {
            Some(text) => Document::new(path, text),
            None => {
                let abs = if Path::new(path).is_absolute() {
                    PathBuf::from(path)
                } else {
                    root.join(path)
                };
                Document::load(&abs).with_context(|| format!("Failed to read {}", abs.display()))?
            }
        };

        let cfg = load_config(&root);
        let edit = ImportSynthesizer::new(cfg.formatting).synthesize(&document, &symbol, &imports)?;
        Ok(json!({ "edit": edit }))
    }

    /// Index a module that lives outside the workspace under its bare specifier.
    /// Takes the module source as `text`, or a `file` to read it from.
    fn ingest(&mut self, params: &Value) -> Result<Value> {
        let specifier = str_param(params, "specifier")?;
        let text = match params.get("text").and_then(|v| v.as_str()) {
            Some(text) => text.to_string(),
            None => {
                let file = str_param(params, "file")?;
                std::fs::read_to_string(file).with_context(|| format!("Failed to read {file}"))?
            }
        };
        let scanner = self.scanner(params);
        let stored = scanner.ingest_discovered(specifier, &text)?;
        Ok(json!({ "stored": stored }))
    }

    fn count(&mut self, params: &Value) -> Result<Value> {
        let scanner = self.scanner(params);
        Ok(json!({ "count": scanner.index().count()? }))
    }

    pub fn handle(&mut self, msg: &Value) -> Option<Value> {
        // Notifications have no "id" field: no reply.
        let id = msg.get("id").cloned()?;
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = msg.get("params").cloned().unwrap_or_else(|| json!({}));

        let result = match method {
            "initialize" => Ok(json!({
                "capabilities": { "scan": true, "codeActions": true, "fixImport": true },
                "serverInfo": { "name": "autoimport", "version": env!("CARGO_PKG_VERSION") }
            })),
            "ping" => Ok(json!({})),
            "scan" => self.scan(&params),
            "lookup" => self.lookup(&params),
            "codeActions" => self.code_actions(&params),
            "fixImport" => self.fix_import(&params),
            "ingest" => self.ingest(&params),
            "count" => self.count(&params),
            _ => return Some(reply_err(id, -32601, format!("Method not found: {method}"))),
        };

        Some(match result {
            Ok(v) => reply_ok(id, v),
            Err(e) => reply_err(id, -32000, format!("{e:#}")),
        })
    }
}

pub fn run_stdio_server(root: Option<&Path>) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    let mut state = root.map(ServerState::with_root).unwrap_or_default();

    for line in stdin.lock().lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        if let Some(reply) = state.handle(&msg) {
            writeln!(stdout, "{}", reply)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(".autoimport.json"),
            r#"{"storeDir": ".store", "doubleQuotes": true}"#,
        )
        .unwrap();
        std::fs::create_dir_all(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/math.js"), "export function clamp() {}\n").unwrap();
        tmp
    }

    fn call(state: &mut ServerState, id: i64, method: &str, params: Value) -> Value {
        state
            .handle(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .expect("request with id gets a reply")
    }

    #[test]
    fn notifications_get_no_reply() {
        let mut state = ServerState::default();
        assert!(state.handle(&json!({ "jsonrpc": "2.0", "method": "initialized" })).is_none());
    }

    #[test]
    fn unknown_method_is_reported() {
        let mut state = ServerState::default();
        let v = call(&mut state, 1, "nope", json!({}));
        assert_eq!(v["error"]["code"], -32601);
    }

    #[test]
    fn scan_then_fix_uses_workspace_formatting() {
        let tmp = workspace();
        let mut state = ServerState::with_root(tmp.path());

        let v = call(&mut state, 1, "scan", json!({ "mode": "full" }));
        assert_eq!(v["result"]["files"], 1);

        let v = call(&mut state, 2, "lookup", json!({ "name": "clamp" }));
        let imports = v["result"]["imports"].clone();
        assert_eq!(imports.as_array().unwrap().len(), 1);

        let doc = tmp.path().canonicalize().unwrap().join("src/app.js");
        let v = call(
            &mut state,
            3,
            "fixImport",
            json!({ "document": doc.to_string_lossy(), "text": "clamp(1);\n", "imports": imports }),
        );
        assert_eq!(v["result"]["edit"]["kind"], "insert");
        assert_eq!(v["result"]["edit"]["text"], "import { clamp } from \"./math\";\n");
    }

    #[test]
    fn ingested_module_is_imported_by_specifier() {
        let tmp = workspace();
        let mut state = ServerState::with_root(tmp.path());

        let v = call(
            &mut state,
            1,
            "ingest",
            json!({ "specifier": "lodash", "text": "export function debounce() {}\n" }),
        );
        assert_eq!(v["result"]["stored"], 1);

        let v = call(
            &mut state,
            2,
            "codeActions",
            json!({ "document": "src/app.js", "message": "'debounce' is not defined. (no-undef)" }),
        );
        assert_eq!(v["result"]["actions"][0]["title"], "Import debounce from lodash");
    }

    #[test]
    fn relative_root_param_is_canonicalized() {
        let tmp = workspace();
        let canonical = tmp.path().canonicalize().unwrap();
        let dotted = canonical.join("src").join("..");
        let mut state = ServerState::default();
        let root = state.root_from_params(&json!({ "root": dotted.to_string_lossy() }));
        assert_eq!(root, canonical);
    }

    #[test]
    fn lookup_miss_is_an_empty_result() {
        let tmp = workspace();
        let mut state = ServerState::with_root(tmp.path());
        let v = call(&mut state, 1, "lookup", json!({ "name": "missing" }));
        assert_eq!(v["result"]["imports"], json!([]));
    }
}

//! Code actions for undefined-symbol diagnostics: recognize the diagnostic,
//! look the symbol up, and offer one "Import X from Y" action per provider.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{ImportError, Result};
use crate::model::ProviderRecord;
use crate::paths::import_specifier;
use crate::store::{Repository, SymbolIndex};

fn diagnostic_regexes() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        vec![
            // ESLint: `Foo is not defined. (no-undef)` / `'Foo' is not defined. (no-undef)`
            Regex::new(r#"^\s*['"]?([A-Za-z_$][\w$]*)['"]?\s+is not defined\.?\s*\(no-undef\)\s*$"#).unwrap(),
            // TypeScript: `Cannot find name 'Foo'.`
            Regex::new(r#"Cannot find name ['"]([A-Za-z_$][\w$]*)['"]"#).unwrap(),
        ]
    })
}

/// The bare identifier an undefined-symbol diagnostic is about.
pub fn missing_symbol(message: &str) -> Result<String> {
    diagnostic_regexes()
        .iter()
        .find_map(|re| re.captures(message).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ImportError::MalformedDiagnostic(message.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeAction {
    pub title: String,
    pub symbol: String,
    /// Candidates to hand to the synthesizer; the one this action offers comes first.
    pub imports: Vec<ProviderRecord>,
}

pub struct ImportAction<'a, R: Repository> {
    index: &'a SymbolIndex<R>,
}

impl<'a, R: Repository> ImportAction<'a, R> {
    pub fn new(index: &'a SymbolIndex<R>) -> Self {
        Self { index }
    }

    /// Providers for the symbol named in `message`; empty when there is nothing to offer.
    pub fn candidates(&self, message: &str) -> Vec<ProviderRecord> {
        let symbol = match missing_symbol(message) {
            Ok(s) => s,
            Err(_e) => {
                crate::debug_log!("[autoimport] {}", _e);
                return vec![];
            }
        };
        match self.index.get_import(&symbol) {
            Ok(found) => found,
            Err(ImportError::LookupMiss { .. }) => vec![],
            Err(e) => {
                eprintln!("[autoimport] WARN lookup of `{symbol}` failed: {e}");
                vec![]
            }
        }
    }

    /// One action per candidate provider.
    pub fn actions(&self, document_path: &str, message: &str) -> Vec<CodeAction> {
        let candidates = self.candidates(message);
        (0..candidates.len())
            .map(|i| {
                let chosen = &candidates[i];
                let mut imports = Vec::with_capacity(candidates.len());
                imports.push(chosen.clone());
                imports.extend(
                    candidates
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, r)| r.clone()),
                );
                CodeAction {
                    title: format!(
                        "Import {} from {}",
                        chosen.name,
                        import_specifier(document_path, &chosen.file)
                    ),
                    symbol: chosen.name.clone(),
                    imports,
                }
            })
            .collect()
    }
}

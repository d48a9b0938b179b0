//! Import synthesis: turn a chosen provider into a text edit on the importing document,
//! either merged into an existing `import ... from '<specifier>'` or inserted as a new line.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

use crate::config::Formatting;
use crate::error::{ImportError, Result};
use crate::model::ProviderRecord;
use crate::paths::import_specifier;

/// The document an import is added to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub text: String,
}

impl Document {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path.to_string_lossy(), text))
    }

    fn line_ending(&self) -> &'static str {
        if self.text.contains("\r\n") {
            "\r\n"
        } else {
            "\n"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TextEdit {
    /// Insert `text` at the start of `line` (zero-based).
    Insert { line: usize, text: String },
    /// Replace the whole document with `text`.
    ReplaceDocument { text: String },
    Unchanged,
}

impl TextEdit {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, TextEdit::Unchanged)
    }

    pub fn apply(&self, document: &str) -> String {
        match self {
            TextEdit::Unchanged => document.to_string(),
            TextEdit::ReplaceDocument { text } => text.clone(),
            TextEdit::Insert { line, text } => {
                let mut offset = 0usize;
                for _ in 0..*line {
                    match document[offset..].find('\n') {
                        Some(i) => offset += i + 1,
                        None => {
                            offset = document.len();
                            break;
                        }
                    }
                }
                let mut out = String::with_capacity(document.len() + text.len() + 1);
                out.push_str(&document[..offset]);
                if offset == document.len() && !document.is_empty() && !document.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(text);
                out.push_str(&document[offset..]);
                out
            }
        }
    }
}

/// One import statement: `import Default, { a, b } from 'specifier';`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    pub default: Option<String>,
    pub named: Vec<String>,
    pub specifier: String,
}

impl ImportStatement {
    pub fn for_provider(record: &ProviderRecord, specifier: impl Into<String>) -> Self {
        let mut stmt = Self {
            default: None,
            named: vec![],
            specifier: specifier.into(),
        };
        stmt.add(record);
        stmt
    }

    /// Parse the clause between `import` and `from`: `Default`, `{ a, b as c }`
    /// or `Default, { ... }`. Anything else, namespace imports included, is not mergeable.
    fn parse_clause(clause: &str, specifier: &str) -> Option<Self> {
        let re = clause_patterns();
        let caps = re.clause.captures(clause.trim())?;
        let default = caps.get(1).map(|m| m.as_str().to_string());
        let braces = caps.get(2);
        if default.is_none() && braces.is_none() {
            return None;
        }

        let mut named = Vec::new();
        if let Some(body) = braces {
            for item in body.as_str().split(',') {
                let item = item.split_whitespace().collect::<Vec<_>>().join(" ");
                if item.is_empty() {
                    continue;
                }
                if !re.binding.is_match(&item) {
                    return None;
                }
                named.push(item);
            }
        }

        Some(Self {
            default,
            named,
            specifier: specifier.to_string(),
        })
    }

    /// Whether `name` is already bound locally, by the default or a named
    /// binding (`a` or `x as a`).
    fn binds(&self, name: &str) -> bool {
        self.default.as_deref() == Some(name)
            || self
                .named
                .iter()
                .any(|n| n.rsplit(' ').next().is_some_and(|local| local == name))
    }

    /// Bind the provider's symbol. Returns false when it is already bound, or when
    /// it is a default export and the statement already binds another default.
    pub fn add(&mut self, record: &ProviderRecord) -> bool {
        if self.binds(&record.name) {
            return false;
        }
        if record.is_default {
            if self.default.is_some() {
                return false;
            }
            self.default = Some(record.name.clone());
            return true;
        }
        self.named.push(record.name.clone());
        true
    }

    /// `None` when there is nothing to bind.
    pub fn render(&self, fmt: Formatting) -> Option<String> {
        let quote = if fmt.double_quotes { '"' } else { '\'' };
        let braces = (!self.named.is_empty()).then(|| {
            let list = self.named.join(", ");
            if fmt.space_between_braces {
                format!("{{ {list} }}")
            } else {
                format!("{{{list}}}")
            }
        });
        let clause = match (&self.default, braces) {
            (Some(def), Some(named)) => format!("{def}, {named}"),
            (None, Some(named)) => named,
            (Some(def), None) => def.clone(),
            (None, None) => return None,
        };
        Some(format!("import {clause} from {quote}{}{quote};", self.specifier))
    }
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

struct ClausePatterns {
    clause: Regex,
    binding: Regex,
}

fn clause_patterns() -> &'static ClausePatterns {
    static RE: OnceLock<ClausePatterns> = OnceLock::new();
    RE.get_or_init(|| ClausePatterns {
        // Default / { ... } / Default, { ... }
        clause: Regex::new(&format!(r"^(?:({IDENT})\s*(?:,\s*)?)?(?:\{{([^{{}}]*)\}})?$")).unwrap(),
        // a / a as b
        binding: Regex::new(&format!(r"^{IDENT}(?: as {IDENT})?$")).unwrap(),
    })
}

/// Import statements from `specifier`. A statement starts a line, so an `import`
/// word in a comment or string never opens a match, and its clause has to be
/// `Default`, `{ ... }` or `Default, { ... }`. Group 1 is the statement without
/// indentation, group 2 the clause.
fn statement_pattern(specifier: &str) -> Result<Regex> {
    let pattern = format!(
        r#"(?m)^[ \t]*(import\b\s*((?:{IDENT}\s+|(?:{IDENT}\s*,\s*)?\{{[^{{}}]*\}}\s*))from\s+['"]{}['"];?)"#,
        regex::escape(specifier)
    );
    Regex::new(&pattern).map_err(|_| ImportError::MergeMismatch {
        specifier: specifier.to_string(),
    })
}

/// First line that is not blank, a `"use strict"` pragma or part of an import.
/// Falls back to the line after the last one.
fn insertion_line(text: &str) -> usize {
    let mut in_import = false;
    let mut lines = 0usize;
    for (i, line) in text.lines().enumerate() {
        lines = i + 1;
        let t = line.trim();
        if in_import {
            in_import = !t.contains('}');
            continue;
        }
        if t.starts_with("import ") || t.starts_with("import{") {
            in_import = t.contains('{') && !t.contains('}');
            continue;
        }
        if t.is_empty() || t.contains("use strict") {
            continue;
        }
        return i;
    }
    lines
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportSynthesizer {
    formatting: Formatting,
}

impl ImportSynthesizer {
    pub fn new(formatting: Formatting) -> Self {
        Self { formatting }
    }

    /// Edit that makes `missing_symbol` available in `document`, using the first candidate.
    pub fn synthesize(
        &self,
        document: &Document,
        missing_symbol: &str,
        candidates: &[ProviderRecord],
    ) -> Result<TextEdit> {
        let Some(provider) = candidates.first() else {
            return Err(ImportError::LookupMiss {
                name: missing_symbol.trim().to_string(),
            });
        };
        let specifier = import_specifier(&document.path, &provider.file);

        if document.text.contains(&specifier) {
            return match self.merge(document, &specifier, provider) {
                Ok(edit) => Ok(edit),
                Err(ImportError::MergeMismatch { specifier: _s }) => {
                    crate::debug_log!("[autoimport] '{}' mentioned but no import statement matched", _s);
                    Ok(TextEdit::Unchanged)
                }
                Err(e) => Err(e),
            };
        }

        let stmt = ImportStatement::for_provider(provider, specifier);
        let Some(rendered) = stmt.render(self.formatting) else {
            return Ok(TextEdit::Unchanged);
        };
        Ok(TextEdit::Insert {
            line: insertion_line(&document.text),
            text: format!("{rendered}{}", document.line_ending()),
        })
    }

    /// Rewrite the first `import ... from '<specifier>'` to also bind `provider`.
    fn merge(&self, document: &Document, specifier: &str, provider: &ProviderRecord) -> Result<TextEdit> {
        let mismatch = || ImportError::MergeMismatch {
            specifier: specifier.to_string(),
        };
        let re = statement_pattern(specifier)?;
        let (whole, mut stmt) = re
            .captures_iter(&document.text)
            .find_map(|caps| {
                let whole = caps.get(1)?;
                let stmt = ImportStatement::parse_clause(caps.get(2)?.as_str(), specifier)?;
                Some((whole, stmt))
            })
            .ok_or_else(mismatch)?;

        if !stmt.add(provider) {
            return Ok(TextEdit::Unchanged);
        }
        let rendered = stmt.render(self.formatting).ok_or_else(mismatch)?;

        let text = &document.text;
        let mut merged = String::with_capacity(text.len() + provider.name.len() + 2);
        merged.push_str(&text[..whole.start()]);
        merged.push_str(&rendered);
        merged.push_str(&text[whole.end()..]);
        Ok(TextEdit::ReplaceDocument { text: merged })
    }
}

//! Export extraction.
//!
//! [`PatternExtractor`] recognizes export forms with regular expressions instead of
//! parsing. Unmatched or malformed text simply yields no records. Anything able to
//! produce [`ProviderRecord`]s from source text can stand in through [`ExportExtractor`].

use regex::Regex;
use std::sync::OnceLock;

use crate::model::{FileRef, ProviderRecord};
use crate::paths::module_name;

pub trait ExportExtractor: Send + Sync {
    fn extract(&self, source: &str, file: &FileRef) -> Vec<ProviderRecord>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PatternExtractor;

struct ExportPatterns {
    default_export: Regex,
    named: Regex,
    clause: Regex,
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

fn patterns() -> &'static ExportPatterns {
    static RE: OnceLock<ExportPatterns> = OnceLock::new();
    RE.get_or_init(|| ExportPatterns {
        // export default class X / export default function X / export default new X
        default_export: Regex::new(r"\bexport\s+default\s+(?:class|function|new)\s+\w\w+").unwrap(),
        // export [async] function[*] X / export class X / export let|const|var X
        named: Regex::new(&format!(
            r"\bexport\s+(?:(?:async\s+)?function\b\s*\*?\s*|(?:class|let|const|var)\s+)({IDENT})"
        ))
        .unwrap(),
        // export { a, b as c }
        clause: Regex::new(r"\bexport\s*\{([^}]*)\}").unwrap(),
    })
}

/// Local name of one `export { ... }` item: the part before `as` (or `:`).
fn clause_item_local_name(item: &str) -> Option<&str> {
    let item = item.trim();
    let local = match item.find(':') {
        Some(i) if i > 0 => &item[..i],
        _ => item,
    };
    local.split_whitespace().next()
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Records in source order.
    pub fn exports<'a>(&self, source: &'a str, file: &'a FileRef) -> impl Iterator<Item = ProviderRecord> + 'a {
        let pats = patterns();
        let mut found: Vec<(usize, ProviderRecord)> = Vec::new();

        if let Some(module) = module_name(file.fs_path()) {
            for m in pats.default_export.find_iter(source) {
                found.push((m.start(), ProviderRecord::default_export(module.clone(), file.clone())));
            }
        }

        for caps in pats.named.captures_iter(source) {
            let Some(name) = caps.get(1) else { continue };
            found.push((name.start(), ProviderRecord::named(name.as_str(), file.clone())));
        }

        for caps in pats.clause.captures_iter(source) {
            let Some(body) = caps.get(1) else { continue };
            for item in body.as_str().split(',') {
                if let Some(local) = clause_item_local_name(item) {
                    found.push((body.start(), ProviderRecord::named(local, file.clone())));
                }
            }
        }

        // Stable: items of one clause keep their listed order.
        found.sort_by_key(|(offset, _)| *offset);
        found.into_iter().map(|(_, rec)| rec)
    }
}

impl ExportExtractor for PatternExtractor {
    fn extract(&self, source: &str, file: &FileRef) -> Vec<ProviderRecord> {
        self.exports(source, file).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(src: &str, path: &str) -> Vec<ProviderRecord> {
        PatternExtractor::new().extract(src, &FileRef::workspace(path))
    }

    fn names(recs: &[ProviderRecord]) -> Vec<&str> {
        recs.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn named_function_export() {
        let recs = extract("export function foo() {}", "/w/util.js");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].name, "foo");
        assert!(!recs[0].is_default);
    }

    #[test]
    fn default_class_is_named_after_the_module() {
        let recs = extract("export default class Widget {}", "/w/components/Widget.js");
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].name, "Widget");
        assert!(recs[0].is_default);

        let recs = extract("export default class Thing {}", "/w/components/Widget.js");
        assert_eq!(names(&recs), vec!["Widget"], "construct name is not used");
    }

    #[test]
    fn default_export_in_index_file_uses_directory() {
        let recs = extract("export default function build() {}", "/w/foo/index.js");
        assert_eq!(names(&recs), vec!["foo"]);
        assert!(recs[0].is_default);

        let recs = extract("export default new Store()", "/w/store/index.js");
        assert_eq!(names(&recs), vec!["store"]);
    }

    #[test]
    fn aggregate_clause_indexes_local_names() {
        let recs = extract("export { a, b as c }", "/w/x.js");
        assert_eq!(names(&recs), vec!["a", "b"]);
        assert!(recs.iter().all(|r| !r.is_default));
    }

    #[test]
    fn multiline_clause_and_trailing_comma() {
        let src = "export {\n  alpha,\n  beta as gamma,\n  delta,\n};\n";
        let recs = extract(src, "/w/x.js");
        assert_eq!(names(&recs), vec!["alpha", "beta", "delta"]);
    }

    #[test]
    fn variable_class_and_async_exports() {
        let src = "export const API_URL = '';\nexport let count = 0;\nexport var legacy;\n\
                   export class Store {}\nexport async function load() {}\n";
        let recs = extract(src, "/w/x.js");
        assert_eq!(names(&recs), vec!["API_URL", "count", "legacy", "Store", "load"]);
    }

    #[test]
    fn generator_exports_in_every_spacing() {
        let src = "export function *gen() {}\nexport function* other() {}\nexport async function*stream() {}\n";
        let recs = extract(src, "/w/x.js");
        assert_eq!(names(&recs), vec!["gen", "other", "stream"]);
        assert!(extract("export functionality = 1;", "/w/x.js").is_empty());
    }

    #[test]
    fn non_exports_and_garbage_yield_nothing() {
        assert!(extract("function foo() {}\nconst bar = 1;", "/w/x.js").is_empty());
        assert!(extract("export {", "/w/x.js").is_empty());
        assert!(extract("", "/w/x.js").is_empty());
        assert!(extract("export { }", "/w/x.js").is_empty());
    }

    #[test]
    fn discovered_module_records_keep_their_file_ref() {
        let file = FileRef::discovered("lodash");
        let recs = PatternExtractor::new().extract("export function debounce() {}", &file);
        assert_eq!(recs[0].file, file);
    }
}

//! Path helpers that work on slash-normalized strings, so a path produced on
//! Windows renders the same specifier as one produced on Unix.

use crate::model::FileRef;

const INDEX_STEM: &str = "index";

/// Replace every backslash with a forward slash.
pub fn to_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Slash-separated path with `.` and `..` resolved lexically. The leading
/// `/` (or `//` for UNC shares) survives.
pub fn normalize(path: &str) -> String {
    let slashed = to_slashes(path);
    let prefix = if slashed.starts_with("//") {
        "//"
    } else if slashed.starts_with('/') {
        "/"
    } else {
        ""
    };
    format!("{prefix}{}", components(&slashed).join("/"))
}

/// Key used for a file in the index `mapping`. Two paths share a key only
/// when they name the same file.
pub fn file_key(path: &str) -> String {
    normalize(path)
}

/// Split a path into components, resolving `.` and `..` lexically.
fn components(path: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(out.last(), Some(last) if *last != "..") {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            p => out.push(p),
        }
    }
    out
}

/// Strip the extension from the last path segment. Dot-files keep their name.
pub fn strip_extension(path: &str) -> &str {
    let seg_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[seg_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..seg_start + dot],
        _ => path,
    }
}

/// Path of `target` relative to the directory `from_dir`, slash-separated.
pub fn relative_path(from_dir: &str, target: &str) -> String {
    let from_norm = to_slashes(from_dir);
    let target_norm = to_slashes(target);
    let from = components(&from_norm);
    let to = components(&target_norm);

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = vec![".."; from.len() - common];
    parts.extend_from_slice(&to[common..]);
    parts.join("/")
}

/// Directory part of a slash-normalized path (`""` for a bare file name).
fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Force a relative specifier to start with `./` or `../`.
pub fn ensure_dot_prefix(rel: &str) -> String {
    if rel.starts_with("./") || rel.starts_with("../") {
        rel.to_string()
    } else if rel == ".." {
        "../".to_string()
    } else {
        format!("./{rel}")
    }
}

/// The import specifier the document at `document_path` should use for `file`.
///
/// Discovered modules are used verbatim. Workspace files become a relative,
/// extension-less, forward-slash path with a leading `./` or `../`.
pub fn import_specifier(document_path: &str, file: &FileRef) -> String {
    match file {
        FileRef::Discovered { specifier } => specifier.clone(),
        FileRef::Workspace { path } => {
            let doc = to_slashes(document_path);
            let rel = relative_path(parent_dir(&doc), path);
            ensure_dot_prefix(strip_extension(&rel))
        }
    }
}

/// Name a default export is indexed under: the file name without extension,
/// or the parent directory name for `index` files.
pub fn module_name(path: &str) -> Option<String> {
    let norm = to_slashes(path);
    let mut segments = norm.rsplit('/').filter(|s| !s.is_empty());
    let file_name = segments.next()?;
    let stem = strip_extension(file_name);
    if stem.eq_ignore_ascii_case(INDEX_STEM) {
        return segments.next().map(str::to_string);
    }
    Some(stem.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_file_gets_dot_slash_prefix() {
        let f = FileRef::workspace("/proj/src/utils.js");
        assert_eq!(import_specifier("/proj/src/app.js", &f), "./utils");
    }

    #[test]
    fn nested_and_parent_paths() {
        let nested = FileRef::workspace("/proj/src/components/Widget.js");
        assert_eq!(import_specifier("/proj/src/app.js", &nested), "./components/Widget");

        let up = FileRef::workspace("/proj/lib/helpers.js");
        assert_eq!(import_specifier("/proj/src/app.js", &up), "../lib/helpers");
    }

    #[test]
    fn windows_separators_render_forward_slashes() {
        let f = FileRef::workspace(r"C:\proj\src\models\user.js");
        let spec = import_specifier(r"C:\proj\src\app.js", &f);
        assert_eq!(spec, "./models/user");
        assert!(!spec.contains('\\'));
    }

    #[test]
    fn discovered_specifier_is_verbatim() {
        let f = FileRef::discovered("lodash");
        assert_eq!(import_specifier("/proj/src/app.js", &f), "lodash");
    }

    #[test]
    fn strip_extension_only_touches_last_segment() {
        assert_eq!(strip_extension("./a.b/c.js"), "./a.b/c");
        assert_eq!(strip_extension("./a.b/c"), "./a.b/c");
        assert_eq!(strip_extension(".eslintrc"), ".eslintrc");
    }

    #[test]
    fn module_name_uses_parent_for_index_files() {
        assert_eq!(module_name("/proj/components/Widget.js").as_deref(), Some("Widget"));
        assert_eq!(module_name("/proj/foo/index.js").as_deref(), Some("foo"));
        assert_eq!(module_name(r"C:\proj\foo\Index.js").as_deref(), Some("foo"));
        assert_eq!(module_name("index.js"), None);
    }

    #[test]
    fn file_key_is_the_normalized_path() {
        assert_eq!(file_key("/proj/src/a.js"), "/proj/src/a.js");
        assert_eq!(file_key(r"C:\proj\a.js"), "C:/proj/a.js");
        assert_eq!(file_key("/proj/./src/../src/a.js"), "/proj/src/a.js");
        assert_eq!(file_key(r"\\server\share\a.js"), "//server/share/a.js");
    }

    #[test]
    fn dashes_and_separators_never_share_a_key() {
        assert_ne!(
            file_key("/w/date-utils/index.js"),
            file_key("/w/date/utils-index.js")
        );
    }
}

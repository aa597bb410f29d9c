//! Context assembly for completion prompts.
//!
//! Inspects the active document and its containing project to produce a
//! bounded textual context blob: language label, indented directory tree,
//! a coarse per-file symbol index, and a code window around the cursor.
//!
//! The symbol index is regex-based and explicitly best-effort: it may both
//! miss and over-match constructs. It is not a parser, and downstream
//! prompt truncation depends on its rough output size, not its precision.
//! Every sub-step failure here is rendered as inline error text; building
//! context is read-only and never fails.

use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use tandem_core::DocumentSnapshot;

/// Hard cap on the rendered context text, truncation marker included.
pub const MAX_CONTEXT_LEN: usize = 4096;
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Code window bounds around the cursor line.
pub const WINDOW_LINES_BEFORE: usize = 100;
pub const WINDOW_LINES_AFTER: usize = 50;

/// Extensions whose direct-child files feed the symbol index.
const SOURCE_EXTENSIONS: &[&str] = &[
    "js", "ts", "py", "scala", "c", "java", "rb", "php", "go", "rs", "swift", "kt", "cs",
];

/// Bounded textual snapshot of project/file state attached to a prompt.
/// Ephemeral: recomputed once per triggering editor interaction.
#[derive(Debug, Clone, Default)]
pub struct ContextBlob {
    pub language_label: String,
    pub directory_tree: String,
    pub file_symbol_index: String,
    pub code_window: String,
}

impl ContextBlob {
    /// Sentinel blob for the no-active-document case.
    pub fn no_active_file() -> Self {
        Self::default()
    }

    fn is_no_active_file(&self) -> bool {
        self.language_label.is_empty() && self.directory_tree.is_empty()
    }

    /// Render the project context (language, tree, symbol index), hard-capped
    /// at [`MAX_CONTEXT_LEN`] characters. The truncation marker is present
    /// exactly when the raw assembled text exceeded the cap, and counts
    /// against it.
    pub fn context_text(&self) -> String {
        if self.is_no_active_file() {
            return "Context:\nNo active file\n".to_string();
        }
        let raw = format!(
            "Context:\nLanguage: {}\n{}{}",
            self.language_label, self.directory_tree, self.file_symbol_index
        );
        truncate_context(raw)
    }
}

/// Build the context blob for the active document, if any.
///
/// The project root falls back to the file's own directory when no
/// workspace root is known.
pub fn build_context(
    doc: Option<&DocumentSnapshot>,
    workspace_root: Option<&Path>,
) -> ContextBlob {
    let Some(doc) = doc else {
        return ContextBlob::no_active_file();
    };

    let root: PathBuf = workspace_root
        .map(Path::to_path_buf)
        .or_else(|| doc.path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    ContextBlob {
        language_label: language_label(&doc.path).to_string(),
        directory_tree: directory_tree(&root),
        file_symbol_index: file_symbol_index(&root),
        code_window: code_window(doc),
    }
}

fn language_label(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "js" => "JavaScript",
        "ts" => "TypeScript",
        "py" => "Python",
        "java" => "Java",
        "html" => "HTML",
        "css" => "CSS",
        "cpp" => "C++",
        "c" => "C",
        "scala" => "Scala",
        "rb" => "Ruby",
        "php" => "PHP",
        "go" => "Go",
        "rs" => "Rust",
        "swift" => "Swift",
        "kt" => "Kotlin",
        "m" => "Objective-C",
        "cs" => "C#",
        "vb" => "Visual Basic",
        "pl" => "Perl",
        "lua" => "Lua",
        _ => "Unknown",
    }
}

/// Indented recursive listing of the project root. Unreadable entries are
/// recorded as inline error lines rather than aborting the walk.
fn directory_tree(root: &Path) -> String {
    let mut tree = String::from("Directory Tree:\n");
    for entry in WalkBuilder::new(root).hidden(false).build() {
        match entry {
            Ok(entry) => {
                if entry.depth() == 0 {
                    continue;
                }
                let name = entry.file_name().to_string_lossy();
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                let indent = "  ".repeat(entry.depth() - 1);
                tree.push_str(&indent);
                tree.push_str(&name);
                if is_dir {
                    tree.push('/');
                }
                tree.push('\n');
            }
            Err(err) => {
                tree.push_str(&format!("Error reading directory: {err}\n"));
            }
        }
    }
    tree
}

/// Coarse symbol index over the root's direct child source files.
fn file_symbol_index(root: &Path) -> String {
    let patterns = build_symbol_patterns();
    let mut out = String::new();

    let mut children = match std::fs::read_dir(root) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect::<Vec<_>>(),
        Err(err) => {
            return format!("Error reading directory: {err}\n");
        }
    };
    children.sort();

    for path in children {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !path.is_file() || !SOURCE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        out.push_str(&extract_file_symbols(&path, &patterns));
    }
    out
}

/// Declaration heuristics carried over from the original extension, warts
/// and all: they miss Rust `fn` items and over-match inside strings.
fn build_symbol_patterns() -> Vec<(&'static str, Regex)> {
    vec![
        (
            "Class/Trait/Interface",
            Regex::new(
                r#"(?:class|trait|interface)\s+(\w+)(?:\s+(?:extends|implements)\s+(?:\w+(?:,\s*\w+)*))?\s*\{"#,
            )
            .unwrap(),
        ),
        (
            "Function/Method",
            Regex::new(r#"(?:def|function|func)\s+(\w+)\s*\([^)]*\)\s*(?:->|\{|:)"#).unwrap(),
        ),
        ("Variable", Regex::new(r#"(?:let|var|const)\s+(\w+)\s*(?:=|:)"#).unwrap()),
    ]
}

fn extract_file_symbols(path: &Path, patterns: &[(&'static str, Regex)]) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out = format!("File: {name}\n");

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            out.push_str(&format!("  Error reading file: {err}\n"));
            return out;
        }
    };

    for (label, pattern) in patterns {
        for caps in pattern.captures_iter(&content) {
            if let Some(ident) = caps.get(1) {
                out.push_str(&format!("  {label}: {}\n", ident.as_str()));
            }
        }
    }
    out
}

/// Up to [`WINDOW_LINES_BEFORE`] lines before and [`WINDOW_LINES_AFTER`]
/// lines after the cursor, clipped to document bounds.
fn code_window(doc: &DocumentSnapshot) -> String {
    let lines: Vec<&str> = doc.text.lines().collect();
    if lines.is_empty() {
        return "Code:\n".to_string();
    }
    let cursor = (doc.cursor.line as usize).min(lines.len() - 1);
    let start = cursor.saturating_sub(WINDOW_LINES_BEFORE);
    let end = (cursor + WINDOW_LINES_AFTER).min(lines.len() - 1);
    format!("Code:\n{}", lines[start..=end].join("\n"))
}

fn truncate_context(raw: String) -> String {
    if raw.chars().count() <= MAX_CONTEXT_LEN {
        return raw;
    }
    let budget = MAX_CONTEXT_LEN - TRUNCATION_MARKER.chars().count();
    let mut out: String = raw.chars().take(budget).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tandem_core::TextPosition;
    use tempfile::TempDir;

    fn doc_at(path: &Path, text: &str, line: u32) -> DocumentSnapshot {
        DocumentSnapshot {
            path: path.to_path_buf(),
            language_id: String::new(),
            text: text.to_string(),
            cursor: TextPosition::new(line, 0),
        }
    }

    #[test]
    fn no_active_document_yields_sentinel_blob() {
        let blob = build_context(None, None);
        assert_eq!(blob.context_text(), "Context:\nNo active file\n");
        assert!(blob.code_window.is_empty());
    }

    #[test]
    fn builds_tree_language_and_symbols() {
        let dir = TempDir::new().expect("tempdir");
        fs::create_dir(dir.path().join("src")).expect("mkdir");
        fs::write(dir.path().join("src/deep.ts"), "export {}\n").expect("write");
        fs::write(
            dir.path().join("app.ts"),
            "class Widget {\nfunction render(props) {\nlet count = 0;\n",
        )
        .expect("write");
        fs::write(dir.path().join("notes.md"), "# not source\n").expect("write");

        let doc = doc_at(&dir.path().join("app.ts"), "class Widget {}", 0);
        let blob = build_context(Some(&doc), Some(dir.path()));
        let text = blob.context_text();

        assert!(text.starts_with("Context:\nLanguage: TypeScript\n"));
        assert!(blob.directory_tree.contains("src/"));
        assert!(blob.directory_tree.contains("  deep.ts"));
        assert!(blob.file_symbol_index.contains("File: app.ts"));
        assert!(blob.file_symbol_index.contains("  Class/Trait/Interface: Widget"));
        assert!(blob.file_symbol_index.contains("  Function/Method: render"));
        assert!(blob.file_symbol_index.contains("  Variable: count"));
        // Non-source files are listed in the tree but not symbol-indexed.
        assert!(blob.directory_tree.contains("notes.md"));
        assert!(!blob.file_symbol_index.contains("notes.md"));
    }

    #[test]
    fn symbol_extraction_is_best_effort() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("lib.rs"), "pub fn sum(a: i32) -> i32 { a }\n").expect("write");
        let doc = doc_at(&dir.path().join("lib.rs"), "", 0);
        let blob = build_context(Some(&doc), Some(dir.path()));
        // The heuristic does not know Rust's `fn` keyword; the file still
        // gets its header line.
        assert!(blob.file_symbol_index.contains("File: lib.rs"));
        assert!(!blob.file_symbol_index.contains("Function/Method: sum"));
    }

    #[test]
    fn context_text_never_exceeds_cap_and_marks_truncation() {
        let dir = TempDir::new().expect("tempdir");
        let mut big = String::new();
        for i in 0..2000 {
            big.push_str(&format!("let variable_number_{i} = {i};\n"));
        }
        fs::write(dir.path().join("big.js"), &big).expect("write");

        let doc = doc_at(&dir.path().join("big.js"), &big, 0);
        let blob = build_context(Some(&doc), Some(dir.path()));
        let text = blob.context_text();
        assert!(text.chars().count() <= MAX_CONTEXT_LEN);
        assert!(text.ends_with(TRUNCATION_MARKER));

        let small = build_context(
            Some(&doc_at(&dir.path().join("missing.js"), "", 0)),
            Some(dir.path().join("src").as_path()),
        );
        assert!(!small.context_text().contains(TRUNCATION_MARKER));
    }

    #[test]
    fn falls_back_to_file_directory_without_workspace_root() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("only.py"), "def here():\n    pass\n").expect("write");
        let doc = doc_at(&dir.path().join("only.py"), "def here():", 0);
        let blob = build_context(Some(&doc), None);
        assert!(blob.directory_tree.contains("only.py"));
    }

    #[test]
    fn unreadable_root_becomes_inline_error_text() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("gone");
        let doc = doc_at(&missing.join("a.ts"), "", 0);
        let blob = build_context(Some(&doc), Some(&missing));
        assert!(blob.file_symbol_index.starts_with("Error reading directory:"));
    }

    #[test]
    fn code_window_clips_to_document_bounds() {
        let text: String = (0..200).map(|i| format!("line {i}\n")).collect();
        let doc = doc_at(Path::new("w.ts"), &text, 150);
        let window = code_window(&doc);
        assert!(window.starts_with("Code:\nline 50"));
        assert!(window.ends_with("line 199"));
        assert!(!window.contains("line 49\n"));

        let top = code_window(&doc_at(Path::new("w.ts"), &text, 0));
        assert!(top.starts_with("Code:\nline 0"));
        assert!(top.ends_with("line 50"));
    }

    #[test]
    fn cursor_past_end_is_clamped() {
        let doc = doc_at(Path::new("w.ts"), "only line\n", 40);
        assert_eq!(code_window(&doc), "Code:\nonly line");
    }
}

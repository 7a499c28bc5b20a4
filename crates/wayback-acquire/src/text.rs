use anyhow::{Context, Result};
use scraper::{Html, Node};
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;
use wayback_model::SnapshotStore;

/// Elements whose text never reaches the page reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new line of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "hr", "li", "ul", "ol", "tr", "table", "section", "article", "header",
    "footer", "nav", "aside", "main", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote",
    "dt", "dd", "form", "title",
];

/// Counts from one HTML-to-text pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextConversion {
    pub written: usize,
    pub failed: usize,
    pub text_dir: PathBuf,
}

/// Extract the visible text of an HTML document.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    // The title lives in <head>, which is otherwise skipped
    if let Some(title) = document
        .tree
        .root()
        .descendants()
        .find(|n| matches!(n.value(), Node::Element(e) if e.name() == "title"))
    {
        walk_node(title.id(), &document.tree, &mut out);
        out.push('\n');
    }

    walk_node(document.tree.root().id(), &document.tree, &mut out);

    tidy_lines(&out)
}

/// Lay out walked text one paragraph per line: NFC so captures made by
/// different encoders compare equal, right-trimmed lines, at most one blank
/// line between paragraphs and none at either end.
fn tidy_lines(raw: &str) -> String {
    let nfc: String = raw.nfc().collect();
    let mut lines: Vec<&str> = Vec::new();

    for line in nfc.lines().map(str::trim_end) {
        let blank = line.trim_start().is_empty();
        match lines.last() {
            None if blank => {}
            Some(prev) if blank && prev.is_empty() => {}
            _ => lines.push(if blank { "" } else { line }),
        }
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn walk_node(node_id: ego_tree::NodeId, tree: &ego_tree::Tree<Node>, out: &mut String) {
    let Some(node) = tree.get(node_id) else {
        return;
    };

    match node.value() {
        Node::Text(text) => out.push_str(text.deref()),
        Node::Element(elem) => {
            let tag = elem.name();
            if HIDDEN_ELEMENTS.contains(&tag) {
                return;
            }
            let block = BLOCK_ELEMENTS.contains(&tag);
            if block {
                out.push('\n');
            }
            for child in node.children() {
                walk_node(child.id(), tree, out);
            }
            if block {
                out.push('\n');
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                walk_node(child.id(), tree, out);
            }
        }
        _ => {}
    }
}

/// Saved `.html` snapshots directly in the store's folder, sorted by name.
pub fn html_files(store: &SnapshotStore) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(store.folder())
        .with_context(|| format!("Failed to list {}", store.folder().display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();
    Ok(files)
}

/// Write a `.txt` companion for every `.html` file directly in the store's
/// folder, into the store's text directory.
///
/// Processes whatever is on disk at call time. A file that can't be read or
/// written is logged and counted as failed; the pass carries on.
pub fn convert_folder(store: &SnapshotStore) -> Result<TextConversion> {
    let text_dir = store.text_dir();
    fs::create_dir_all(&text_dir)
        .with_context(|| format!("Failed to create {}", text_dir.display()))?;

    let html_files = html_files(store)?;

    tracing::info!(
        files = html_files.len(),
        dir = %text_dir.display(),
        "Converting snapshots to text"
    );

    let mut result = TextConversion {
        text_dir,
        ..TextConversion::default()
    };
    for html_path in &html_files {
        match convert_file(store, html_path) {
            Ok(txt_path) => {
                tracing::debug!(path = %txt_path.display(), "Wrote text file");
                result.written += 1;
            }
            Err(e) => {
                tracing::warn!(path = %html_path.display(), error = %e, "Failed to convert snapshot");
                result.failed += 1;
            }
        }
    }

    Ok(result)
}

fn convert_file(store: &SnapshotStore, html_path: &Path) -> Result<PathBuf> {
    let bytes = fs::read(html_path)?;
    let text = html_to_text(&String::from_utf8_lossy(&bytes));
    let txt_path = store
        .text_path_for(html_path)
        .with_context(|| format!("No file name in {}", html_path.display()))?;
    fs::write(&txt_path, text)?;
    Ok(txt_path)
}

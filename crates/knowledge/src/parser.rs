//! Document loading and text extraction.
//!
//! Turns files on disk into [`Document`]s for the chunker. Cleaning keeps
//! blank-line paragraph boundaries intact since the chunker splits on them.

use crate::types::Document;
use pitchsim_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions picked up when walking a directory with no explicit filter.
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "html", "htm"];

/// Elements that start a new paragraph when stripped from HTML.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "main", "aside", "nav", "h1", "h2",
    "h3", "h4", "h5", "h6", "li", "ul", "ol", "tr", "table", "blockquote", "pre", "hr",
];

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    Html,
    PlainText,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            Some("txt") | Some("text") => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::PlainText => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// Read a file and extract its text. The file name becomes the document name.
pub fn load_document(path: &Path) -> AppResult<Document> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::Other(format!("Failed to read {:?}: {}", path, e)))?;

    if bytes.contains(&0) {
        return Err(AppError::Other(format!(
            "Binary file not supported: {:?}",
            path
        )));
    }

    let raw = String::from_utf8(bytes)
        .map_err(|_| AppError::Other(format!("File is not valid UTF-8 text: {:?}", path)))?;

    let content = match ContentType::from_path(path) {
        ContentType::Markdown => clean_markdown(&raw),
        ContentType::Html => clean_html(&raw),
        ContentType::PlainText | ContentType::Unknown => raw.trim().to_string(),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(Document { filename, content })
}

/// Load every document under `paths`.
///
/// Files given directly are always loaded. Directories are walked in
/// file-name order and only files whose extension is in `extensions`
/// (case-insensitive; [`DEFAULT_EXTENSIONS`] when empty) are loaded, named
/// by their path relative to the directory. Files that fail to load during
/// a walk are skipped with a warning.
pub fn collect_documents(paths: &[PathBuf], extensions: &[String]) -> AppResult<Vec<Document>> {
    let extensions: Vec<String> = if extensions.is_empty() {
        DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
    } else {
        extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect()
    };

    let mut documents = Vec::new();

    for path in paths {
        if path.is_file() {
            documents.push(load_document(path)?);
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if !entry.file_type().is_file() || !has_extension(entry_path, &extensions) {
                    continue;
                }

                match load_document(entry_path) {
                    Ok(mut doc) => {
                        if let Ok(relative) = entry_path.strip_prefix(path) {
                            doc.filename = relative
                                .components()
                                .map(|c| c.as_os_str().to_string_lossy())
                                .collect::<Vec<_>>()
                                .join("/");
                        }
                        documents.push(doc);
                    }
                    Err(e) => tracing::warn!("Skipping {:?}: {}", entry_path, e),
                }
            }
        } else {
            return Err(AppError::Other(format!("Path not found: {:?}", path)));
        }
    }

    tracing::debug!("Collected {} documents from {} paths", documents.len(), paths.len());

    Ok(documents)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Strip heading markers, fences and rules from markdown.
fn clean_markdown(text: &str) -> String {
    let lines = text.lines().filter_map(|line| {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") || is_rule(trimmed) {
            return None;
        }
        Some(strip_heading(trimmed))
    });
    join_paragraphs(lines)
}

fn strip_heading(line: &str) -> &str {
    let rest = line.trim_start_matches('#');
    if rest.len() != line.len() && (rest.is_empty() || rest.starts_with(' ')) {
        rest.trim()
    } else {
        line
    }
}

fn is_rule(line: &str) -> bool {
    let compact: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|marker| compact.iter().all(|c| c == marker))
}

/// Strip tags from HTML, dropping script and style bodies.
fn clean_html(text: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `text`
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(rel) = text[pos..].find('<') {
        let start = pos + rel;
        out.push_str(&text[pos..start]);

        let Some(rel_end) = text[start..].find('>') else {
            out.push_str(&text[start..]);
            pos = text.len();
            break;
        };
        let end = start + rel_end;
        let inner = &lower[start + 1..end];
        let closing = inner.starts_with('/');
        let name = inner
            .trim_start_matches('/')
            .split(|c: char| c.is_whitespace() || c == '/')
            .next()
            .unwrap_or("");
        pos = end + 1;

        if !closing && (name == "script" || name == "style") {
            let terminator = format!("</{}", name);
            pos = match lower[pos..].find(&terminator) {
                Some(rel_close) => {
                    let close = pos + rel_close;
                    lower[close..]
                        .find('>')
                        .map(|r| close + r + 1)
                        .unwrap_or(text.len())
                }
                None => text.len(),
            };
        } else if BLOCK_TAGS.contains(&name) {
            out.push_str("\n\n");
        } else if name == "br" {
            out.push('\n');
        }
    }
    out.push_str(&text[pos..]);

    let decoded = decode_entities(&out);
    decoded
        .split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Join lines, collapsing runs of blank lines into one paragraph break.
fn join_paragraphs<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    let mut pending_break = false;

    for line in lines {
        if line.is_empty() {
            pending_break = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_break { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        pending_break = false;
    }

    out
}

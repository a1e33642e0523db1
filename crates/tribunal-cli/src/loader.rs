//! Loads evaluation items from CSV, JSON and DOCX files.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file format '{0}'")]
    UnsupportedFormat(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} must contain a top-level JSON array")]
    NotAList(String),

    #[error("Invalid DOCX: {0}")]
    Docx(String),
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io { path: path.display().to_string(), source }
    }
}

/// Loads raw items, dispatching on the file extension.
pub fn load_items(path: &Path) -> Result<Vec<Value>, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let items = match extension.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "docx" => load_docx(path)?,
        other => return Err(LoadError::UnsupportedFormat(format!(".{}", other))),
    };
    info!("Loaded {} items from {}", items.len(), path.display());
    Ok(items)
}

/// One item per row; the header row names the fields. Values stay strings.
pub fn load_csv(path: &Path) -> Result<Vec<Value>, LoadError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    reader
        .records()
        .map(|record| {
            let record = record?;
            let fields: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect();
            Ok(Value::Object(fields))
        })
        .collect()
}

pub fn load_json(path: &Path) -> Result<Vec<Value>, LoadError> {
    let content = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    match serde_json::from_str(&content)? {
        Value::Array(items) => Ok(items),
        _ => Err(LoadError::NotAList(path.display().to_string())),
    }
}

/// First paragraph is the prompt, the rest joined by newlines the response.
pub fn load_docx(path: &Path) -> Result<Vec<Value>, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| LoadError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| LoadError::Docx(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| LoadError::io(path, e))?;

    let paragraphs = docx_paragraphs(&xml)?;
    let Some((prompt, rest)) = paragraphs.split_first().filter(|_| paragraphs.len() >= 2) else {
        warn!("DOCX file '{}' has less than 2 paragraphs", path.display());
        return Ok(Vec::new());
    };

    let mut item = Map::new();
    item.insert("prompt".into(), Value::String(prompt.clone()));
    item.insert("response".into(), Value::String(rest.join("\n")));
    Ok(vec![Value::Object(item)])
}

/// Extracts the text of each top-level paragraph of a WordprocessingML body.
///
/// Paragraphs inside tables and text boxes are not part of the body flow and
/// are skipped.
pub fn docx_paragraphs(xml: &str) -> Result<Vec<String>, LoadError> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event().map_err(|e| LoadError::Docx(e.to_string()))? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"w:p" && in_body(&open) {
                    current = Some(String::new());
                }
                open.push(name);
            }
            Event::End(_) => {
                let closed = open.pop();
                if closed.as_deref() == Some(&b"w:p"[..]) && in_body(&open) {
                    paragraphs.extend(current.take());
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" if in_body(&open) => paragraphs.push(String::new()),
                b"w:tab" => push_run_text(&open, &mut current, "\t"),
                b"w:br" | b"w:cr" => push_run_text(&open, &mut current, "\n"),
                _ => {}
            },
            Event::Text(t) if open.last().is_some_and(|n| n == b"w:t") => {
                let text = t.unescape().map_err(|e| LoadError::Docx(e.to_string()))?;
                push_run_text(&open, &mut current, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

fn in_body(open: &[Vec<u8>]) -> bool {
    open.last().is_some_and(|n| n == b"w:body")
}

/// Appends text only when the innermost paragraph is the current body paragraph.
fn push_run_text(open: &[Vec<u8>], current: &mut Option<String>, text: &str) {
    let depth = open.iter().filter(|n| n.as_slice() == b"w:p").count();
    if let Some(p) = current.as_mut().filter(|_| depth == 1) {
        p.push_str(text);
    }
}

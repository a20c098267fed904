//! Reads an HTML or DocBook export into a `StructuredDocument`.
//!
//! Tag-level parsing only: paragraphs and tables, in document order. Cell
//! line breaks are kept as ` <br> ` so multi-line cells stay on one row.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;

use crate::pipeline::extraction::{Block, DocumentReader, ExtractionError, StructuredDocument};

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<(?:table|informaltable)\b[^>]*>(?P<table>.*?)</(?:table|informaltable)\s*>|<(?:p|para)\b[^>]*>(?P<para>.*?)</(?:p|para)\s*>",
    )
    .expect("valid regex")
});
static ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:tr|row)\b[^>]*>(.*?)</(?:tr|row)\s*>").expect("valid regex")
});
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:td|th|entry)\b[^>]*>(.*?)</(?:td|th|entry)\s*>").expect("valid regex")
});
static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p\s*>|</para\s*>").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static TABLE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(?:table|informaltable)\b").expect("valid regex"));

/// Reads structured copies from local files.
pub struct HtmlDocumentReader;

impl DocumentReader for HtmlDocumentReader {
    fn read(&self, reference: &str) -> Result<StructuredDocument, ExtractionError> {
        let markup = fs::read_to_string(reference).map_err(|e| ExtractionError::Document {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;
        let document = parse_markup(&markup);
        if document.is_empty() {
            return Err(ExtractionError::Document {
                reference: reference.to_string(),
                reason: "no paragraphs or tables found".into(),
            });
        }
        Ok(document)
    }
}

pub fn parse_markup(markup: &str) -> StructuredDocument {
    StructuredDocument {
        header: Vec::new(),
        body: parse_blocks(markup),
        footer: Vec::new(),
    }
}

fn parse_blocks(markup: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    for caps in BLOCK_RE.captures_iter(markup) {
        if let Some(table) = caps.name("table") {
            blocks.push(Block::Table(parse_rows(table.as_str())));
        } else if let Some(para) = caps.name("para") {
            let inner = para.as_str();
            // DocBook wraps tables in a paragraph.
            if TABLE_OPEN_RE.is_match(inner) {
                blocks.extend(parse_blocks(inner));
                continue;
            }
            let text = collapse_whitespace(&decode_entities(&TAG_RE.replace_all(inner, " ")));
            if !text.is_empty() {
                blocks.push(Block::Paragraph(text));
            }
        }
    }
    blocks
}

fn parse_rows(table: &str) -> Vec<Vec<String>> {
    ROW_RE
        .captures_iter(table)
        .filter_map(|row| row.get(1))
        .map(|row| {
            CELL_RE
                .captures_iter(row.as_str())
                .filter_map(|cell| cell.get(1))
                .map(|cell| cell_text(cell.as_str()))
                .collect()
        })
        .collect()
}

fn cell_text(raw: &str) -> String {
    let with_breaks = BREAK_RE.replace_all(raw, "\n");
    let plain = decode_entities(&TAG_RE.replace_all(&with_breaks, " "));
    plain
        .lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" <br> ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

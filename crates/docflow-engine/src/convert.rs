//! Generic document-to-markdown converter.
//!
//! The in-process fallback engine for everything the specialized engines do
//! not claim: plain text, Markdown passthrough, CSV/TSV tables, and a basic
//! HTML-to-text conversion. Office formats are expected to be converted by a
//! dedicated external tool in deployments that need them; this engine covers
//! the text-adjacent tail.

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::engine::{Engine, ParseOutput};
use crate::error::EngineError;

pub struct MarkdownConvertEngine;

impl MarkdownConvertEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownConvertEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MarkdownConvertEngine {
    fn name(&self) -> &str {
        "markdown"
    }

    fn description(&self) -> &str {
        "Generic document-to-markdown converter for text, CSV and HTML files"
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown", "csv", "tsv", "html", "htm", "log"]
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn parse(
        &self,
        input: &Path,
        output_dir: &Path,
        _options: &Value,
    ) -> Result<ParseOutput, EngineError> {
        let bytes = tokio::fs::read(input).await?;
        let text = String::from_utf8(bytes).map_err(|_| {
            EngineError::Failed(format!(
                "File '{}' is not text; no converter handles this format",
                input.display()
            ))
        })?;

        let ext = input
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let markdown = match ext.as_str() {
            "csv" => delimited_to_table(&text, ','),
            "tsv" => delimited_to_table(&text, '\t'),
            "html" | "htm" => strip_html(&text),
            _ => text,
        };

        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("document");
        let output_file = output_dir.join(format!("{}.md", stem));
        tokio::fs::write(&output_file, markdown).await?;

        debug!(output = %output_file.display(), "Markdown conversion complete");
        Ok(ParseOutput {
            markdown_path: Some(output_file),
            json_path: None,
        })
    }
}

/// Render delimited text as a Markdown table, first row as header.
fn delimited_to_table(text: &str, delimiter: char) -> String {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return String::new();
    };

    let cells = |line: &str| -> Vec<String> {
        line.split(delimiter)
            .map(|c| c.trim().replace('|', "\\|"))
            .collect()
    };

    let header_cells = cells(header);
    let mut out = format!("| {} |\n", header_cells.join(" | "));
    out.push_str(&format!(
        "|{}\n",
        " --- |".repeat(header_cells.len())
    ));
    for line in lines {
        out.push_str(&format!("| {} |\n", cells(line).join(" | ")));
    }
    out
}

/// Drop tags and decode the handful of entities that matter for text content.
fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag = String::new();

    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_ascii_lowercase();
                if matches!(name.as_str(), "p" | "br" | "div" | "li" | "tr" | "h1" | "h2" | "h3") {
                    out.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => out.push(ch),
        }
    }

    let decoded = out
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");

    // Collapse runs of blank lines left behind by block tags.
    let mut result = String::with_capacity(decoded.len());
    let mut blank_run = 0;
    for line in decoded.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result.trim().to_string()
}

//! Extractors for non-HTML payloads: PDF, JSON, tabular and plain text.

use serde_json::Value;

use super::{ExtractError, ExtractedMetadata, Extraction, TextExtractor};

/// Top-level JSON fields tried, in order, for a title
const JSON_TITLE_FIELDS: &[&str] = &["title", "headline", "name"];

fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .to_string()
}

/// Collapse runs of blank lines and trailing whitespace
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ExtractError> {
        // The PDF parser can panic on malformed input
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(raw))
            .map_err(|_| ExtractError::Pdf("parser panicked on malformed input".into()))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        let body_text = tidy_lines(&text);
        if body_text.is_empty() {
            return Err(ExtractError::Empty("PDF contains no extractable text".into()));
        }
        Ok(Extraction {
            title: first_line(&body_text),
            body_text,
            metadata: ExtractedMetadata::default(),
            error: None,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonExtractor;

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn json_title(value: &Value) -> Option<String> {
    let object = match value {
        Value::Object(map) => map,
        Value::Array(items) => items.first()?.as_object()?,
        _ => return None,
    };
    JSON_TITLE_FIELDS
        .iter()
        .filter_map(|field| object.get(*field)?.as_str())
        .map(str::trim)
        .find(|title| !title.is_empty())
        .map(str::to_string)
}

impl TextExtractor for JsonExtractor {
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ExtractError> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| ExtractError::Json(e.to_string()))?;

        let records: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let body_text = records
            .into_iter()
            .map(|record| {
                let mut strings = Vec::new();
                collect_strings(record, &mut strings);
                strings.join(" ")
            })
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let mut metadata = ExtractedMetadata::default();
        if let Value::Object(map) = &value {
            metadata.description = map
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            metadata.published_at = ["published_at", "datePublished", "date"]
                .iter()
                .find_map(|field| map.get(*field)?.as_str())
                .map(str::to_string);
        }

        Ok(Extraction {
            title: json_title(&value).unwrap_or_default(),
            body_text,
            metadata,
            error: None,
        })
    }
}

/// Comma, tab or semicolon separated records; the first row is the header
#[derive(Debug, Default, Clone, Copy)]
pub struct TabularExtractor;

fn detect_delimiter(header: &str) -> char {
    // max_by_key keeps the last maximum, so ties resolve to a comma
    [';', '\t', ',']
        .into_iter()
        .max_by_key(|d| header.matches(*d).count())
        .unwrap_or(',')
}

fn split_cells(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter)
        .map(|cell| cell.trim().trim_matches('"').trim().to_string())
        .collect()
}

impl TextExtractor for TabularExtractor {
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ExtractError> {
        let text = String::from_utf8_lossy(raw);
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let Some(header) = lines.next() else {
            return Err(ExtractError::Empty("table has no rows".into()));
        };
        let delimiter = detect_delimiter(header);
        let columns: Vec<String> = split_cells(header, delimiter)
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();

        let body_text = lines
            .map(|line| {
                split_cells(line, delimiter)
                    .into_iter()
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|row| !row.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Extraction {
            title: String::new(),
            body_text,
            metadata: ExtractedMetadata {
                columns,
                ..ExtractedMetadata::default()
            },
            error: None,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ExtractError> {
        let text = String::from_utf8_lossy(raw);
        let text = text.trim_start_matches('\u{feff}');
        let body_text = tidy_lines(text);
        Ok(Extraction {
            title: first_line(&body_text),
            body_text,
            metadata: ExtractedMetadata::default(),
            error: None,
        })
    }
}

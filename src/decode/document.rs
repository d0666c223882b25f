//! Raw Document Parsing
//!
//! Turns raw bytes (JSON or YAML) into a `serde_json::Value`. YAML input is
//! converted to the JSON data model up front so the typed decode only ever
//! deals with one representation.

use log::debug;
use serde_json::Value;

use crate::error::DecodeError;

/// Longest fragment quoted in a syntax error.
const FRAGMENT_WIDTH: usize = 40;

/// Serialization format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Guesses the format from the first non-whitespace character.
    pub fn sniff(text: &str) -> Self {
        match text.trim_start().chars().next() {
            Some('{') | Some('[') => Self::Json,
            _ => Self::Yaml,
        }
    }

    /// Format implied by a file extension, if any.
    pub fn from_extension(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Some(Self::Yaml)
        } else if lower.ends_with(".json") {
            Some(Self::Json)
        } else {
            None
        }
    }
}

/// Parses a document, sniffing its format.
pub fn parse(bytes: &[u8], path: &str) -> Result<Value, DecodeError> {
    parse_as(bytes, None, path)
}

/// Parses a document in the given format (or a sniffed one).
pub fn parse_as(
    bytes: &[u8],
    format: Option<DocumentFormat>,
    path: &str,
) -> Result<Value, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Syntax {
        path: path.to_string(),
        fragment: String::new(),
        message: format!("input is not valid UTF-8: {}", e),
    })?;

    let format = format.unwrap_or_else(|| DocumentFormat::sniff(text));
    debug!("Parsing {} as {:?} ({} bytes)", path, format, bytes.len());

    match format {
        DocumentFormat::Json => serde_json::from_str(text).map_err(|e| DecodeError::Syntax {
            path: path.to_string(),
            fragment: fragment_at(text, e.line(), e.column()),
            message: e.to_string(),
        }),
        DocumentFormat::Yaml => serde_yaml::from_str(text).map_err(|e| {
            let fragment = e
                .location()
                .map(|loc| fragment_at(text, loc.line(), loc.column()))
                .unwrap_or_default();
            DecodeError::Syntax {
                path: path.to_string(),
                fragment,
                message: e.to_string(),
            }
        }),
    }
}

/// Extracts the text around a 1-based line/column position.
fn fragment_at(text: &str, line: usize, column: usize) -> String {
    let Some(source_line) = text.lines().nth(line.saturating_sub(1)) else {
        return String::new();
    };

    let chars: Vec<char> = source_line.chars().collect();
    let center = column.saturating_sub(1).min(chars.len());
    let start = center.saturating_sub(FRAGMENT_WIDTH / 2);
    let end = (start + FRAGMENT_WIDTH).min(chars.len());

    chars[start..end].iter().collect::<String>().trim().to_string()
}

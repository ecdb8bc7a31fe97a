//! Conversion of raw recipe payloads into the canonical recipe record.
//!
//! Every payload format produces a [`RecipeDraft`]; [`RecipeDraft::finish`]
//! applies the shared rules (required name, derived total time, tag
//! de-duplication) so the format parsers only deal with layout.

mod cooklang;
mod json;
mod markdown;
pub mod time;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default upper bound on a single payload
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Json,
    Yaml,
    Markdown,
    PlainText,
    Cooklang,
}

impl PayloadFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(PayloadFormat::Json),
            "yaml" | "yml" => Some(PayloadFormat::Yaml),
            "md" | "markdown" => Some(PayloadFormat::Markdown),
            "txt" => Some(PayloadFormat::PlainText),
            "cook" => Some(PayloadFormat::Cooklang),
            _ => None,
        }
    }

    /// Detect the format of a file path (or URL path) from its extension
    pub fn from_path(path: &str) -> Option<Self> {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PayloadFormat::Json => "json",
            PayloadFormat::Yaml => "yaml",
            PayloadFormat::Markdown => "markdown",
            PayloadFormat::PlainText => "text",
            PayloadFormat::Cooklang => "cooklang",
        }
    }
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unparsed recipe as delivered by a repository source
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// Path or URL identifying the payload inside its repository
    pub location: String,
    pub format: PayloadFormat,
    pub content: String,
}

impl RawPayload {
    pub fn new(location: impl Into<String>, format: PayloadFormat, content: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            format,
            content: content.into(),
        }
    }
}

/// Canonical recipe produced by the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecipe {
    pub name: String,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub cook_time_minutes: Option<i64>,
    pub total_time_minutes: Option<i64>,
    pub servings: Option<i64>,
    pub ingredients: Vec<String>,
    pub directions: Vec<String>,
    pub tags: Vec<String>,
    pub rating: Option<f64>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("recipe has no name")]
    MissingName,

    #[error("malformed {format} payload: {message}")]
    Malformed {
        format: PayloadFormat,
        message: String,
    },

    #[error("payload is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("unsupported payload: {0}")]
    Unsupported(String),
}

/// Field values collected by a format parser before validation
#[derive(Debug, Default)]
pub(crate) struct RecipeDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub prep_time_minutes: Option<i64>,
    pub cook_time_minutes: Option<i64>,
    pub servings: Option<i64>,
    pub ingredients: Vec<String>,
    pub directions: Vec<String>,
    pub tags: Vec<String>,
    pub rating: Option<f64>,
}

impl RecipeDraft {
    /// Apply one `key: value` metadata pair shared by the text formats.
    /// Returns false when the key is not recognised.
    pub fn apply_metadata(&mut self, key: &str, value: &str) -> bool {
        let key = key.trim().to_lowercase().replace(['_', '-'], " ");
        let value = value.trim();

        match key.as_str() {
            "title" | "name" => self.name = Some(value.to_string()),
            "description" | "summary" => self.description = Some(value.to_string()),
            "prep time" | "prep" | "preptime" | "preparation time" => {
                self.prep_time_minutes = time::parse_duration(value)
            }
            "cook time" | "cook" | "cooktime" | "cooking time" => {
                self.cook_time_minutes = time::parse_duration(value)
            }
            "servings" | "serves" | "yield" | "portions" => self.servings = parse_servings(value),
            "tags" | "keywords" | "categories" | "category" => {
                self.tags.extend(split_tags(value));
            }
            "rating" => self.rating = value.parse().ok(),
            _ => return false,
        }
        true
    }

    pub fn finish(self) -> Result<NormalizedRecipe, NormalizationError> {
        let name = self
            .name
            .map(|n| clean_text(&n))
            .filter(|n| !n.is_empty())
            .ok_or(NormalizationError::MissingName)?;

        let total_time_minutes = match (self.prep_time_minutes, self.cook_time_minutes) {
            (Some(prep), Some(cook)) => prep.checked_add(cook),
            _ => None,
        };

        Ok(NormalizedRecipe {
            name,
            description: self
                .description
                .map(|d| clean_text(&d))
                .filter(|d| !d.is_empty()),
            prep_time_minutes: self.prep_time_minutes.filter(|m| *m >= 0),
            cook_time_minutes: self.cook_time_minutes.filter(|m| *m >= 0),
            total_time_minutes: total_time_minutes.filter(|m| *m >= 0),
            servings: self.servings.filter(|s| *s > 0),
            ingredients: clean_lines(self.ingredients),
            directions: clean_lines(self.directions),
            tags: dedup_tags(self.tags),
            rating: self.rating.filter(|r| (0.0..=5.0).contains(r)),
        })
    }
}

/// Normalizes payloads with a size limit
#[derive(Debug, Clone)]
pub struct Normalizer {
    max_payload_bytes: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}

impl Normalizer {
    pub fn new(max_payload_bytes: usize) -> Self {
        Self { max_payload_bytes }
    }

    pub fn normalize(&self, payload: &RawPayload) -> Result<NormalizedRecipe, NormalizationError> {
        let size = payload.content.len();
        if size > self.max_payload_bytes {
            return Err(NormalizationError::TooLarge {
                size,
                max: self.max_payload_bytes,
            });
        }

        let draft = match payload.format {
            PayloadFormat::Json => json::parse_json(&payload.content)?,
            PayloadFormat::Yaml => json::parse_yaml(&payload.content)?,
            PayloadFormat::Markdown => markdown::parse_markdown(&payload.content)?,
            PayloadFormat::PlainText => markdown::parse_plain_text(&payload.content)?,
            PayloadFormat::Cooklang => cooklang::parse_cooklang(&payload.content, &payload.location)?,
        };

        draft.finish()
    }
}

/// Normalize one payload with the default size limit
pub fn normalize(payload: &RawPayload) -> Result<NormalizedRecipe, NormalizationError> {
    Normalizer::default().normalize(payload)
}

/// Parse a servings value such as `4`, `"4"` or `"Serves 4-6"`
pub(crate) fn parse_servings(value: &str) -> Option<i64> {
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|s: &i64| *s > 0)
}

/// Split a comma-separated tag string
pub(crate) fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Case-sensitive de-duplication that keeps the first occurrence
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .iter()
        .map(|l| clean_text(l))
        .filter(|l| !l.is_empty())
        .collect()
}

/// Strip markup, decode entities and collapse whitespace
pub(crate) fn clean_text(text: &str) -> String {
    let decoded = if text.contains(['<', '&']) {
        // The cleaner decodes every entity while parsing and escapes only
        // these when serializing the remaining text
        ammonia::Builder::empty()
            .clean_content_tags(["script", "style"].into_iter().collect())
            .clean(text)
            .to_string()
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&")
    } else {
        text.to_string()
    };

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a leading list marker (`-`, `*`, `+`, `1.`, `1)`)
pub(crate) fn strip_list_marker(line: &str) -> &str {
    let trimmed = line.trim();
    for marker in ["- [ ] ", "- [x] ", "- ", "* ", "+ ", "• "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return rest.trim();
        }
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest.trim();
        }
    }

    trimmed
}

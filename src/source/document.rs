use super::{Fetcher, PayloadBody, PayloadEntry};
use crate::error::{Error, Result};
use crate::normalizer::PayloadFormat;
use serde_json::Value;
use tracing::debug;

/// A single JSON or YAML document holding a list of recipes
pub(super) struct DocumentSource {
    url: String,
    format: PayloadFormat,
}

impl DocumentSource {
    pub fn new(url: String, format: PayloadFormat) -> Self {
        Self { url, format }
    }

    /// Fetch the document and split it into one payload per recipe object
    pub async fn enumerate(&self, fetcher: &Fetcher, max_bytes: usize) -> Result<Vec<PayloadEntry>> {
        let content = fetcher.fetch_text(&self.url, max_bytes).await?;
        debug!("Fetched {} bytes from {}", content.len(), self.url);

        let document: Value = match self.format {
            PayloadFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| {
                Error::RepositoryFetch(format!("Document is not valid YAML: {e}"))
            })?,
            _ => serde_json::from_str(&content).map_err(|e| {
                Error::RepositoryFetch(format!("Document is not valid JSON: {e}"))
            })?,
        };

        let name = document_name(&self.url);
        split_document(document)?
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                Ok(PayloadEntry {
                    location: format!("{name}#{index}"),
                    format: PayloadFormat::Json,
                    body: PayloadBody::Inline(serde_json::to_string(&item)?),
                })
            })
            .collect()
    }
}

/// Last path segment of the document URL
fn document_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Accepts a top-level array, `{ "recipes": [...] }`, or one recipe object
fn split_document(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("recipes") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(Error::RepositoryFetch(
                "`recipes` must be a list".to_string(),
            )),
            None => Ok(vec![Value::Object(obj)]),
        },
        _ => Err(Error::RepositoryFetch(
            "Document must contain a list of recipes".to_string(),
        )),
    }
}

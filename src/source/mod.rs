//! Repository sources: where recipe payloads come from.
//!
//! A repository URL resolves to one of three kinds of source. Enumeration
//! lists candidate payloads cheaply; each payload's content is loaded later,
//! per item, by the import workers.

mod directory;
mod document;
pub mod fetcher;
mod github;

pub use fetcher::Fetcher;

use crate::config::{GitHubConfig, ImporterConfig};
use crate::error::{Error, Result};
use crate::github::{is_github_url, parse_repository_url, GitHubClient};
use crate::normalizer::{PayloadFormat, RawPayload};
use crate::utils::validate_repository_url;
use directory::DirectorySource;
use document::DocumentSource;
use github::GitHubSource;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Where the content of one payload lives
#[derive(Debug, Clone)]
pub enum PayloadBody {
    /// Already in memory (element of a multi-recipe document)
    Inline(String),
    /// Downloaded on demand
    Remote(String),
    /// Read from the local filesystem on demand
    File(PathBuf),
}

/// One candidate recipe payload found during enumeration
#[derive(Debug, Clone)]
pub struct PayloadEntry {
    /// Path of the payload inside its repository
    pub location: String,
    pub format: PayloadFormat,
    pub body: PayloadBody,
}

enum SourceKind {
    GitHub(GitHubSource),
    Directory(DirectorySource),
    Document(DocumentSource),
}

/// A resolved repository
pub struct RepositorySource {
    kind: SourceKind,
    fetcher: Fetcher,
    max_payload_bytes: usize,
    max_document_bytes: usize,
    max_payloads: usize,
}

impl RepositorySource {
    /// Pick the source for a repository URL.
    ///
    /// GitHub URLs and `owner/repo` shorthands use the GitHub API,
    /// `file://` URLs and absolute paths walk a local directory, and any
    /// other http(s) URL is fetched as one multi-recipe document.
    pub fn resolve(
        repository_url: &str,
        importer: &ImporterConfig,
        github: &GitHubConfig,
    ) -> Result<Self> {
        let url = repository_url.trim();
        let timeout = Duration::from_secs(importer.request_timeout_secs);

        let kind = if url.starts_with("file://") || Path::new(url).is_absolute() {
            if !importer.allow_local_paths {
                return Err(Error::Validation(
                    "Local repository paths are disabled".to_string(),
                ));
            }
            let root = if url.starts_with("file://") {
                url::Url::parse(url)?
                    .to_file_path()
                    .map_err(|_| Error::Validation(format!("Invalid file URL: {url}")))?
            } else {
                PathBuf::from(url)
            };
            SourceKind::Directory(DirectorySource::new(root))
        } else if is_github_url(url) {
            let info = parse_repository_url(url)?;
            let client = GitHubClient::new(github.clone(), &importer.user_agent, timeout)?;
            SourceKind::GitHub(GitHubSource::new(client, info))
        } else {
            let parsed = validate_repository_url(url, importer.allow_private_hosts)?;
            let format = match PayloadFormat::from_path(parsed.path()) {
                Some(PayloadFormat::Yaml) => PayloadFormat::Yaml,
                _ => PayloadFormat::Json,
            };
            SourceKind::Document(DocumentSource::new(parsed.to_string(), format))
        };

        Ok(Self {
            kind,
            fetcher: Fetcher::new(&importer.user_agent, timeout)?,
            max_payload_bytes: importer.max_payload_bytes,
            max_document_bytes: importer.max_document_bytes,
            max_payloads: importer.max_payloads,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            SourceKind::GitHub(_) => "github",
            SourceKind::Directory(_) => "directory",
            SourceKind::Document(_) => "document",
        }
    }

    /// List candidate payloads, capped at `max_payloads`
    pub async fn enumerate(&self) -> Result<Vec<PayloadEntry>> {
        let mut entries = match &self.kind {
            SourceKind::GitHub(source) => source.enumerate().await?,
            SourceKind::Directory(source) => source.enumerate().await?,
            SourceKind::Document(source) => {
                source
                    .enumerate(&self.fetcher, self.max_document_bytes)
                    .await?
            }
        };

        if entries.len() > self.max_payloads {
            warn!(
                "Repository has {} candidate payloads, importing the first {}",
                entries.len(),
                self.max_payloads
            );
            entries.truncate(self.max_payloads);
        }

        info!(
            "Enumerated {} payloads from {} source",
            entries.len(),
            self.kind_name()
        );
        Ok(entries)
    }

    /// Load the content of one payload
    pub async fn load(&self, entry: &PayloadEntry) -> Result<RawPayload> {
        let content = match &entry.body {
            PayloadBody::Inline(content) => content.clone(),
            PayloadBody::File(path) => directory::read_payload(path, self.max_payload_bytes).await?,
            PayloadBody::Remote(url) => match &self.kind {
                SourceKind::GitHub(source) => source.download(url, self.max_payload_bytes).await?,
                _ => self.fetcher.fetch_text(url, self.max_payload_bytes).await?,
            },
        };

        Ok(RawPayload::new(entry.location.clone(), entry.format, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn importer() -> ImporterConfig {
        ImporterConfig {
            allow_local_paths: true,
            ..ImporterConfig::default()
        }
    }

    #[test]
    fn test_resolve_kinds() {
        let github = GitHubConfig::default();

        let source = RepositorySource::resolve("https://github.com/example/recipes", &importer(), &github)
            .unwrap();
        assert_eq!(source.kind_name(), "github");

        let source = RepositorySource::resolve("example/recipes", &importer(), &github).unwrap();
        assert_eq!(source.kind_name(), "github");

        let source =
            RepositorySource::resolve("https://example.com/data/recipes.yaml", &importer(), &github)
                .unwrap();
        assert_eq!(source.kind_name(), "document");

        let source = RepositorySource::resolve("/srv/recipes", &importer(), &github).unwrap();
        assert_eq!(source.kind_name(), "directory");

        let source = RepositorySource::resolve("file:///srv/recipes", &importer(), &github).unwrap();
        assert_eq!(source.kind_name(), "directory");
    }

    #[test]
    fn test_local_paths_disabled_by_default() {
        let result = RepositorySource::resolve(
            "/srv/recipes",
            &ImporterConfig::default(),
            &GitHubConfig::default(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_private_document_hosts_rejected() {
        let result = RepositorySource::resolve(
            "http://192.168.1.10/recipes.json",
            &ImporterConfig::default(),
            &GitHubConfig::default(),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_garbage_url_rejected() {
        let result = RepositorySource::resolve(
            "not a repository",
            &ImporterConfig::default(),
            &GitHubConfig::default(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_enumerate_caps_payloads() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(
                dir.path().join(format!("recipe-{i}.json")),
                format!(r#"{{"name": "Recipe {i}"}}"#),
            )
            .unwrap();
        }

        let config = ImporterConfig {
            max_payloads: 3,
            ..importer()
        };
        let source = RepositorySource::resolve(
            dir.path().to_str().unwrap(),
            &config,
            &GitHubConfig::default(),
        )
        .unwrap();

        let entries = source.enumerate().await.unwrap();
        assert_eq!(entries.len(), 3);

        let payload = source.load(&entries[0]).await.unwrap();
        assert_eq!(payload.location, "recipe-0.json");
        assert_eq!(payload.format, PayloadFormat::Json);
        assert!(payload.content.contains("Recipe 0"));
    }
}

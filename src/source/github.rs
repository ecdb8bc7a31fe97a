use super::{PayloadBody, PayloadEntry};
use crate::error::{Error, Result};
use crate::github::{GitHubClient, RepositoryInfo};
use crate::normalizer::PayloadFormat;
use tracing::{debug, info, warn};

/// A GitHub repository read through the REST API
pub(super) struct GitHubSource {
    client: GitHubClient,
    info: RepositoryInfo,
}

impl GitHubSource {
    pub fn new(client: GitHubClient, info: RepositoryInfo) -> Self {
        Self { client, info }
    }

    /// List recipe files of the branch head: repository → branch → commit → tree
    pub async fn enumerate(&self) -> Result<Vec<PayloadEntry>> {
        let RepositoryInfo {
            owner,
            repo,
            branch,
            subpath,
        } = &self.info;

        let repository = self.client.get_repository(owner, repo).await?;
        if repository.archived {
            info!("Repository {} is archived", repository.full_name);
        }

        let branch = branch.as_deref().unwrap_or(&repository.default_branch);
        let commit_sha = self.client.get_branch_commit(owner, repo, branch).await?;
        let commit = self.client.get_commit(owner, repo, &commit_sha).await?;
        let tree = self
            .client
            .get_tree(owner, repo, &commit.commit.tree.sha)
            .await?;

        if tree.truncated {
            warn!(
                "Tree listing for {}/{} was truncated by GitHub, some files are missing",
                owner, repo
            );
        }

        let prefix = subpath
            .as_deref()
            .map(|p| format!("{}/", p.trim_matches('/')));

        let mut entries: Vec<PayloadEntry> = tree
            .tree
            .iter()
            .filter(|entry| entry.is_blob())
            .filter(|entry| match &prefix {
                Some(prefix) => entry.path.starts_with(prefix.as_str()),
                None => true,
            })
            .filter(|entry| {
                !entry
                    .path
                    .split('/')
                    .any(|segment| segment.starts_with('.'))
            })
            .filter_map(|entry| {
                let format = PayloadFormat::from_path(&entry.path)?;
                Some(PayloadEntry {
                    location: entry.path.clone(),
                    format,
                    body: PayloadBody::Remote(self.client.raw_content_url(
                        owner,
                        repo,
                        &commit_sha,
                        &entry.path,
                    )),
                })
            })
            .collect();

        entries.sort_by(|a, b| a.location.cmp(&b.location));

        if entries.is_empty() && tree.tree.is_empty() {
            return Err(Error::RepositoryFetch(format!(
                "Repository {owner}/{repo} is empty"
            )));
        }

        debug!(
            "Found {} recipe files in {}/{}@{}",
            entries.len(),
            owner,
            repo,
            &commit_sha
        );
        Ok(entries)
    }

    pub async fn download(&self, url: &str, max_bytes: usize) -> Result<String> {
        self.client.download_raw_content(url, max_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;
    use crate::github::parse_repository_url;
    use mockito::Matcher;
    use std::time::Duration;

    async fn mock_repository(server: &mut mockito::ServerGuard) -> Vec<mockito::Mock> {
        vec![
            server
                .mock("GET", "/repos/example/recipes")
                .with_status(200)
                .with_body(r#"{"full_name": "example/recipes", "default_branch": "main"}"#)
                .create_async()
                .await,
            server
                .mock("GET", "/repos/example/recipes/git/refs/heads/main")
                .with_status(200)
                .with_body(
                    r#"{"ref": "refs/heads/main", "object": {"sha": "c0ffee", "type": "commit"}}"#,
                )
                .create_async()
                .await,
            server
                .mock("GET", "/repos/example/recipes/commits/c0ffee")
                .with_status(200)
                .with_body(r#"{"sha": "c0ffee", "commit": {"tree": {"sha": "7ree"}}}"#)
                .create_async()
                .await,
            server
                .mock(
                    "GET",
                    Matcher::Regex(r"^/repos/example/recipes/git/trees/7ree".to_string()),
                )
                .with_status(200)
                .with_body(
                    r#"{
                        "sha": "7ree",
                        "truncated": false,
                        "tree": [
                            {"path": "README.md", "type": "blob", "size": 10},
                            {"path": "mains", "type": "tree"},
                            {"path": "mains/chili.json", "type": "blob", "size": 100},
                            {"path": "mains/soup.cook", "type": "blob", "size": 100},
                            {"path": "mains/photo.jpg", "type": "blob", "size": 100},
                            {"path": ".github/workflow.yml", "type": "blob", "size": 100}
                        ]
                    }"#,
                )
                .create_async()
                .await,
        ]
    }

    fn source_for(server: &mockito::ServerGuard, url: &str) -> GitHubSource {
        let config = GitHubConfig {
            api_base_url: server.url(),
            raw_base_url: server.url(),
            ..GitHubConfig::default()
        };
        let client =
            GitHubClient::new(config, "Recipe-Import-Test/1.0", Duration::from_secs(5)).unwrap();
        GitHubSource::new(client, parse_repository_url(url).unwrap())
    }

    #[tokio::test]
    async fn test_enumerate_repository() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_repository(&mut server).await;

        let source = source_for(&server, "example/recipes");
        let entries = source.enumerate().await.unwrap();
        let locations: Vec<&str> = entries.iter().map(|e| e.location.as_str()).collect();

        assert_eq!(
            locations,
            vec!["README.md", "mains/chili.json", "mains/soup.cook"]
        );
        match &entries[1].body {
            PayloadBody::Remote(url) => {
                assert!(url.ends_with("/example/recipes/c0ffee/mains/chili.json"))
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enumerate_subdirectory() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = mock_repository(&mut server).await;

        let source = source_for(&server, "https://github.com/example/recipes/tree/main/mains");
        let entries = source.enumerate().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.location.starts_with("mains/")));
    }

    #[tokio::test]
    async fn test_unknown_repository_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/example/missing")
            .with_status(404)
            .create_async()
            .await;

        let source = source_for(&server, "example/missing");
        assert!(matches!(
            source.enumerate().await,
            Err(Error::RepositoryFetch(_))
        ));
    }
}

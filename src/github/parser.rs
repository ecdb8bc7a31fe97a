use crate::{Error, Result};

/// Parsed GitHub repository location
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryInfo {
    pub owner: String,
    pub repo: String,
    /// Branch from a `/tree/<branch>` URL, default branch otherwise
    pub branch: Option<String>,
    /// Only files below this directory are imported
    pub subpath: Option<String>,
}

/// Parse a GitHub repository URL
/// Accepts formats:
/// - https://github.com/owner/repo
/// - https://github.com/owner/repo.git
/// - https://github.com/owner/repo/tree/branch/some/dir
/// - github.com/owner/repo
/// - owner/repo
pub fn parse_repository_url(url: &str) -> Result<RepositoryInfo> {
    let url = url.trim().trim_end_matches('/');

    let url = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    let url = url
        .strip_prefix("www.github.com/")
        .or_else(|| url.strip_prefix("github.com/"))
        .unwrap_or(url);

    let parts: Vec<&str> = url.split('/').collect();

    if parts.len() < 2 {
        return Err(Error::Validation(
            "Invalid GitHub repository URL format. Expected: owner/repo".to_string(),
        ));
    }

    let owner = parts[0].trim();
    let repo = parts[1].trim().trim_end_matches(".git");

    if owner.is_empty() || repo.is_empty() {
        return Err(Error::Validation(
            "Repository owner and name cannot be empty".to_string(),
        ));
    }

    let (branch, subpath) = match parts.get(2) {
        Some(&"tree") | Some(&"blob") => {
            let branch = parts
                .get(3)
                .filter(|b| !b.is_empty())
                .map(|b| b.to_string());
            let subpath = (parts.len() > 4).then(|| parts[4..].join("/"));
            (branch, subpath)
        }
        Some(other) => {
            return Err(Error::Validation(format!(
                "Unsupported GitHub URL path segment: {other}"
            )))
        }
        None => (None, None),
    };

    Ok(RepositoryInfo {
        owner: owner.to_string(),
        repo: repo.to_string(),
        branch,
        subpath,
    })
}

/// Whether a repository URL should be handled as a GitHub repository
pub fn is_github_url(url: &str) -> bool {
    let url = url.trim();
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match without_scheme {
        Some(rest) => rest.starts_with("github.com/") || rest.starts_with("www.github.com/"),
        // Bare `owner/repo` shorthand
        None => {
            url.starts_with("github.com/")
                || (!url.starts_with('/')
                    && !url.contains(':')
                    && url.split('/').count() == 2
                    && !url.split('/').next().unwrap_or("").contains('.'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_https_url() {
        let info = parse_repository_url("https://github.com/example/family-recipes").unwrap();
        assert_eq!(info.owner, "example");
        assert_eq!(info.repo, "family-recipes");
        assert_eq!(info.branch, None);
        assert_eq!(info.subpath, None);
    }

    #[test]
    fn test_parse_url_with_git_suffix_and_slash() {
        let info = parse_repository_url("https://github.com/example/family-recipes.git/").unwrap();
        assert_eq!(info.repo, "family-recipes");
    }

    #[test]
    fn test_parse_short_formats() {
        let info = parse_repository_url("github.com/example/family-recipes").unwrap();
        assert_eq!(info.owner, "example");

        let info = parse_repository_url("example/family-recipes").unwrap();
        assert_eq!(info.repo, "family-recipes");
    }

    #[test]
    fn test_parse_tree_url() {
        let info =
            parse_repository_url("https://github.com/example/family-recipes/tree/dev/desserts/cakes")
                .unwrap();
        assert_eq!(info.branch.as_deref(), Some("dev"));
        assert_eq!(info.subpath.as_deref(), Some("desserts/cakes"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_repository_url("example").is_err());
        assert!(parse_repository_url("/family-recipes").is_err());
        assert!(parse_repository_url("example/").is_err());
        assert!(parse_repository_url("github.com/example/recipes/issues").is_err());
    }

    #[test]
    fn test_is_github_url() {
        assert!(is_github_url("https://github.com/example/recipes"));
        assert!(is_github_url("github.com/example/recipes"));
        assert!(is_github_url("example/recipes"));
        assert!(!is_github_url("https://example.com/recipes.json"));
        assert!(!is_github_url("example.com/recipes"));
        assert!(!is_github_url("/srv/recipes"));
        assert!(!is_github_url("file:///srv/recipes"));
    }
}
